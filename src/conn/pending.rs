//! Demultiplexer (C5): the FIFO of requests for which a reply is
//! outstanding. Completion order is strictly the order replies arrive on
//! the wire, which — because writes are also FIFO (§4.4) — is the order
//! requests were submitted.

use crate::command::Request;
use crate::error::Error;
use crate::resp::Value;
use std::collections::VecDeque;

pub(super) struct PendingQueue {
    queue: VecDeque<Request>,
    cap: usize,
}

impl PendingQueue {
    pub(super) fn new(cap: usize) -> Self {
        PendingQueue {
            queue: VecDeque::new(),
            cap,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &Request> {
        self.queue.iter()
    }

    /// Admits `request` at the tail if under the configured high-water
    /// mark; otherwise hands it back so the caller can fail it with
    /// `BackpressureExceeded` (spec §4.4).
    pub(super) fn push_back(&mut self, request: Request) -> Result<(), Request> {
        if self.queue.len() >= self.cap {
            return Err(request);
        }
        self.queue.push_back(request);
        Ok(())
    }

    /// Used only for requests that already passed an admission check before
    /// a reconnect (the reconnect send buffer has its own cap) — they must
    /// not be rejected a second time.
    pub(super) fn push_back_unchecked(&mut self, request: Request) {
        self.queue.push_back(request);
    }

    /// Completes the oldest outstanding request with a decoded reply. A
    /// reply with nothing pending is a protocol violation by the peer; the
    /// caller treats it as connection-scoped.
    pub(super) fn complete_head(&mut self, value: Value) -> bool {
        match self.queue.pop_front() {
            Some(request) => {
                request.complete(Ok(value));
                true
            }
            None => false,
        }
    }

    pub(super) fn fail_all(&mut self, make_err: &dyn Fn() -> Error) {
        while let Some(request) = self.queue.pop_front() {
            request.fail(make_err());
        }
    }

    /// Connection loss (spec §4.5): idempotent requests are kept, in order,
    /// to be replayed on the next successful connection; non-idempotent
    /// ones are failed immediately since the server's receipt of the
    /// original write is unknown.
    pub(super) fn handle_connection_loss(&mut self) {
        let mut survivors = VecDeque::with_capacity(self.queue.len());
        while let Some(request) = self.queue.pop_front() {
            if request.idempotent {
                survivors.push_back(request);
            } else {
                request.fail(Error::ConnectionClosed);
            }
        }
        self.queue = survivors;
    }
}

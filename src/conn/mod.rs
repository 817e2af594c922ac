//! Connection state machine (C3): owns one TCP socket, drives
//! `Disconnected → Connecting → Authenticating → Ready → Draining → Closed`,
//! and multiplexes pipelined requests over it. Three long-lived tasks per
//! live connection — reader, writer, supervisor (spec §5) — communicating
//! over `mpsc` channels: handshake sub-states, draining, and reconnect with
//! replay are all driven from the supervisor task alone.

pub(crate) mod handshake;
mod pending;
pub(crate) mod reader;
mod supervisor;
pub(crate) mod writer;

use crate::command::Request;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::health::ConnectionHealth;
use tokio::sync::{mpsc, watch};

/// Connection state (spec §3/§4.3). Not exposed publicly — callers observe
/// connection-scoped events through [`ConnectionHealth`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Draining,
    Closed,
}

/// A cheaply-cloneable handle to one logical connection. Submitting a
/// request never blocks: it either enters the supervisor's channel or is
/// failed immediately (`BackpressureExceeded`, `ConnectionClosed`).
#[derive(Clone)]
pub struct Connection {
    submit_tx: mpsc::Sender<Request>,
    health_rx: watch::Receiver<ConnectionHealth>,
}

impl Connection {
    /// Spawns the supervisor task and returns a handle to it. The socket is
    /// not dialed until the supervisor's first iteration; `spawn` itself
    /// never blocks on I/O.
    pub fn spawn(config: ClientConfig) -> Connection {
        let channel_cap = config
            .max_pending_requests
            .max(config.max_queued_while_reconnecting)
            + 64;
        let (submit_tx, submit_rx) = mpsc::channel(channel_cap);
        let (health_tx, health_rx) = watch::channel(ConnectionHealth::Disconnected(
            "not yet connected".to_owned(),
        ));
        tokio::spawn(supervisor::run(config, submit_rx, health_tx));
        Connection { submit_tx, health_rx }
    }

    /// A live view of connection-scoped events. Cloning a `Receiver` does
    /// not re-deliver past events — a fresh subscriber sees only the
    /// current value and whatever is published after.
    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health_rx.clone()
    }

    /// Hands `request` to the connection. Non-blocking: the channel is
    /// sized well above either configured cap, so a full channel only ever
    /// means the supervisor task itself is gone.
    pub(crate) fn submit(&self, request: Request) -> Result<(), Error> {
        match self.submit_tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(request)) => {
                request.fail(Error::BackpressureExceeded);
                Err(Error::BackpressureExceeded)
            }
            Err(mpsc::error::TrySendError::Closed(request)) => {
                request.fail(Error::ConnectionClosed);
                Err(Error::ConnectionClosed)
            }
        }
    }
}

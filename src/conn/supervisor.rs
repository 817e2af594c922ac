//! The supervisor task: the only piece that ever mutates connection state.
//! Drives `Disconnected → Connecting → Authenticating → Ready → Draining →
//! Closed` (spec §4.3), owns the pending queue (C5), and runs the
//! reconnect-with-replay loop (spec §4.5) around a pair of short-lived
//! reader/writer tasks per live socket.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::pending::PendingQueue;
use super::reader::{self, ReaderEvent};
use super::writer;
use super::{handshake, ConnectionState};
use crate::backoff::Backoff;
use crate::command::Request;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::health::ConnectionHealth;

/// The channels wired to one live socket's reader and writer tasks.
struct Live {
    reader_rx: mpsc::UnboundedReceiver<ReaderEvent>,
    writer_err_rx: mpsc::UnboundedReceiver<Error>,
    to_writer_tx: mpsc::UnboundedSender<Bytes>,
}

/// Why [`run_ready`] returned.
enum Outcome {
    /// The socket errored or the peer closed it.
    Lost(Error),
    /// Shutdown was requested and the pending queue drained cleanly.
    Drained,
}

pub(super) async fn run(
    config: ClientConfig,
    mut submit_rx: mpsc::Receiver<Request>,
    health_tx: watch::Sender<ConnectionHealth>,
) {
    let mut backoff = Backoff::new(config.backoff.clone());
    let mut pending = PendingQueue::new(config.max_pending_requests);
    let mut reconnect_buffer: VecDeque<Request> = VecDeque::new();
    let mut state = ConnectionState::Disconnected;
    let mut ever_connected = false;
    let mut shutdown_requested = false;

    'outer: loop {
        if shutdown_requested && pending.is_empty() && reconnect_buffer.is_empty() {
            state = ConnectionState::Closed;
            break 'outer;
        }
        if shutdown_requested && !ever_connected {
            // Shutdown raced the very first connect attempt: nothing is
            // in flight on a wire anywhere, so there is nothing to drain.
            fail_all(&mut pending, &mut reconnect_buffer, &mut submit_rx, || Error::ConnectionClosed);
            state = ConnectionState::Closed;
            break 'outer;
        }
        if ever_connected && !shutdown_requested && !config.auto_reconnect {
            fail_all(&mut pending, &mut reconnect_buffer, &mut submit_rx, || Error::ConnectionClosed);
            state = ConnectionState::Closed;
            break 'outer;
        }

        state = ConnectionState::Connecting;
        let live = 'connect: loop {
            match try_connect(&config).await {
                Ok(live) => break 'connect live,
                Err(Error::AuthFailed { kind, message }) => {
                    warn!(%kind, %message, "authentication failed, connection will not retry");
                    let _ = health_tx.send(ConnectionHealth::AuthFailed(kind.clone(), message.clone()));
                    fail_all(&mut pending, &mut reconnect_buffer, &mut submit_rx, || Error::AuthFailed {
                        kind: kind.clone(),
                        message: message.clone(),
                    });
                    state = ConnectionState::Closed;
                    break 'outer;
                }
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                    let _ = health_tx.send(ConnectionHealth::ReconnectFailed(e.to_string()));
                    if !config.auto_reconnect || backoff.exhausted() {
                        fail_all(&mut pending, &mut reconnect_buffer, &mut submit_rx, || Error::ConnectionClosed);
                        state = ConnectionState::Closed;
                        break 'outer;
                    }
                    let delay = backoff.next_delay();
                    debug!(?delay, attempt = backoff.attempt(), "backing off before retry");
                    wait_and_buffer(
                        &mut submit_rx,
                        &mut reconnect_buffer,
                        config.max_queued_while_reconnecting,
                        delay,
                        &mut shutdown_requested,
                    )
                    .await;
                }
            }
        };

        ever_connected = true;
        backoff.reset();
        state = ConnectionState::Ready;
        info!("connection ready");
        let _ = health_tx.send(ConnectionHealth::Connected);
        flush_after_reconnect(&mut pending, &mut reconnect_buffer, &live.to_writer_tx);

        match run_ready(&mut pending, &mut submit_rx, live, &mut shutdown_requested, &mut state).await
        {
            Outcome::Drained => {
                state = ConnectionState::Closed;
                break 'outer;
            }
            Outcome::Lost(e) => {
                warn!(error = %e, "connection lost");
                pending.handle_connection_loss();
                state = ConnectionState::Disconnected;
                let _ = health_tx.send(ConnectionHealth::Disconnected(e.to_string()));
            }
        }
    }

    debug!(?state, "connection supervisor stopped");
}

async fn try_connect(config: &ClientConfig) -> Result<Live, Error> {
    let mut framed = handshake::dial(config).await?;
    handshake::perform(&mut framed, config).await?;
    let stream = framed.into_inner();
    let (read_half, write_half) = stream.into_split();

    let (reader_tx, reader_rx) = mpsc::unbounded_channel();
    let (writer_err_tx, writer_err_rx) = mpsc::unbounded_channel();
    let (to_writer_tx, to_writer_rx) = mpsc::unbounded_channel();

    tokio::spawn(reader::run(read_half, reader_tx));
    tokio::spawn(writer::run(write_half, to_writer_rx, config.max_write_batch_size, writer_err_tx));

    Ok(Live {
        reader_rx,
        writer_err_rx,
        to_writer_tx,
    })
}

/// Services one live connection until it drops or a requested shutdown has
/// fully drained. This is the only place `submit_rx`, the reader, and the
/// writer are all read from concurrently.
async fn run_ready(
    pending: &mut PendingQueue,
    submit_rx: &mut mpsc::Receiver<Request>,
    mut live: Live,
    shutdown_requested: &mut bool,
    state: &mut ConnectionState,
) -> Outcome {
    loop {
        if *shutdown_requested && pending.is_empty() {
            return Outcome::Drained;
        }
        tokio::select! {
            maybe_request = submit_rx.recv(), if !*shutdown_requested => {
                match maybe_request {
                    Some(request) => {
                        let frame = request.frame.clone();
                        match pending.push_back(request) {
                            Ok(()) => {
                                let _ = live.to_writer_tx.send(frame);
                            }
                            Err(request) => request.fail(Error::BackpressureExceeded),
                        }
                    }
                    None => {
                        *shutdown_requested = true;
                        *state = ConnectionState::Draining;
                    }
                }
            }
            event = live.reader_rx.recv() => {
                match event {
                    Some(ReaderEvent::Value(value)) => {
                        if !pending.complete_head(value) {
                            return Outcome::Lost(Error::ProtocolError(
                                "received a reply with no pending request".to_owned(),
                            ));
                        }
                    }
                    Some(ReaderEvent::Closed(e)) => return Outcome::Lost(e),
                    None => return Outcome::Lost(Error::ConnectionClosed),
                }
            }
            maybe_err = live.writer_err_rx.recv() => {
                if let Some(e) = maybe_err {
                    return Outcome::Lost(e);
                }
            }
        }
    }
}

/// Fails every request this supervisor is holding anywhere: the pending
/// queue, the reconnect buffer, and — crucially — anything a caller already
/// handed to `submit_tx` that the supervisor never got around to reading
/// (e.g. a request submitted while `Connecting`, for a connection that then
/// fails permanently before `run_ready` ever polls `submit_rx`). Without
/// draining `submit_rx` here, those requests would simply be dropped when
/// this task exits, completing their callers with a generic channel-closed
/// error instead of the real one (spec §7: connection-scoped errors must be
/// "surfaced to the next submission").
fn fail_all(
    pending: &mut PendingQueue,
    reconnect_buffer: &mut VecDeque<Request>,
    submit_rx: &mut mpsc::Receiver<Request>,
    make_err: impl Fn() -> Error,
) {
    pending.fail_all(&make_err);
    while let Some(request) = reconnect_buffer.pop_front() {
        request.fail(make_err());
    }
    while let Ok(request) = submit_rx.try_recv() {
        request.fail(make_err());
    }
}

fn flush_after_reconnect(
    pending: &mut PendingQueue,
    reconnect_buffer: &mut VecDeque<Request>,
    to_writer_tx: &mpsc::UnboundedSender<Bytes>,
) {
    for request in pending.iter() {
        let _ = to_writer_tx.send(request.frame.clone());
    }
    while let Some(request) = reconnect_buffer.pop_front() {
        let _ = to_writer_tx.send(request.frame.clone());
        pending.push_back_unchecked(request);
    }
}

async fn wait_and_buffer(
    submit_rx: &mut mpsc::Receiver<Request>,
    reconnect_buffer: &mut VecDeque<Request>,
    cap: usize,
    delay: Duration,
    shutdown_requested: &mut bool,
) {
    let sleeper = sleep(delay);
    tokio::pin!(sleeper);
    loop {
        tokio::select! {
            _ = &mut sleeper => return,
            maybe = submit_rx.recv(), if !*shutdown_requested => {
                match maybe {
                    Some(request) => {
                        if reconnect_buffer.len() >= cap {
                            request.fail(Error::BackpressureExceeded);
                        } else {
                            reconnect_buffer.push_back(request);
                        }
                    }
                    None => *shutdown_requested = true,
                }
            }
        }
    }
}

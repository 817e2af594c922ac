//! The subscriber's supervisor task. Structurally the same loop as
//! [`crate::conn::supervisor`] — dial, handshake, run until lost, back off,
//! retry — reusing that module's reader/writer/handshake tasks verbatim.
//! What differs is what rides over the socket: instead of a FIFO of typed
//! requests, the supervisor tracks (a) a small plain-reply queue for
//! `PING`/`QUIT`, (b) a counted-ack queue for `SUBSCRIBE`/`UNSUBSCRIBE`/
//! `PSUBSCRIBE`/`PUNSUBSCRIBE`, and (c) the confirmed channel/pattern sets
//! those acks update, replayed as one aggregate `SUBSCRIBE`/`PSUBSCRIBE`
//! immediately after reconnect, before any new caller command is admitted
//! (spec §4.6 point 3).

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::{AckKind, SubscriberCommand};
use crate::conn::handshake;
use crate::conn::reader::{self, ReaderEvent};
use crate::conn::writer;
use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind};
use crate::health::ConnectionHealth;
use crate::resp::{classify_push, encode_command, PushKind, Value};
use crate::subscriber::SubscriptionCallback;

/// A plain (non-push) reply a subscriber connection still expects: `PING`
/// replies `+PONG`, `QUIT` replies `+OK`.
enum PlainKind {
    Ping,
    Quit,
}

struct PlainPending {
    kind: PlainKind,
    ack: oneshot::Sender<Result<(), Error>>,
}

struct PendingAck {
    kind: AckKind,
    remaining: usize,
    /// `None` for the aggregate resubscribe issued after a reconnect —
    /// nothing is awaiting that one, it just needs to run before new
    /// caller traffic is admitted.
    ack: Option<oneshot::Sender<Result<(), Error>>>,
}

#[derive(Default)]
struct Subscriptions {
    channels: HashSet<String>,
    patterns: HashSet<String>,
}

struct Live {
    reader_rx: mpsc::UnboundedReceiver<ReaderEvent>,
    writer_err_rx: mpsc::UnboundedReceiver<Error>,
    to_writer_tx: mpsc::UnboundedSender<Bytes>,
}

enum Outcome {
    Lost(Error),
    Drained,
}

pub(super) async fn run(
    config: ClientConfig,
    mut cmd_rx: mpsc::Receiver<SubscriberCommand>,
    health_tx: watch::Sender<ConnectionHealth>,
    mut callback: Box<dyn SubscriptionCallback>,
) {
    let mut backoff = Backoff::new(config.backoff.clone());
    let mut subs = Subscriptions::default();
    let mut plain_pending: VecDeque<PlainPending> = VecDeque::new();
    let mut push_acks: VecDeque<PendingAck> = VecDeque::new();
    let mut reconnect_buffer: VecDeque<SubscriberCommand> = VecDeque::new();
    let mut ever_connected = false;
    let mut shutting_down = false;

    'outer: loop {
        if shutting_down && plain_pending.is_empty() && push_acks.is_empty() && reconnect_buffer.is_empty() {
            break 'outer;
        }
        if ever_connected && !config.auto_reconnect && !shutting_down {
            fail_everything(&mut plain_pending, &mut push_acks, &mut reconnect_buffer, &mut cmd_rx, Error::ConnectionClosed);
            break 'outer;
        }

        let live = 'connect: loop {
            match try_connect(&config).await {
                Ok(live) => break 'connect live,
                Err(Error::AuthFailed { kind, message }) => {
                    warn!(%kind, %message, "subscriber authentication failed, will not retry");
                    let _ = health_tx.send(ConnectionHealth::AuthFailed(kind.clone(), message.clone()));
                    fail_everything(
                        &mut plain_pending,
                        &mut push_acks,
                        &mut reconnect_buffer,
                        &mut cmd_rx,
                        Error::AuthFailed { kind, message },
                    );
                    break 'outer;
                }
                Err(e) => {
                    warn!(error = %e, "subscriber connect attempt failed");
                    let _ = health_tx.send(ConnectionHealth::ReconnectFailed(e.to_string()));
                    if !config.auto_reconnect || backoff.exhausted() {
                        fail_everything(&mut plain_pending, &mut push_acks, &mut reconnect_buffer, &mut cmd_rx, Error::ConnectionClosed);
                        break 'outer;
                    }
                    let delay = backoff.next_delay();
                    debug!(?delay, attempt = backoff.attempt(), "subscriber backing off before retry");
                    wait_and_buffer(&mut cmd_rx, &mut reconnect_buffer, config.max_queued_while_reconnecting, delay, &mut shutting_down)
                        .await;
                }
            }
        };

        ever_connected = true;
        backoff.reset();
        info!("subscriber connection ready");
        let _ = health_tx.send(ConnectionHealth::Connected);

        // Reconstruct the confirmed set before admitting any new caller
        // command (spec §4.6 point 3).
        resubscribe_after_reconnect(&subs, &mut push_acks, &live.to_writer_tx);

        let buffered: Vec<SubscriberCommand> = reconnect_buffer.drain(..).collect();
        for command in buffered {
            dispatch(command, &mut plain_pending, &mut push_acks, &live.to_writer_tx);
        }

        match run_ready(
            &mut cmd_rx,
            &mut plain_pending,
            &mut push_acks,
            &mut subs,
            live,
            &mut shutting_down,
            callback.as_mut(),
        )
        .await
        {
            Outcome::Drained => break 'outer,
            Outcome::Lost(e) => {
                warn!(error = %e, "subscriber connection lost");
                // Every in-flight op is connection-scoped here: the server
                // gives no way to know which subscribe/unsubscribe calls it
                // actually applied before dropping, so they're failed and
                // the resubscribe-from-confirmed-set on the next connect is
                // what restores steady state, not a replay of these.
                fail_pending_only(&mut plain_pending, &mut push_acks, Error::ConnectionClosed);
                let _ = health_tx.send(ConnectionHealth::Disconnected(e.to_string()));
            }
        }
    }

    debug!("subscriber supervisor stopped");
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

    Ok(Live { reader_rx, writer_err_rx, to_writer_tx })
}

#[allow(clippy::too_many_arguments)]
async fn run_ready(
    cmd_rx: &mut mpsc::Receiver<SubscriberCommand>,
    plain_pending: &mut VecDeque<PlainPending>,
    push_acks: &mut VecDeque<PendingAck>,
    subs: &mut Subscriptions,
    mut live: Live,
    shutting_down: &mut bool,
    callback: &mut dyn SubscriptionCallback,
) -> Outcome {
    loop {
        if *shutting_down && plain_pending.is_empty() && push_acks.is_empty() {
            return Outcome::Drained;
        }
        tokio::select! {
            maybe_cmd = cmd_rx.recv(), if !*shutting_down => {
                match maybe_cmd {
                    Some(SubscriberCommand::Quit(ack)) => {
                        *shutting_down = true;
                        let frame = encode_command([b"QUIT".as_slice()]);
                        let _ = live.to_writer_tx.send(frame);
                        plain_pending.push_back(PlainPending { kind: PlainKind::Quit, ack });
                    }
                    Some(command) => dispatch(command, plain_pending, push_acks, &live.to_writer_tx),
                    None => *shutting_down = true,
                }
            }
            event = live.reader_rx.recv() => {
                match event {
                    Some(ReaderEvent::Value(value)) => {
                        if let Err(e) = handle_value(value, subs, plain_pending, push_acks, callback) {
                            return Outcome::Lost(e);
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

fn dispatch(
    command: SubscriberCommand,
    plain_pending: &mut VecDeque<PlainPending>,
    push_acks: &mut VecDeque<PendingAck>,
    to_writer_tx: &mpsc::UnboundedSender<Bytes>,
) {
    match command {
        SubscriberCommand::Ping(ack) => {
            let frame = encode_command([b"PING".as_slice()]);
            let _ = to_writer_tx.send(frame);
            plain_pending.push_back(PlainPending { kind: PlainKind::Ping, ack });
        }
        SubscriberCommand::Quit(ack) => {
            let frame = encode_command([b"QUIT".as_slice()]);
            let _ = to_writer_tx.send(frame);
            plain_pending.push_back(PlainPending { kind: PlainKind::Quit, ack });
        }
        SubscriberCommand::Op { kind, targets, ack } => {
            if targets.is_empty() {
                let _ = ack.send(Ok(()));
                return;
            }
            let command_name: &[u8] = match kind {
                AckKind::Subscribe => b"SUBSCRIBE",
                AckKind::Unsubscribe => b"UNSUBSCRIBE",
                AckKind::PSubscribe => b"PSUBSCRIBE",
                AckKind::PUnsubscribe => b"PUNSUBSCRIBE",
            };
            let mut args: Vec<Vec<u8>> = vec![command_name.to_vec()];
            args.extend(targets.iter().map(|t| t.as_bytes().to_vec()));
            let frame = encode_command(args);
            let _ = to_writer_tx.send(frame);
            push_acks.push_back(PendingAck { kind, remaining: targets.len(), ack: Some(ack) });
        }
    }
}

fn handle_value(
    value: Value,
    subs: &mut Subscriptions,
    plain_pending: &mut VecDeque<PlainPending>,
    push_acks: &mut VecDeque<PendingAck>,
    callback: &mut dyn SubscriptionCallback,
) -> Result<(), Error> {
    match classify_push(&value) {
        Some(kind) if kind.is_ack() => handle_ack(kind, value, subs, push_acks, callback),
        Some(_) => {
            handle_notification(value, callback);
            Ok(())
        }
        None => handle_plain_reply(value, plain_pending),
    }
}

fn handle_notification(value: Value, callback: &mut dyn SubscriptionCallback) {
    let items = match value {
        Value::Array(Some(items)) => items,
        _ => return,
    };
    let mut iter = items.into_iter();
    let _kind = iter.next();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(channel), Some(payload), None) => {
            if let (Some(channel), Some(payload)) = (bulk_string(channel), bulk_bytes(payload)) {
                callback.on_message(channel, payload);
            }
        }
        (Some(pattern), Some(channel), Some(payload)) => {
            if let (Some(pattern), Some(channel), Some(payload)) =
                (bulk_string(pattern), bulk_string(channel), bulk_bytes(payload))
            {
                callback.on_pmessage(pattern, channel, payload);
            }
        }
        _ => {}
    }
}

fn handle_ack(
    kind: PushKind,
    value: Value,
    subs: &mut Subscriptions,
    push_acks: &mut VecDeque<PendingAck>,
    callback: &mut dyn SubscriptionCallback,
) -> Result<(), Error> {
    let items = match value {
        Value::Array(Some(items)) => items,
        _ => return Ok(()),
    };
    let mut iter = items.into_iter();
    let _kind_token = iter.next();
    let target = iter.next().and_then(bulk_string);
    let count = match iter.next() {
        Some(Value::Integer(n)) => n,
        _ => 0,
    };
    let expected = match kind {
        PushKind::Subscribe => AckKind::Subscribe,
        PushKind::Unsubscribe => AckKind::Unsubscribe,
        PushKind::PSubscribe => AckKind::PSubscribe,
        PushKind::PUnsubscribe => AckKind::PUnsubscribe,
        PushKind::Message | PushKind::PMessage => unreachable!("filtered by is_ack"),
    };

    if let Some(target) = &target {
        match expected {
            AckKind::Subscribe => {
                subs.channels.insert(target.clone());
                callback.on_subscribe(target.clone(), count);
            }
            AckKind::Unsubscribe => {
                subs.channels.remove(target);
                callback.on_unsubscribe(target.clone(), count);
            }
            AckKind::PSubscribe => {
                subs.patterns.insert(target.clone());
                callback.on_psubscribe(target.clone(), count);
            }
            AckKind::PUnsubscribe => {
                subs.patterns.remove(target);
                callback.on_punsubscribe(target.clone(), count);
            }
        }
    }

    let Some(front) = push_acks.front_mut() else {
        // An ack with nothing pending is only reachable if the server sent
        // more acks than were requested; surface it rather than panic.
        return Err(Error::ProtocolError(format!(
            "received a {expected:?} ack with no pending subscribe/unsubscribe call"
        )));
    };
    if front.kind != expected {
        return Err(Error::ProtocolError(format!(
            "expected {:?} ack, received {expected:?}",
            front.kind
        )));
    }
    front.remaining = front.remaining.saturating_sub(1);
    if front.remaining == 0 {
        let completed = push_acks.pop_front().expect("front_mut just matched");
        if let Some(ack) = completed.ack {
            let _ = ack.send(Ok(()));
        }
    }
    Ok(())
}

fn handle_plain_reply(value: Value, plain_pending: &mut VecDeque<PlainPending>) -> Result<(), Error> {
    let Some(pending) = plain_pending.pop_front() else {
        return Err(Error::ProtocolError("received a reply with no pending PING/QUIT call".into()));
    };
    let result = match (&pending.kind, &value) {
        (PlainKind::Ping, Value::SimpleString(s)) if s == "PONG" => Ok(()),
        (PlainKind::Quit, Value::SimpleString(s)) if s == "OK" => Ok(()),
        (_, Value::Error(kind, message)) => Err(Error::ServerError {
            kind: ErrorKind(kind.clone()),
            message: message.clone(),
        }),
        _ => Err(Error::UnexpectedResponse {
            command: match pending.kind {
                PlainKind::Ping => "PING",
                PlainKind::Quit => "QUIT",
            },
            value,
        }),
    };
    let _ = pending.ack.send(result);
    Ok(())
}

fn bulk_string(value: Value) -> Option<String> {
    match value {
        Value::BulkString(Some(b)) => Some(String::from_utf8_lossy(&b).into_owned()),
        _ => None,
    }
}

fn bulk_bytes(value: Value) -> Option<Bytes> {
    match value {
        Value::BulkString(Some(b)) => Some(b),
        _ => None,
    }
}

fn resubscribe_after_reconnect(
    subs: &Subscriptions,
    push_acks: &mut VecDeque<PendingAck>,
    to_writer_tx: &mpsc::UnboundedSender<Bytes>,
) {
    if !subs.channels.is_empty() {
        let mut args: Vec<Vec<u8>> = vec![b"SUBSCRIBE".to_vec()];
        args.extend(subs.channels.iter().map(|c| c.as_bytes().to_vec()));
        let _ = to_writer_tx.send(encode_command(args));
        push_acks.push_back(PendingAck { kind: AckKind::Subscribe, remaining: subs.channels.len(), ack: None });
    }
    if !subs.patterns.is_empty() {
        let mut args: Vec<Vec<u8>> = vec![b"PSUBSCRIBE".to_vec()];
        args.extend(subs.patterns.iter().map(|p| p.as_bytes().to_vec()));
        let _ = to_writer_tx.send(encode_command(args));
        push_acks.push_back(PendingAck { kind: AckKind::PSubscribe, remaining: subs.patterns.len(), ack: None });
    }
}

fn fail_pending_only(plain_pending: &mut VecDeque<PlainPending>, push_acks: &mut VecDeque<PendingAck>, err: Error) {
    while let Some(pending) = plain_pending.pop_front() {
        let _ = pending.ack.send(Err(clone_error(&err)));
    }
    while let Some(pending) = push_acks.pop_front() {
        if let Some(ack) = pending.ack {
            let _ = ack.send(Err(clone_error(&err)));
        }
    }
}

/// Fails everything this supervisor is holding: the plain-reply and push-ack
/// queues, the reconnect buffer, and anything already sitting in `cmd_rx`
/// that the supervisor never read (e.g. a call submitted while connecting,
/// for a connection that then fails permanently before `run_ready` ever
/// polls `cmd_rx`). Without draining `cmd_rx` here those calls would be
/// silently dropped when this task exits, completing their callers with a
/// generic channel-closed error instead of the real one.
fn fail_everything(
    plain_pending: &mut VecDeque<PlainPending>,
    push_acks: &mut VecDeque<PendingAck>,
    reconnect_buffer: &mut VecDeque<SubscriberCommand>,
    cmd_rx: &mut mpsc::Receiver<SubscriberCommand>,
    err: Error,
) {
    fail_pending_only(plain_pending, push_acks, clone_error(&err));
    while let Some(command) = reconnect_buffer.pop_front() {
        fail_one(command, clone_error(&err));
    }
    while let Ok(command) = cmd_rx.try_recv() {
        fail_one(command, clone_error(&err));
    }
}

async fn wait_and_buffer(
    cmd_rx: &mut mpsc::Receiver<SubscriberCommand>,
    reconnect_buffer: &mut VecDeque<SubscriberCommand>,
    cap: usize,
    delay: std::time::Duration,
    shutting_down: &mut bool,
) {
    let sleeper = tokio::time::sleep(delay);
    tokio::pin!(sleeper);
    loop {
        tokio::select! {
            _ = &mut sleeper => return,
            maybe = cmd_rx.recv(), if !*shutting_down => {
                match maybe {
                    Some(command) => {
                        if reconnect_buffer.len() >= cap {
                            fail_one(command, Error::BackpressureExceeded);
                        } else {
                            reconnect_buffer.push_back(command);
                        }
                    }
                    None => *shutting_down = true,
                }
            }
        }
    }
}

fn fail_one(command: SubscriberCommand, err: Error) {
    match command {
        SubscriberCommand::Ping(ack) | SubscriberCommand::Quit(ack) => {
            let _ = ack.send(Err(err));
        }
        SubscriberCommand::Op { ack, .. } => {
            let _ = ack.send(Err(err));
        }
    }
}

/// `Error` isn't `Clone` (it carries a `Value`/`io::Error`); failing every
/// queued caller with the same logical error re-derives an equivalent one
/// per recipient instead.
fn clone_error(err: &Error) -> Error {
    match err {
        Error::ConnectionClosed => Error::ConnectionClosed,
        Error::BackpressureExceeded => Error::BackpressureExceeded,
        Error::Timeout => Error::Timeout,
        Error::AuthFailed { kind, message } => Error::AuthFailed { kind: kind.clone(), message: message.clone() },
        Error::ProtocolError(msg) => Error::ProtocolError(msg.clone()),
        other => Error::ProtocolError(other.to_string()),
    }
}

//! Subscriber state machine (C6, spec §4.6): the pub/sub specialization of
//! the connection. Same three-task skeleton as [`crate::conn`] — reader,
//! writer, supervisor — but the supervisor here demultiplexes two
//! interleaved things instead of one: ordinary replies to the handful of
//! commands a subscriber connection may send (`PING`, `QUIT`), and push
//! frames, which are either pure notifications (`message`/`pmessage`,
//! dispatched to the [`SubscriptionCallback`]) or acknowledgements that are
//! *both* a reply to an outstanding `SUBSCRIBE`/`UNSUBSCRIBE`/`PSUBSCRIBE`/
//! `PUNSUBSCRIBE` call and an authoritative update to the confirmed
//! subscription set.
//!
//! Grounded in the callback shape of `PubSubCommands`/`Msg`
//! (`other_examples/052e6400_YushiOMOTE-redis-ac__src-pubsub.rs.rs`) and
//! `valkey-glide`'s `PushManager`, adapted from push-by-stream to
//! push-by-callback because spec §6 specifies callback methods rather than
//! a `Stream` item type.

mod supervisor;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::health::ConnectionHealth;

/// The capability a caller hands to [`Subscriber::spawn`] to receive pushed
/// messages and subscription-set updates (spec §6). Delivery is
/// single-threaded per connection and in the order frames arrive on the
/// wire (spec §4.6/§5) — the supervisor calls these methods inline, so a
/// slow callback backs up delivery of later messages rather than
/// reordering them.
pub trait SubscriptionCallback: Send {
    fn on_message(&mut self, channel: String, payload: Bytes) {
        let _ = (channel, payload);
    }
    fn on_pmessage(&mut self, pattern: String, channel: String, payload: Bytes) {
        let _ = (pattern, channel, payload);
    }
    fn on_subscribe(&mut self, channel: String, count: i64) {
        let _ = (channel, count);
    }
    fn on_unsubscribe(&mut self, channel: String, count: i64) {
        let _ = (channel, count);
    }
    fn on_psubscribe(&mut self, pattern: String, count: i64) {
        let _ = (pattern, count);
    }
    fn on_punsubscribe(&mut self, pattern: String, count: i64) {
        let _ = (pattern, count);
    }
    /// A connection-scoped event that isn't tied to a caller's pending
    /// `subscribe`/`unsubscribe` future — e.g. a reconnect's resubscribe
    /// attempt itself failing. Request-scoped errors instead surface
    /// through the future returned by [`Subscriber::subscribe`] et al.
    fn on_error(&mut self, error: Error) {
        let _ = error;
    }
}

/// What kind of acknowledgement a pending `SUBSCRIBE`/`UNSUBSCRIBE`/
/// `PSUBSCRIBE`/`PUNSUBSCRIBE` call is waiting for (spec §3: "a counter per
/// pending `SUBSCRIBE`/`UNSUBSCRIBE` reply needed for bookkeeping").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AckKind {
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
}

/// A caller-issued operation, carried from the [`Subscriber`] handle to the
/// supervisor task.
pub(super) enum SubscriberCommand {
    Op {
        kind: AckKind,
        targets: Vec<String>,
        ack: oneshot::Sender<Result<(), Error>>,
    },
    Ping(oneshot::Sender<Result<(), Error>>),
    Quit(oneshot::Sender<Result<(), Error>>),
}

/// A cheaply-cloneable handle to a pub/sub connection. Only the commands
/// spec §4.6 allows are reachable through this type: there is no generic
/// "send arbitrary command" escape hatch, so `InvalidStateForCommand`
/// (spec §7) is enforced at the API surface rather than at runtime.
#[derive(Clone)]
pub struct Subscriber {
    submit_tx: mpsc::Sender<SubscriberCommand>,
    health_rx: watch::Receiver<ConnectionHealth>,
}

impl Subscriber {
    /// Spawns the supervisor task, which will not dial the socket until its
    /// first iteration. `callback` is moved into that task and is never
    /// touched from any other task.
    pub fn spawn(config: ClientConfig, callback: Box<dyn SubscriptionCallback>) -> Subscriber {
        let channel_cap = config.max_pending_requests.max(config.max_queued_while_reconnecting) + 64;
        let (submit_tx, submit_rx) = mpsc::channel(channel_cap);
        let (health_tx, health_rx) = watch::channel(ConnectionHealth::Disconnected(
            "not yet connected".to_owned(),
        ));
        tokio::spawn(supervisor::run(config, submit_rx, health_tx, callback));
        Subscriber { submit_tx, health_rx }
    }

    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health_rx.clone()
    }

    async fn call(&self, command: SubscriberCommand, ack: oneshot::Receiver<Result<(), Error>>) -> Result<(), Error> {
        if self.submit_tx.send(command).await.is_err() {
            return Err(Error::ConnectionClosed);
        }
        ack.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Subscribes to `channels`, reconstructed verbatim across reconnects.
    /// Resolves once the server has acknowledged every channel in the list.
    pub async fn subscribe<I, S>(&self, channels: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = channels.into_iter().map(Into::into).collect();
        let (ack, rx) = oneshot::channel();
        self.call(
            SubscriberCommand::Op { kind: AckKind::Subscribe, targets, ack },
            rx,
        )
        .await
    }

    pub async fn unsubscribe<I, S>(&self, channels: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = channels.into_iter().map(Into::into).collect();
        let (ack, rx) = oneshot::channel();
        self.call(
            SubscriberCommand::Op { kind: AckKind::Unsubscribe, targets, ack },
            rx,
        )
        .await
    }

    pub async fn psubscribe<I, S>(&self, patterns: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let (ack, rx) = oneshot::channel();
        self.call(
            SubscriberCommand::Op { kind: AckKind::PSubscribe, targets, ack },
            rx,
        )
        .await
    }

    pub async fn punsubscribe<I, S>(&self, patterns: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let (ack, rx) = oneshot::channel();
        self.call(
            SubscriberCommand::Op { kind: AckKind::PUnsubscribe, targets, ack },
            rx,
        )
        .await
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let (ack, rx) = oneshot::channel();
        self.call(SubscriberCommand::Ping(ack), rx).await
    }

    pub async fn quit(&self) -> Result<(), Error> {
        let (ack, rx) = oneshot::channel();
        self.call(SubscriberCommand::Quit(ack), rx).await
    }
}

//! [`Client`]: the public handle callers construct and hold. Thin by design
//! — it owns a [`Connection`] and a `receive_timeout`, and every command
//! method is the same three steps: build a [`Request`] via a leaf in
//! [`commands`], submit it, await the completion racing the configured
//! timeout (spec §5: "a `receive_timeout_opt` may cause a request to fail
//! locally with `Timeout`; the wire reply is still matched and consumed
//! when it eventually arrives").

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, watch};

use crate::command::Request;
use crate::commands::{self, SetOptions};
use crate::config::ClientConfig;
use crate::conn::Connection;
use crate::error::Error;
use crate::health::ConnectionHealth;

/// A cheaply-cloneable handle to one logical connection to the server.
///
/// Cloning shares the same underlying [`Connection`] (and therefore the
/// same socket, supervisor task, and pending queue) — this mirrors the
/// "one connection per client instance" contract (spec §1 Non-goals: no
/// pooling across hosts), while still letting callers hand the client to
/// many concurrent tasks.
#[derive(Clone)]
pub struct Client {
    conn: Connection,
    receive_timeout: Option<Duration>,
}

impl Client {
    /// Spawns the connection's supervisor task. The socket is not dialed
    /// until the supervisor's first iteration; this call never blocks.
    pub fn connect(config: ClientConfig) -> Client {
        let receive_timeout = config.receive_timeout;
        let conn = Connection::spawn(config);
        Client { conn, receive_timeout }
    }

    /// A live view of connection-scoped events (spec §7/§8). Cloning the
    /// returned receiver does not replay history — it starts at whatever
    /// the latest value is.
    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.conn.health()
    }

    /// Submits `request` and awaits its completion, applying
    /// `receive_timeout` if one is configured. A timeout never touches the
    /// wire: the request stays in the pending queue and the reply, when it
    /// arrives, is still consumed and simply discarded (spec §5).
    async fn call<T>(&self, pair: (Request, oneshot::Receiver<Result<T, Error>>)) -> Result<T, Error> {
        let (request, receiver) = pair;
        self.conn.submit(request)?;
        let result = match self.receive_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, receiver).await {
                Ok(inner) => inner,
                Err(_) => return Err(Error::Timeout),
            },
            None => receiver.await,
        };
        // A receiver only errs if its sender was dropped without sending,
        // which can't happen: `Request::complete`/`fail` always sends.
        result.map_err(|_| Error::ConnectionClosed)?
    }

    pub async fn ping(&self) -> Result<(), Error> {
        self.call(commands::ping()).await
    }

    pub async fn echo(&self, message: impl AsRef<[u8]>) -> Result<Bytes, Error> {
        self.call(commands::echo(message)).await
    }

    pub async fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>, Error> {
        self.call(commands::get(key)).await
    }

    pub async fn set(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<bool, Error> {
        self.call(commands::set(key, value, SetOptions::default())).await
    }

    pub async fn set_with_options(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: SetOptions,
    ) -> Result<bool, Error> {
        self.call(commands::set(key, value, options)).await
    }

    pub async fn del<I, K>(&self, keys: I) -> Result<i64, Error>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        self.call(commands::del(keys)).await
    }

    pub async fn exists<I, K>(&self, keys: I) -> Result<i64, Error>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        self.call(commands::exists(keys)).await
    }

    pub async fn expire(&self, key: impl AsRef<[u8]>, seconds: u64) -> Result<bool, Error> {
        self.call(commands::expire(key, seconds)).await
    }

    pub async fn incr(&self, key: impl AsRef<[u8]>) -> Result<i64, Error> {
        self.call(commands::incr(key)).await
    }

    pub async fn hget(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Result<Option<Bytes>, Error> {
        self.call(commands::hget(key, field)).await
    }

    pub async fn hset(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<bool, Error> {
        self.call(commands::hset(key, field, value)).await
    }

    pub async fn lpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64, Error> {
        self.call(commands::lpush(key, value)).await
    }

    pub async fn rpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64, Error> {
        self.call(commands::rpush(key, value)).await
    }

    pub async fn lpop(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>, Error> {
        self.call(commands::lpop(key)).await
    }

    pub async fn rpop(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>, Error> {
        self.call(commands::rpop(key)).await
    }

    /// Re-authenticates on an already-`Ready` connection, distinct from the
    /// handshake's own `AUTH` (spec §4.3), which runs before any `Request`
    /// exists.
    pub async fn auth(&self, username: Option<&str>, password: impl AsRef<[u8]>) -> Result<(), Error> {
        self.call(commands::auth(username, password)).await
    }

    pub async fn client_setname(&self, name: impl AsRef<[u8]>) -> Result<(), Error> {
        self.call(commands::client_setname(name)).await
    }

    pub async fn select(&self, database: i64) -> Result<(), Error> {
        self.call(commands::select(database)).await
    }

    pub async fn quit(&self) -> Result<(), Error> {
        self.call(commands::quit()).await
    }
}

//! Client construction options (spec §6), exposed through a builder so
//! callers only set what they deviate from and every other field keeps a
//! sane default.

use crate::backoff::BackoffConfig;
use std::time::Duration;

/// `auth = {username?, password}` (spec §6), applied during the handshake
/// (spec §4.3) as `AUTH [user] pass`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: String,
}

impl AuthConfig {
    pub fn new(password: impl Into<String>) -> Self {
        AuthConfig {
            username: None,
            password: password.into(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// The full enumerated option set from spec §6.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub auth: Option<AuthConfig>,
    pub client_name: Option<String>,
    pub database: Option<i64>,
    pub connect_timeout: Duration,
    pub receive_timeout: Option<Duration>,
    pub max_write_batch_size: usize,
    pub tcp_send_buffer_hint: Option<u32>,
    pub tcp_recv_buffer_hint: Option<u32>,
    pub auto_reconnect: bool,
    pub backoff: BackoffConfig,
    /// High-water mark on the pending-queue length (spec §4.4 backpressure).
    pub max_pending_requests: usize,
    /// Bound on the send buffer used while `Disconnected`/`Connecting`/
    /// `Authenticating` when `auto_reconnect` is enabled (spec §4.3).
    pub max_queued_while_reconnecting: usize,
}

impl ClientConfig {
    pub fn builder(host: impl Into<String>, port: u16) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host, port)
    }
}

/// Builder for [`ClientConfig`]. Every field has a sane default so callers
/// only need to set what they deviate from.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientConfigBuilder {
            config: ClientConfig {
                host: host.into(),
                port,
                auth: None,
                client_name: None,
                database: None,
                connect_timeout: Duration::from_secs(5),
                receive_timeout: None,
                max_write_batch_size: 16 * 1024,
                tcp_send_buffer_hint: None,
                tcp_recv_buffer_hint: None,
                auto_reconnect: true,
                backoff: BackoffConfig::default(),
                max_pending_requests: 1024,
                max_queued_while_reconnecting: 256,
            },
        }
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = Some(auth);
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    pub fn database(mut self, db: i64) -> Self {
        self.config.database = Some(db);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    pub fn max_write_batch_size(mut self, bytes: usize) -> Self {
        self.config.max_write_batch_size = bytes;
        self
    }

    pub fn tcp_send_buffer_hint(mut self, bytes: u32) -> Self {
        self.config.tcp_send_buffer_hint = Some(bytes);
        self
    }

    pub fn tcp_recv_buffer_hint(mut self, bytes: u32) -> Self {
        self.config.tcp_recv_buffer_hint = Some(bytes);
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn max_pending_requests(mut self, n: usize) -> Self {
        self.config.max_pending_requests = n;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

//! Connection-health observer (C8, spec §7): a narrow capability object for
//! connection-scoped events that are not tied to any one request —
//! protocol errors, I/O failures, authentication rejections. Modeled as a
//! `tokio::sync::watch` channel of the latest event, a small handle rather
//! than a full event log.
//!
//! Purely observational: nothing about request submission or completion
//! depends on what a caller does with this.

use crate::error::ErrorKind;

/// The latest connection-scoped event. A caller who only wants to know
/// "is the connection currently usable" can match on whether the latest
/// value is `Connected`; one who wants to log or alert can match on all
/// four variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionHealth {
    Connected,
    Disconnected(String),
    ReconnectFailed(String),
    AuthFailed(ErrorKind, String),
}

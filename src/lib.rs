//! Asynchronous RESP client: pipelined multiplexing, authenticated
//! reconnect, and pub/sub over a single TCP connection.
//!
//! The crate is organized around the components of the connection state
//! machine: [`resp`] is the wire codec, [`command`] is the request/reply
//! unit that rides the connection, [`conn`] is the multiplexing state
//! machine for ordinary commands, and [`subscriber`] is the pub/sub
//! specialization that multiplexes pushed messages with the handful of
//! commands a subscriber connection is allowed to send. [`Client`] and
//! [`Subscriber`] are the two public entry points; [`commands`] is the leaf
//! command table both of them are built from.

pub mod backoff;
pub mod client;
pub mod command;
pub mod commands;
pub mod config;
mod conn;
pub mod error;
pub mod health;
pub mod resp;
pub mod subscriber;

pub use backoff::BackoffConfig;
pub use client::Client;
pub use config::{AuthConfig, ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use health::ConnectionHealth;
pub use subscriber::{Subscriber, SubscriptionCallback};

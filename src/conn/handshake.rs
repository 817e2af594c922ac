//! Dialing and the post-connect handshake (spec §4.3: `Connecting` →
//! `Authenticating` → `Ready`). `AUTH`, `CLIENT SETNAME`, and `SELECT` are
//! each optional and, when present, sent in that fixed order; any error
//! reply aborts the attempt.

use crate::error::{Error, ErrorKind};
use crate::resp::{encode_command, RespCodec, Value};
use crate::ClientConfig;
use futures_util::{SinkExt, StreamExt};
use socket2::{Domain, Socket, TcpKeepalive, Type};
use std::net::ToSocketAddrs;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Opens the TCP connection, bounded by `connect_timeout`. Returns a
/// `Framed` pair used only for the handshake; the caller tears it back down
/// into a raw `TcpStream` (`Framed::into_inner`) once `Ready`, so the
/// long-lived reader/writer tasks can each own one half.
///
/// The socket is built through `socket2` on a blocking task rather than
/// `TcpStream::connect` directly so that `tcp_send_buffer_hint`/
/// `tcp_recv_buffer_hint` (spec §6) can be applied before the connect
/// handshake and `connect_timeout` bounds the syscall itself, in the idiom
/// `rustis` uses for this exact option set.
pub(crate) async fn dial(config: &ClientConfig) -> Result<Framed<TcpStream, RespCodec>, Error> {
    let addr = format!("{}:{}", config.host, config.port);
    let config = config.clone();
    let stream = tokio::task::spawn_blocking(move || connect_blocking(&addr, &config))
        .await
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))??;
    stream.set_nonblocking(true)?;
    let stream = TcpStream::from_std(stream)?;
    Ok(Framed::new(stream, RespCodec::default()))
}

fn connect_blocking(addr: &str, config: &ClientConfig) -> std::io::Result<std::net::TcpStream> {
    let socket_addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("no address for {addr}")))?;
    let domain = if socket_addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    if let Some(bytes) = config.tcp_send_buffer_hint {
        socket.set_send_buffer_size(bytes as usize)?;
    }
    if let Some(bytes) = config.tcp_recv_buffer_hint {
        socket.set_recv_buffer_size(bytes as usize)?;
    }
    socket.set_nodelay(true)?;
    socket.set_keepalive(true)?;
    let _ = socket.set_tcp_keepalive(&TcpKeepalive::new());
    socket.connect_timeout(&socket_addr.into(), config.connect_timeout)?;
    Ok(socket.into())
}

/// Runs the optional `AUTH` / `CLIENT SETNAME` / `SELECT` sequence. Any
/// error here — server rejection, protocol error, or the peer closing the
/// socket — is fatal to this connection attempt; the caller decides whether
/// to retry.
pub(crate) async fn perform(
    framed: &mut Framed<TcpStream, RespCodec>,
    config: &ClientConfig,
) -> Result<(), Error> {
    if let Some(auth) = &config.auth {
        let frame = match &auth.username {
            Some(user) => encode_command([b"AUTH".as_slice(), user.as_bytes(), auth.password.as_bytes()]),
            None => encode_command([b"AUTH".as_slice(), auth.password.as_bytes()]),
        };
        framed.send(frame).await?;
        match next_reply(framed).await? {
            Value::SimpleString(s) if s == "OK" => {}
            Value::Error(kind, message) => {
                return Err(Error::AuthFailed {
                    kind: ErrorKind(kind),
                    message,
                })
            }
            other => {
                return Err(Error::UnexpectedResponse {
                    command: "AUTH",
                    value: other,
                })
            }
        }
    }

    if let Some(name) = &config.client_name {
        let frame = encode_command([b"CLIENT".as_slice(), b"SETNAME".as_slice(), name.as_bytes()]);
        framed.send(frame).await?;
        expect_ok(framed, "CLIENT SETNAME").await?;
    }

    if let Some(db) = config.database {
        let frame = encode_command([b"SELECT".as_slice(), db.to_string().as_bytes()]);
        framed.send(frame).await?;
        expect_ok(framed, "SELECT").await?;
    }

    Ok(())
}

async fn next_reply(framed: &mut Framed<TcpStream, RespCodec>) -> Result<Value, Error> {
    match framed.next().await {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e),
        None => Err(Error::ConnectionClosed),
    }
}

async fn expect_ok(framed: &mut Framed<TcpStream, RespCodec>, command: &'static str) -> Result<(), Error> {
    match next_reply(framed).await? {
        Value::SimpleString(s) if s == "OK" => Ok(()),
        Value::Error(kind, message) => Err(Error::ServerError {
            kind: ErrorKind(kind),
            message,
        }),
        other => Err(Error::UnexpectedResponse { command, value: other }),
    }
}

//! Leaf commands (C7): a representative command set built on the
//! descriptor shape from spec §6 — the table of commands this crate
//! exercises end to end, generated mechanically rather than by a class
//! hierarchy per command.
//!
//! Every leaf follows the same shape: encode the frame once with
//! [`encode_command`], pick an `idempotent` flag, and hand both to
//! [`Request::new`] along with a decoder. Read commands are idempotent;
//! writes are not unless the spec calls one out explicitly (`SET … XX`).

use crate::command::{decode_bulk_opt, decode_integer, decode_ok, CommandDescriptor, Request};
use crate::error::Error;
use crate::resp::{encode_command, Value};
use bytes::Bytes;
use tokio::sync::oneshot;

type Reply<T> = (Request, oneshot::Receiver<Result<T, Error>>);

pub fn ping() -> Reply<()> {
    let frame = encode_command([b"PING".as_slice()]);
    Request::new(
        CommandDescriptor::new("PING", true),
        frame,
        |v| match v {
            Value::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(Error::UnexpectedResponse { command: "PING", value: other }),
        },
    )
}

pub fn echo(message: impl AsRef<[u8]>) -> Reply<Bytes> {
    let frame = encode_command([b"ECHO".as_slice(), message.as_ref()]);
    Request::new(CommandDescriptor::new("ECHO", true), frame, |v| match v {
        Value::BulkString(Some(b)) => Ok(b),
        other => Err(Error::UnexpectedResponse { command: "ECHO", value: other }),
    })
}

pub fn get(key: impl AsRef<[u8]>) -> Reply<Option<Bytes>> {
    let frame = encode_command([b"GET".as_slice(), key.as_ref()]);
    Request::new(CommandDescriptor::new("GET", true), frame, decode_bulk_opt)
}

/// `SET` options (spec §6). `Xx` is the one write condition the spec marks
/// idempotent — replaying it can't turn an absent key into a present one,
/// so it can't diverge from "ran it once".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    IfNotExists,
    IfExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expire {
    Seconds(u64),
    Millis(u64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub expire: Option<Expire>,
    pub condition: Option<SetCondition>,
}

/// `true` if the key was set; `false` only possible with `NX`/`XX`, where
/// the server replies with a null bulk string instead of `+OK`.
pub fn set(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>, options: SetOptions) -> Reply<bool> {
    let mut args: Vec<Vec<u8>> = vec![b"SET".to_vec(), key.as_ref().to_vec(), value.as_ref().to_vec()];
    match options.expire {
        Some(Expire::Seconds(n)) => {
            args.push(b"EX".to_vec());
            args.push(n.to_string().into_bytes());
        }
        Some(Expire::Millis(n)) => {
            args.push(b"PX".to_vec());
            args.push(n.to_string().into_bytes());
        }
        None => {}
    }
    let idempotent = match options.condition {
        Some(SetCondition::IfExists) => {
            args.push(b"XX".to_vec());
            true
        }
        Some(SetCondition::IfNotExists) => {
            args.push(b"NX".to_vec());
            false
        }
        None => false,
    };
    let frame = encode_command(args);
    Request::new(CommandDescriptor::new("SET", idempotent), frame, |v| match v {
        Value::SimpleString(s) if s == "OK" => Ok(true),
        v if v.is_null() => Ok(false),
        other => Err(Error::UnexpectedResponse { command: "SET", value: other }),
    })
}

pub fn del<I, K>(keys: I) -> Reply<i64>
where
    I: IntoIterator<Item = K>,
    K: AsRef<[u8]>,
{
    let mut args = vec![b"DEL".to_vec()];
    args.extend(keys.into_iter().map(|k| k.as_ref().to_vec()));
    let frame = encode_command(args);
    Request::new(CommandDescriptor::new("DEL", false), frame, decode_integer)
}

pub fn exists<I, K>(keys: I) -> Reply<i64>
where
    I: IntoIterator<Item = K>,
    K: AsRef<[u8]>,
{
    let mut args = vec![b"EXISTS".to_vec()];
    args.extend(keys.into_iter().map(|k| k.as_ref().to_vec()));
    let frame = encode_command(args);
    Request::new(CommandDescriptor::new("EXISTS", true), frame, decode_integer)
}

pub fn expire(key: impl AsRef<[u8]>, seconds: u64) -> Reply<bool> {
    let frame = encode_command([b"EXPIRE".as_slice(), key.as_ref(), seconds.to_string().as_bytes()]);
    Request::new(CommandDescriptor::new("EXPIRE", false), frame, |v| {
        decode_integer(v).map(|n| n == 1)
    })
}

pub fn incr(key: impl AsRef<[u8]>) -> Reply<i64> {
    let frame = encode_command([b"INCR".as_slice(), key.as_ref()]);
    Request::new(CommandDescriptor::new("INCR", false), frame, decode_integer)
}

pub fn hget(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Reply<Option<Bytes>> {
    let frame = encode_command([b"HGET".as_slice(), key.as_ref(), field.as_ref()]);
    Request::new(CommandDescriptor::new("HGET", true), frame, decode_bulk_opt)
}

/// `true` if `field` is a new field in the hash, `false` if it was updated.
pub fn hset(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Reply<bool> {
    let frame = encode_command([b"HSET".as_slice(), key.as_ref(), field.as_ref(), value.as_ref()]);
    Request::new(CommandDescriptor::new("HSET", false), frame, |v| {
        decode_integer(v).map(|n| n == 1)
    })
}

pub fn lpush(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Reply<i64> {
    let frame = encode_command([b"LPUSH".as_slice(), key.as_ref(), value.as_ref()]);
    Request::new(CommandDescriptor::new("LPUSH", false), frame, decode_integer)
}

pub fn rpush(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Reply<i64> {
    let frame = encode_command([b"RPUSH".as_slice(), key.as_ref(), value.as_ref()]);
    Request::new(CommandDescriptor::new("RPUSH", false), frame, decode_integer)
}

pub fn lpop(key: impl AsRef<[u8]>) -> Reply<Option<Bytes>> {
    let frame = encode_command([b"LPOP".as_slice(), key.as_ref()]);
    Request::new(CommandDescriptor::new("LPOP", false), frame, decode_bulk_opt)
}

pub fn rpop(key: impl AsRef<[u8]>) -> Reply<Option<Bytes>> {
    let frame = encode_command([b"RPOP".as_slice(), key.as_ref()]);
    Request::new(CommandDescriptor::new("RPOP", false), frame, decode_bulk_opt)
}

/// Re-authenticates on an already-`Ready` connection. The handshake (spec
/// §4.3) sends its own `AUTH` directly on the raw socket before any
/// `Request` exists; this is for callers who want to switch credentials
/// mid-session.
pub fn auth(username: Option<&str>, password: impl AsRef<[u8]>) -> Reply<()> {
    let frame = match username {
        Some(user) => encode_command([b"AUTH".as_slice(), user.as_bytes(), password.as_ref()]),
        None => encode_command([b"AUTH".as_slice(), password.as_ref()]),
    };
    Request::new(CommandDescriptor::new("AUTH", true), frame, decode_ok)
}

pub fn client_setname(name: impl AsRef<[u8]>) -> Reply<()> {
    let frame = encode_command([b"CLIENT".as_slice(), b"SETNAME".as_slice(), name.as_ref()]);
    Request::new(CommandDescriptor::new("CLIENT SETNAME", true), frame, decode_ok)
}

pub fn select(database: i64) -> Reply<()> {
    let frame = encode_command([b"SELECT".as_slice(), database.to_string().as_bytes()]);
    Request::new(CommandDescriptor::new("SELECT", true), frame, decode_ok)
}

pub fn quit() -> Reply<()> {
    let frame = encode_command([b"QUIT".as_slice()]);
    Request::new(CommandDescriptor::new("QUIT", true), frame, decode_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_with_xx_is_idempotent_plain_set_is_not() {
        let (plain, _) = set("k", "v", SetOptions::default());
        assert!(!plain.idempotent);
        let (xx, _) = set(
            "k",
            "v",
            SetOptions {
                expire: None,
                condition: Some(SetCondition::IfExists),
            },
        );
        assert!(xx.idempotent);
        let (nx, _) = set(
            "k",
            "v",
            SetOptions {
                expire: None,
                condition: Some(SetCondition::IfNotExists),
            },
        );
        assert!(!nx.idempotent);
    }

    #[test]
    fn set_encodes_expire_and_condition_tokens() {
        let (request, _) = set(
            "k",
            "v",
            SetOptions {
                expire: Some(Expire::Seconds(30)),
                condition: Some(SetCondition::IfExists),
            },
        );
        assert_eq!(
            request.frame.as_ref(),
            b"*6\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n30\r\n$2\r\nXX\r\n"
        );
    }

    #[tokio::test]
    async fn ping_decodes_pong_as_unit() {
        let (request, receiver) = ping();
        request.complete(Ok(Value::SimpleString("PONG".into())));
        assert!(receiver.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn del_decodes_integer_count() {
        let (request, receiver) = del(["a", "b"]);
        request.complete(Ok(Value::Integer(2)));
        assert_eq!(receiver.await.unwrap().unwrap(), 2);
    }
}

//! RESP (REdis Serialization Protocol) wire codec (spec §4.1).
//!
//! Encoding is synchronous and allocation-light: a command is pre-serialized
//! into a single [`Bytes`] frame once, at construction time, so the writer's
//! hot path under the write lock never touches the encoder. Decoding is a
//! restartable, incremental parser: each call to [`RespCodec::decode`]
//! consumes either zero or one complete top-level value from the buffer and
//! never advances past a partial frame.

mod codec;
mod parser;

pub use codec::RespCodec;

use bytes::{BufMut, Bytes, BytesMut};

/// Bulk strings larger than this are rejected with `ProtocolError` (spec §4.1).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// A decoded (or about-to-be-encoded) RESP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    SimpleString(String),
    Error(String, String),
    Integer(i64),
    BulkString(Option<Bytes>),
    Array(Option<Vec<Value>>),
}

impl Value {
    /// The bulk string's contents, lowercased, or `None` if this isn't a
    /// non-null bulk string. Used to classify an `Array`'s head element
    /// case-insensitively as a push frame (spec §4.1).
    pub fn as_bulk_str_lowercase(&self) -> Option<String> {
        match self {
            Value::BulkString(Some(b)) => Some(String::from_utf8_lossy(b).to_lowercase()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::BulkString(None) | Value::Array(None))
    }
}

/// Encodes a command — a non-empty ordered sequence of byte strings — into
/// a single RESP array-of-bulk-strings frame: `*<N>\r\n` followed by `N`
/// `$<len>\r\n<bytes>\r\n` bulk strings. Binary safe.
///
/// Panics if `args` is empty: a command descriptor (§3) always supplies at
/// least the command name.
pub fn encode_command<I, A>(args: I) -> Bytes
where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
{
    let args: Vec<A> = args.into_iter().collect();
    assert!(!args.is_empty(), "a command must have at least one token");

    let mut buf = BytesMut::with_capacity(32 + args.iter().map(|a| a.as_ref().len() + 16).sum::<usize>());
    buf.put_u8(b'*');
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in &args {
        let bytes = arg.as_ref();
        buf.put_u8(b'$');
        buf.extend_from_slice(bytes.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(bytes);
        buf.extend_from_slice(b"\r\n");
    }
    buf.freeze()
}

/// Encodes an arbitrary [`Value`] into `buf`. Used by tests and by callers
/// that need to emit a generic RESP value rather than a pre-built command
/// frame (`encode_command` is the hot path; this is not).
pub fn encode_value(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::SimpleString(s) => {
            buf.put_u8(b'+');
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        Value::Error(kind, message) => {
            buf.put_u8(b'-');
            buf.extend_from_slice(kind.as_bytes());
            buf.put_u8(b' ');
            buf.extend_from_slice(message.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        Value::Integer(i) => {
            buf.put_u8(b':');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        Value::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
        Value::BulkString(Some(bytes)) => {
            buf.put_u8(b'$');
            buf.extend_from_slice(bytes.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(bytes);
            buf.extend_from_slice(b"\r\n");
        }
        Value::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        Value::Array(Some(items)) => {
            buf.put_u8(b'*');
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                encode_value(item, buf);
            }
        }
    }
}

/// Classifies a decoded `Array` as a pub/sub push frame (spec §4.1). Only
/// meaningful on a subscriber connection (spec §4.6); a normal connection
/// never calls this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Message,
    PMessage,
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
}

impl PushKind {
    fn from_token(token: &str) -> Option<PushKind> {
        match token {
            "message" => Some(PushKind::Message),
            "pmessage" => Some(PushKind::PMessage),
            "subscribe" => Some(PushKind::Subscribe),
            "unsubscribe" => Some(PushKind::Unsubscribe),
            "psubscribe" => Some(PushKind::PSubscribe),
            "punsubscribe" => Some(PushKind::PUnsubscribe),
            _ => None,
        }
    }

    /// `subscribe`/`unsubscribe`/`psubscribe`/`punsubscribe` are both an
    /// acknowledgement of an outstanding request *and* a subscription-set
    /// update; `message`/`pmessage` are pure notifications.
    pub fn is_ack(&self) -> bool {
        !matches!(self, PushKind::Message | PushKind::PMessage)
    }
}

/// Returns `Some(kind)` if `value` is a push frame per spec §4.1, else `None`.
pub fn classify_push(value: &Value) -> Option<PushKind> {
    match value {
        Value::Array(Some(items)) => {
            let head = items.first()?;
            let token = head.as_bulk_str_lowercase()?;
            PushKind::from_token(&token)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::Decoder;

    #[test]
    fn encode_command_builds_bulk_array() {
        let frame = encode_command([b"SET".as_slice(), b"k".as_slice(), b"v".as_slice()]);
        assert_eq!(frame.as_ref(), b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn encode_command_is_binary_safe() {
        let frame = encode_command([b"SET".as_slice(), b"k".as_slice(), b"\r\n\x00".as_slice()]);
        assert_eq!(frame.as_ref(), b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$3\r\n\r\n\x00\r\n");
    }

    #[test]
    fn encode_value_round_trips_through_decode() {
        let mut buf = BytesMut::new();
        let value = Value::Array(Some(vec![
            Value::BulkString(Some(Bytes::from_static(b"foo"))),
            Value::Integer(-7),
            Value::BulkString(None),
            Value::SimpleString("OK".into()),
        ]));
        encode_value(&value, &mut buf);
        let mut codec = RespCodec::default();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, value);
        assert!(buf.is_empty());
    }

    #[test]
    fn classify_push_recognizes_all_six_kinds() {
        for (token, kind) in [
            ("message", PushKind::Message),
            ("pmessage", PushKind::PMessage),
            ("subscribe", PushKind::Subscribe),
            ("unsubscribe", PushKind::Unsubscribe),
            ("psubscribe", PushKind::PSubscribe),
            ("punsubscribe", PushKind::PUnsubscribe),
        ] {
            let value = Value::Array(Some(vec![Value::BulkString(Some(Bytes::copy_from_slice(
                token.as_bytes(),
            )))]));
            assert_eq!(classify_push(&value), Some(kind));
        }
    }

    #[test]
    fn classify_push_ignores_non_push_arrays() {
        let value = Value::Array(Some(vec![Value::BulkString(Some(Bytes::from_static(b"GET")))]));
        assert_eq!(classify_push(&value), None);
    }
}

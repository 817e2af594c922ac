//! Request (C2) and command descriptor (§3, §6).
//!
//! A [`Request`] is built entirely by the caller — its frame is already
//! encoded and its decoder is a plain function — so the connection's write
//! path (§4.2) never serializes or branches on command type; it only moves
//! bytes and, later, completes a type-erased slot.

use crate::error::Error;
use crate::resp::Value;
use bytes::Bytes;
use tokio::sync::oneshot;

/// The shape leaf commands build against (spec §6): a name, whether it is
/// safe to replay after a connection drop (spec §4.5), and the caller
/// supplies `encode`/`decode` directly rather than through descriptor
/// fields, since in Rust a decoder closure is more naturally passed at the
/// call site than stored as a struct field with a generic return type.
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub idempotent: bool,
}

impl CommandDescriptor {
    pub const fn new(name: &'static str, idempotent: bool) -> Self {
        CommandDescriptor { name, idempotent }
    }
}

/// Type-erased completion: lets the demultiplexer (C5) hold a
/// homogeneous `VecDeque<Request>` regardless of each request's result type.
trait Completable: Send {
    fn complete(self: Box<Self>, result: Result<Value, Error>);
    fn fail(self: Box<Self>, error: Error);
}

struct Typed<T> {
    decode: Box<dyn FnOnce(Value) -> Result<T, Error> + Send>,
    sender: oneshot::Sender<Result<T, Error>>,
}

impl<T: Send + 'static> Completable for Typed<T> {
    fn complete(self: Box<Self>, result: Result<Value, Error>) {
        let out = result.and_then(|v| (self.decode)(v));
        // A dropped receiver means the caller stopped caring; the wire
        // reply is still consumed (spec §5 cancellation), we just drop it.
        let _ = self.sender.send(out);
    }

    fn fail(self: Box<Self>, error: Error) {
        let _ = self.sender.send(Err(error));
    }
}

/// A single in-flight command: an encoded frame, a decoder, and a one-shot
/// completion slot (spec §3). Exactly one producer (the demultiplexer, or
/// the connection on loss/shutdown) ever completes it, exactly once.
pub struct Request {
    pub(crate) frame: Bytes,
    pub(crate) name: &'static str,
    pub(crate) idempotent: bool,
    completion: Box<dyn Completable>,
}

impl Request {
    /// Builds a request for `descriptor` from pre-encoded `frame`. Returns
    /// the request (to be enqueued) and the receiver half the caller awaits.
    pub fn new<T, D>(
        descriptor: CommandDescriptor,
        frame: Bytes,
        decode: D,
    ) -> (Request, oneshot::Receiver<Result<T, Error>>)
    where
        T: Send + 'static,
        D: FnOnce(Value) -> Result<T, Error> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let completion = Box::new(Typed {
            decode: Box::new(decode),
            sender,
        });
        (
            Request {
                frame,
                name: descriptor.name,
                idempotent: descriptor.idempotent,
                completion,
            },
            receiver,
        )
    }

    /// Completes this request with a decoded server reply. Consumes `self`:
    /// a request is completed at most once (spec invariant).
    pub(crate) fn complete(self, result: Result<Value, Error>) {
        self.completion.complete(result);
    }

    /// Completes this request with a connection-scoped error (timeout,
    /// connection loss, shutdown).
    pub(crate) fn fail(self, error: Error) {
        self.completion.fail(error);
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("name", &self.name)
            .field("idempotent", &self.idempotent)
            .field("frame_len", &self.frame.len())
            .finish()
    }
}

/// Decodes a `+OK` simple string into `()`. Any other well-formed reply
/// (including a null bulk string) is `UnexpectedResponse`.
pub fn decode_ok(value: Value) -> Result<(), Error> {
    match value {
        Value::SimpleString(s) if s == "OK" => Ok(()),
        other => Err(Error::UnexpectedResponse {
            command: "<ok>",
            value: other,
        }),
    }
}

/// Decodes a bulk string reply, treating a null bulk string as `None`.
pub fn decode_bulk_opt(value: Value) -> Result<Option<Bytes>, Error> {
    match value {
        Value::BulkString(b) => Ok(b),
        other => Err(Error::UnexpectedResponse {
            command: "<bulk>",
            value: other,
        }),
    }
}

/// Decodes an integer reply.
pub fn decode_integer(value: Value) -> Result<i64, Error> {
    match value {
        Value::Integer(i) => Ok(i),
        other => Err(Error::UnexpectedResponse {
            command: "<integer>",
            value: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::encode_command;

    #[tokio::test]
    async fn completes_receiver_exactly_once_with_decoded_value() {
        let descriptor = CommandDescriptor::new("GET", true);
        let frame = encode_command([b"GET".as_slice(), b"k".as_slice()]);
        let (request, receiver) = Request::new(descriptor, frame, decode_bulk_opt);
        request.complete(Ok(Value::BulkString(Some(Bytes::from_static(b"v")))));
        let got = receiver.await.unwrap().unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_panic_on_complete() {
        let descriptor = CommandDescriptor::new("PING", true);
        let frame = encode_command([b"PING".as_slice()]);
        let (request, receiver) = Request::new(descriptor, frame, decode_ok);
        drop(receiver);
        request.complete(Ok(Value::SimpleString("OK".into())));
    }

    #[tokio::test]
    async fn fail_delivers_connection_scoped_error() {
        let descriptor = CommandDescriptor::new("SET", false);
        let frame = encode_command([b"SET".as_slice(), b"k".as_slice(), b"v".as_slice()]);
        let (request, receiver) = Request::new(descriptor, frame, decode_ok);
        request.fail(Error::ConnectionClosed);
        assert!(matches!(receiver.await.unwrap(), Err(Error::ConnectionClosed)));
    }
}

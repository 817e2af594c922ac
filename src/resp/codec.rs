use super::{parser, Value};
use crate::error::Error;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frames a byte stream into RESP [`Value`]s on decode, and writes
/// already-encoded command frames verbatim on encode.
///
/// The encoder side intentionally does no serialization: a [`Request`]
/// carries its frame pre-built (spec §4.2), so `encode` is a pure `memcpy`
/// into the socket's write buffer, keeping the writer's hot path free of
/// allocation under the write lock.
///
/// [`Request`]: crate::command::Request
#[derive(Debug, Default)]
pub struct RespCodec {
    _private: (),
}

impl Decoder for RespCodec {
    type Item = Value;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, Error> {
        match parser::parse(src)? {
            None => Ok(None),
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
        }
    }
}

impl Encoder<Bytes> for RespCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_chunk_invariant() {
        let full = b"+PONG\r\n*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n:42\r\n".to_vec();
        for split_at in 0..=full.len() {
            let mut codec = RespCodec::default();
            let mut buf = BytesMut::new();
            let mut values = Vec::new();
            buf.extend_from_slice(&full[..split_at]);
            while let Some(v) = codec.decode(&mut buf).unwrap() {
                values.push(v);
            }
            buf.extend_from_slice(&full[split_at..]);
            while let Some(v) = codec.decode(&mut buf).unwrap() {
                values.push(v);
            }
            assert_eq!(
                values,
                vec![
                    Value::SimpleString("PONG".into()),
                    Value::Array(Some(vec![
                        Value::BulkString(Some(Bytes::from_static(b"foo"))),
                        Value::BulkString(Some(Bytes::from_static(b"bar"))),
                    ])),
                    Value::Integer(42),
                ],
                "split at {split_at} lost or duplicated a value"
            );
        }
    }

    #[test]
    fn decode_byte_at_a_time_matches_single_shot() {
        let full = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n".to_vec();
        let mut codec = RespCodec::default();
        let mut buf = BytesMut::new();
        let mut got = None;
        for byte in &full {
            buf.extend_from_slice(&[*byte]);
            if let Some(v) = codec.decode(&mut buf).unwrap() {
                got = Some(v);
                break;
            }
        }
        assert_eq!(
            got,
            Some(Value::Array(Some(vec![
                Value::BulkString(Some(Bytes::from_static(b"SET"))),
                Value::BulkString(Some(Bytes::from_static(b"k"))),
                Value::BulkString(Some(Bytes::from_static(b"v"))),
            ])))
        );
    }

    #[test]
    fn malformed_input_closes_with_protocol_error() {
        let mut codec = RespCodec::default();
        let mut buf = BytesMut::from(&b"!garbage\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn encode_writes_frame_verbatim() {
        let mut codec = RespCodec::default();
        let mut dst = BytesMut::new();
        let frame = crate::resp::encode_command([b"PING".as_slice()]);
        codec.encode(frame.clone(), &mut dst).unwrap();
        assert_eq!(dst.as_ref(), frame.as_ref());
    }
}

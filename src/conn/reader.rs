//! Reader task: drains the socket's read half through the codec and hands
//! each decoded value to the supervisor. Knows nothing about requests,
//! pub/sub, or reconnection — it stops the moment the stream ends or errors.

use crate::error::Error;
use crate::resp::{RespCodec, Value};
use futures_util::StreamExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;

pub(crate) enum ReaderEvent {
    Value(Value),
    Closed(Error),
}

pub(crate) async fn run(read_half: OwnedReadHalf, tx: mpsc::UnboundedSender<ReaderEvent>) {
    let mut framed = FramedRead::new(read_half, RespCodec::default());
    loop {
        match framed.next().await {
            Some(Ok(value)) => {
                if tx.send(ReaderEvent::Value(value)).is_err() {
                    return;
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(ReaderEvent::Closed(e));
                return;
            }
            None => {
                let _ = tx.send(ReaderEvent::Closed(Error::ConnectionClosed));
                return;
            }
        }
    }
}

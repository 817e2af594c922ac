//! Pipelining writer (C4): coalesces outgoing frames into a single socket
//! write up to `max_write_batch_size` bytes, flushing early when the queue
//! runs dry so a lone in-flight request is never left waiting behind an
//! empty buffer. Frames arrive pre-encoded (spec §4.2); this task only ever
//! moves bytes.

use crate::error::Error;
use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

pub(crate) async fn run(
    write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    max_batch: usize,
    error_tx: mpsc::UnboundedSender<Error>,
) {
    let mut writer = BufWriter::new(write_half);
    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            None => return,
        };
        let mut batched = first.len();
        if let Err(e) = writer.write_all(&first).await {
            let _ = error_tx.send(Error::Io(e));
            return;
        }
        while batched < max_batch {
            match rx.try_recv() {
                Ok(frame) => {
                    batched += frame.len();
                    if let Err(e) = writer.write_all(&frame).await {
                        let _ = error_tx.send(Error::Io(e));
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        if let Err(e) = writer.flush().await {
            let _ = error_tx.send(Error::Io(e));
            return;
        }
    }
}

//! Spec §8 scenario 5: `SUBSCRIBE a b` resolves once both per-channel acks
//! have arrived (not after the first), the confirmed set lands in
//! `on_subscribe`, and a subsequent `message` push is dispatched to
//! `on_message` in the order it arrives on the wire.

#[path = "support.rs"]
mod support;

use aredis::{Subscriber, SubscriptionCallback};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

enum Event {
    Subscribe(String, i64),
    Message(String, Bytes),
}

struct ForwardingCallback {
    tx: mpsc::UnboundedSender<Event>,
}

impl SubscriptionCallback for ForwardingCallback {
    fn on_subscribe(&mut self, channel: String, count: i64) {
        let _ = self.tx.send(Event::Subscribe(channel, count));
    }
    fn on_message(&mut self, channel: String, payload: Bytes) {
        let _ = self.tx.send(Event::Message(channel, payload));
    }
}

#[tokio::test]
async fn subscribe_waits_for_every_ack_then_delivers_messages() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        let mut stream = support::accept(&listener).await;
        let mut buf = vec![0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*3\r\n$9\r\nSUBSCRIBE\r\n$1\r\na\r\n$1\r\nb\r\n");

        stream
            .write_all(b"*3\r\n$9\r\nsubscribe\r\n$1\r\na\r\n:1\r\n")
            .await
            .unwrap();
        // The caller's `subscribe` future must not resolve on this first ack alone.
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        stream
            .write_all(b"*3\r\n$9\r\nsubscribe\r\n$1\r\nb\r\n:2\r\n")
            .await
            .unwrap();

        stream
            .write_all(b"*3\r\n$7\r\nmessage\r\n$1\r\na\r\n$2\r\nhi\r\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscriber = Subscriber::spawn(
        aredis::ClientConfig::builder(addr.ip().to_string(), addr.port()).build(),
        Box::new(ForwardingCallback { tx }),
    );

    subscriber.subscribe(["a", "b"]).await.expect("subscribe should complete once both acks arrive");

    match rx.recv().await.expect("subscribe ack for a") {
        Event::Subscribe(channel, count) => {
            assert_eq!(channel, "a");
            assert_eq!(count, 1);
        }
        _ => panic!("expected a subscribe event"),
    }
    match rx.recv().await.expect("subscribe ack for b") {
        Event::Subscribe(channel, count) => {
            assert_eq!(channel, "b");
            assert_eq!(count, 2);
        }
        _ => panic!("expected a subscribe event"),
    }
    match rx.recv().await.expect("message event") {
        Event::Message(channel, payload) => {
            assert_eq!(channel, "a");
            assert_eq!(payload, Bytes::from_static(b"hi"));
        }
        _ => panic!("expected a message event"),
    }

    server.await.unwrap();
}

//! Spec §8 scenario 6: the connection drops with an unacknowledged,
//! non-idempotent `SET` and a concurrently pending, idempotent `GET` both
//! outstanding. The `SET` fails with `ConnectionClosed`; the `GET` survives
//! the drop and is replayed verbatim on the reconnected socket.

#[path = "support.rs"]
mod support;

use aredis::{Client, ClientConfig};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn non_idempotent_request_fails_idempotent_request_is_replayed() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        // First connection: reads both frames, then drops without replying
        // to either — simulating a mid-flight connection loss.
        {
            let mut stream = support::accept(&listener).await;
            let mut buf = vec![0u8; 256];
            let n = stream.read(&mut buf).await.unwrap();
            let expected = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
            assert_eq!(&buf[..n], expected.as_slice());
            // Dropping `stream` here closes the socket with nothing replied.
        }

        // Second connection: only the replayed GET should arrive, since the
        // client must not resend the non-idempotent SET.
        let mut stream = support::accept(&listener).await;
        let mut buf = vec![0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
        stream.write_all(b"$1\r\n1\r\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let config = ClientConfig::builder(addr.ip().to_string(), addr.port()).build();
    let client = Client::connect(config);

    let set_future = client.set("k", "1");
    let get_future = client.get("k");
    let (set_result, get_result) = tokio::join!(set_future, get_future);

    assert!(matches!(set_result, Err(aredis::Error::ConnectionClosed)));
    assert_eq!(get_result.unwrap(), Some(Bytes::from_static(b"1")));

    server.await.unwrap();
}

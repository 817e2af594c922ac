//! Spec §8 scenario 2: `SET k v` and `GET k` submitted without awaiting the
//! first future pipeline onto the wire as a single back-to-back write, and
//! each future resolves to the reply in submission order.

#[path = "support.rs"]
mod support;

use aredis::ClientConfig;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn pipelined_requests_complete_in_submission_order() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        let mut stream = support::accept(&listener).await;
        let expected = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
        let mut buf = vec![0u8; expected.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());
        stream.write_all(b"+OK\r\n$1\r\nv\r\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let config = ClientConfig::builder(addr.ip().to_string(), addr.port()).build();
    let client = aredis::Client::connect(config);

    // Both requests are submitted before either is awaited: this is the
    // pipelining property under test, not just two sequential round trips.
    let set_future = client.set("k", "v");
    let get_future = client.get("k");
    let (set_result, get_result) = tokio::join!(set_future, get_future);

    assert_eq!(set_result.unwrap(), true);
    assert_eq!(get_result.unwrap(), Some(Bytes::from_static(b"v")));

    server.await.unwrap();
}

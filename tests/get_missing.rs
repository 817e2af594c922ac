//! Spec §8 scenario 3: `GET` on a missing key resolves to `None`, not an
//! error — the RESP null bulk string (`$-1\r\n`) is a normal reply shape.

#[path = "support.rs"]
mod support;

use aredis::{Client, ClientConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn get_on_missing_key_resolves_to_none() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        let mut stream = support::accept(&listener).await;
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n");
        stream.write_all(b"$-1\r\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let config = ClientConfig::builder(addr.ip().to_string(), addr.port()).build();
    let client = Client::connect(config);
    let value = client.get("missing").await.expect("GET should complete");
    assert_eq!(value, None);

    server.await.unwrap();
}

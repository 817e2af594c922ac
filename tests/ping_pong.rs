//! Spec §8 scenario 1: `PING` on a fresh client completes with `PONG`.

#[path = "support.rs"]
mod support;

use aredis::{Client, ClientConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn ping_completes_once_server_replies_pong() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        let mut stream = support::accept(&listener).await;
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*1\r\n$4\r\nPING\r\n");
        stream.write_all(b"+PONG\r\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let config = ClientConfig::builder(addr.ip().to_string(), addr.port()).build();
    let client = Client::connect(config);
    client.ping().await.expect("PING should complete with PONG");

    server.await.unwrap();
}

//! Spec §8 scenario 4: a rejected `AUTH` during the handshake is fatal to
//! the connection attempt and surfaces as `ConnectionHealth::AuthFailed`,
//! and (with `auto_reconnect(false)`) the submitted call itself fails with
//! `AuthFailed` rather than hanging or silently retrying forever.

#[path = "support.rs"]
mod support;

use aredis::{AuthConfig, Client, ClientConfig, ConnectionHealth};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn rejected_auth_surfaces_as_auth_failed() {
    let (listener, addr) = support::bind().await;
    let server = tokio::spawn(async move {
        let mut stream = support::accept(&listener).await;
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*2\r\n$4\r\nAUTH\r\n$5\r\nwrong\r\n");
        stream
            .write_all(b"-WRONGPASS invalid username-password pair\r\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let config = ClientConfig::builder(addr.ip().to_string(), addr.port())
        .auth(AuthConfig::new("wrong"))
        .auto_reconnect(false)
        .build();
    let client = Client::connect(config);

    let mut health = client.health();
    let health_task = tokio::spawn(async move {
        loop {
            health.changed().await.expect("health channel stays open");
            if let ConnectionHealth::AuthFailed(kind, message) = health.borrow().clone() {
                return (kind, message);
            }
        }
    });

    let ping_result = client.ping().await;
    assert!(matches!(ping_result, Err(aredis::Error::AuthFailed { .. })));

    let (_kind, message) = health_task.await.expect("health task completes");
    assert!(message.contains("invalid username-password pair"));

    server.await.unwrap();
}

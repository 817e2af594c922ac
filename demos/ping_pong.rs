//! Minimal end-to-end exercise of the client: connect, `PING`, `SET`/`GET`
//! pipelined without awaiting the first future (spec §8 scenario 2), print
//! the connection-health transitions as they happen.

use aredis::{Client, ClientConfig, ConnectionHealth};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("aredis=info".parse().unwrap()))
        .init();

    let config = ClientConfig::builder("127.0.0.1", 6379)
        .connect_timeout(std::time::Duration::from_secs(3))
        .build();
    let client = Client::connect(config);

    let mut health = client.health();
    tokio::spawn(async move {
        while health.changed().await.is_ok() {
            let current = health.borrow().clone();
            log_health(&current);
        }
    });

    match client.ping().await {
        Ok(()) => println!("PING -> PONG"),
        Err(e) => {
            eprintln!("PING failed: {e}");
            return;
        }
    }

    // Pipelined: both requests are submitted before either is awaited.
    let set_fut = client.set("greeting", "hello, redis");
    let get_fut = client.get("greeting");
    let (set_result, get_result) = tokio::join!(set_fut, get_fut);

    match set_result {
        Ok(set) => println!("SET greeting -> {set}"),
        Err(e) => eprintln!("SET failed: {e}"),
    }
    match get_result {
        Ok(Some(value)) => println!("GET greeting -> {}", String::from_utf8_lossy(&value)),
        Ok(None) => println!("GET greeting -> (nil)"),
        Err(e) => eprintln!("GET failed: {e}"),
    }
}

fn log_health(health: &ConnectionHealth) {
    match health {
        ConnectionHealth::Connected => println!("[health] connected"),
        ConnectionHealth::Disconnected(reason) => println!("[health] disconnected: {reason}"),
        ConnectionHealth::ReconnectFailed(reason) => println!("[health] reconnect failed: {reason}"),
        ConnectionHealth::AuthFailed(kind, message) => println!("[health] auth failed ({kind}): {message}"),
    }
}

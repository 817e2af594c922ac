//! Shared plumbing for the integration tests: a loopback TCP listener the
//! test drives as a scripted server, reading and writing raw RESP bytes
//! directly rather than going through the client's own codec, so a test
//! failure can't be masked by a bug shared between the two sides.

use tokio::net::{TcpListener, TcpStream};

pub async fn bind() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("local_addr");
    (listener, addr)
}

pub async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = listener.accept().await.expect("accept connection");
    stream
}

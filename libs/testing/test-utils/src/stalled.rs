//! An endpoint that never answers.
//!
//! Provides a `StalledServer` that accepts TCP connections, reads whatever
//! the client sends and never writes a byte back. Tests use it to drive a
//! client into its deadline and then observe that the client actually hung
//! up instead of leaking the connection.

use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stalled TCP endpoint with connection bookkeeping
///
/// The accept loop is aborted when this struct is dropped.
pub struct StalledServer {
    addr: SocketAddr,
    requests: watch::Receiver<usize>,
    disconnects: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl StalledServer {
    /// Bind to an ephemeral port on localhost and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stalled server");
        let addr = listener
            .local_addr()
            .expect("Failed to read stalled server address");

        let (requests_tx, requests) = watch::channel(0usize);
        let (disconnects_tx, disconnects) = watch::channel(0usize);

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let requests_tx = requests_tx.clone();
                let disconnects_tx = disconnects_tx.clone();
                tokio::spawn(async move {
                    hold_open(stream, requests_tx).await;
                    disconnects_tx.send_modify(|n| *n += 1);
                });
            }
        });

        Self {
            addr,
            requests,
            disconnects,
            task,
        }
    }

    /// Base URL for HTTP clients, e.g. `http://127.0.0.1:40123`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Socket address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of connections that delivered at least one byte.
    pub fn requests_received(&self) -> usize {
        *self.requests.borrow()
    }

    /// Number of connections the client side has closed.
    pub fn disconnects(&self) -> usize {
        *self.disconnects.borrow()
    }

    /// Wait until some client has sent data.
    pub async fn wait_for_request(&self) {
        let mut rx = self.requests.clone();
        rx.wait_for(|n| *n > 0)
            .await
            .expect("Stalled server stopped before a request arrived");
    }

    /// Wait until some client has closed its connection.
    pub async fn wait_for_disconnect(&self) {
        let mut rx = self.disconnects.clone();
        rx.wait_for(|n| *n > 0)
            .await
            .expect("Stalled server stopped before a client disconnected");
    }
}

impl Drop for StalledServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read until the peer closes or errors, never writing anything back.
async fn hold_open(mut stream: TcpStream, requests_tx: watch::Sender<usize>) {
    let mut buf = [0u8; 4096];
    let mut counted = false;
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if !counted {
                    counted = true;
                    requests_tx.send_modify(|n| *n += 1);
                }
            }
        }
    }
}

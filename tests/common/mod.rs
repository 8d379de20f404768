//! Common test utilities for integration tests.
//!
//! Provides a scripted SSE server: a one-shot HTTP server on a fresh local
//! port whose response body is written chunk by chunk under test control, so
//! tests can interleave wire activity with subscribe/unsubscribe/close calls
//! deterministically.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ssefeed::{SseEvent, Subscription};

enum ServerAction {
    Chunk(&'static str),
    Abort,
}

/// A scripted one-connection SSE server.
///
/// Chunks are written on demand via [`send`](Self::send). Dropping the server
/// (or calling [`finish`](Self::finish)) ends the stream with a clean EOF;
/// [`abort`](Self::abort) resets the connection so the client observes a read
/// error instead.
pub struct ScriptedServer {
    url: String,
    tx: mpsc::Sender<ServerAction>,
}

impl ScriptedServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel::<ServerAction>(32);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            // Consume the request head.
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                if buf[..n].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }

            // No content-length and `connection: close`: the body runs until
            // the connection ends, like a real long-lived SSE response.
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      content-type: text/event-stream\r\n\
                      connection: close\r\n\r\n",
                )
                .await
                .unwrap();

            while let Some(action) = rx.recv().await {
                match action {
                    ServerAction::Chunk(body) => {
                        stream.write_all(body.as_bytes()).await.unwrap();
                        stream.flush().await.unwrap();
                    }
                    ServerAction::Abort => {
                        // Linger 0 turns the close into an RST, so the client
                        // sees a connection error rather than a clean EOF.
                        stream.set_linger(Some(Duration::ZERO)).unwrap();
                        return;
                    }
                }
            }
        });

        Self {
            url: format!("http://{}/events", addr),
            tx,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Write one raw chunk of the response body.
    pub async fn send(&self, chunk: &'static str) {
        self.tx.send(ServerAction::Chunk(chunk)).await.unwrap();
    }

    /// End the stream with a clean EOF.
    pub fn finish(self) {
        // Dropping the sender ends the server loop and closes the socket.
    }

    /// Reset the connection mid-stream.
    pub async fn abort(self) {
        self.tx.send(ServerAction::Abort).await.unwrap();
    }
}

/// Receive with a test-failure timeout, so a delivery bug hangs the assertion
/// instead of the whole test run.
pub async fn recv_within(sub: &mut Subscription) -> Option<SseEvent> {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for an event")
}

/// Receive from the error channel with a test-failure timeout.
pub async fn recv_error_within(sub: &mut Subscription) -> Option<ssefeed::FeedError> {
    tokio::time::timeout(Duration::from_secs(5), sub.recv_error())
        .await
        .expect("timed out waiting for an error")
}

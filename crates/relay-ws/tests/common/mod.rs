//! Mock upstream WebSocket server for integration tests.
//!
//! Provides a server that can:
//! - Accept connections and record when they arrived
//! - Drop every connection right after the handshake (abnormal closure, 1006)
//! - Push text and ping frames to connected clients
//! - Record pongs and close frames sent by the client

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Behaviour applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keep the connection open and serve pushed frames.
    Hold,
    /// Complete the handshake, then drop the TCP stream without a close frame.
    DropAfterHandshake,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub connected_at: Vec<Instant>,
    pub pongs: Vec<Vec<u8>>,
    pub close_codes: Vec<(u16, String)>,
}

/// A mock upstream server.
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    push_tx: broadcast::Sender<Message>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockUpstream {
    /// Start on an available loopback port.
    pub async fn start(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (push_tx, _) = broadcast::channel::<Message>(64);

        let recorded_clone = recorded.clone();
        let push_clone = push_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let recorded = recorded_clone.clone();
                        let push_rx = push_clone.subscribe();
                        tokio::spawn(handle_connection(stream, mode, recorded, push_rx));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            push_tx,
            recorded,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/stream", self.addr)
    }

    pub async fn connection_count(&self) -> usize {
        self.recorded.lock().await.connected_at.len()
    }

    pub async fn connection_times(&self) -> Vec<Instant> {
        self.recorded.lock().await.connected_at.clone()
    }

    pub async fn pongs(&self) -> Vec<Vec<u8>> {
        self.recorded.lock().await.pongs.clone()
    }

    pub async fn close_codes(&self) -> Vec<(u16, String)> {
        self.recorded.lock().await.close_codes.clone()
    }

    /// Push a frame to every connected client.
    pub fn push(&self, msg: Message) {
        let _ = self.push_tx.send(msg);
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    mode: Mode,
    recorded: Arc<Mutex<Recorded>>,
    mut push_rx: broadcast::Receiver<Message>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    recorded.lock().await.connected_at.push(Instant::now());

    if mode == Mode::DropAfterHandshake {
        drop(ws_stream);
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Pong(data))) => {
                    recorded.lock().await.pongs.push(data);
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(f) = frame {
                        recorded
                            .lock()
                            .await
                            .close_codes
                            .push((f.code.into(), f.reason.to_string()));
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            pushed = push_rx.recv() => match pushed {
                Ok(msg) => {
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

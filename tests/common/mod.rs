//! Shared utilities for integration tests: mock backends and a gateway runner.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use edge_gateway::config::{BackendsConfig, GatewayConfig};
use edge_gateway::{GatewayServer, Shutdown};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const WAIT: Duration = Duration::from_secs(2);

/// What a mock backend observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Request target (path and query) of a received request.
    Request(String),
    /// The gateway closed the upgraded connection.
    Closed,
}

/// Request head as the backend saw it.
#[derive(Debug, Default, Clone)]
pub struct RequestHead {
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_request_head<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<RequestHead> {
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let target = line.split_whitespace().nth(1)?.to_string();

    let mut head = RequestHead {
        target,
        headers: Vec::new(),
    };
    loop {
        line.clear();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return Some(head);
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            head.headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

/// HTTP backend answering every request with what it received:
/// `name`, request target, `Host` and `X-Forwarded-For`, one per line.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let Some(head) = read_request_head(&mut reader).await else {
                    return;
                };
                let body = format!(
                    "backend={}\npath={}\nhost={}\nxff={}\n",
                    name,
                    head.target,
                    head.header("host").unwrap_or(""),
                    head.header("x-forwarded-for").unwrap_or(""),
                );
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let mut socket = reader.into_inner();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Backend that accepts any upgrade with 101 and then echoes raw bytes.
/// Receiving `close` makes it hang up.
pub async fn start_raw_upgrade_backend() -> (SocketAddr, mpsc::UnboundedReceiver<BackendEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let events = events.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let Some(head) = read_request_head(&mut reader).await else {
                    return;
                };
                let _ = events.send(BackendEvent::Request(head.target));

                let mut socket = reader.into_inner();
                let handshake = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
                if socket.write_all(handshake.as_bytes()).await.is_err() {
                    return;
                }

                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => {
                            let _ = events.send(BackendEvent::Closed);
                            return;
                        }
                        Ok(n) if &buf[..n] == b"close" => {
                            let _ = socket.shutdown().await;
                            return;
                        }
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (addr, rx)
}

/// Backend that answers every upgrade with 101 and reports the full handshake
/// head it received. The connection is held open until the gateway drops it.
pub async fn start_upgrade_head_backend() -> (SocketAddr, mpsc::UnboundedReceiver<RequestHead>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (heads, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let heads = heads.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let Some(head) = read_request_head(&mut reader).await else {
                    return;
                };
                let _ = heads.send(head);

                let mut socket = reader.into_inner();
                let handshake = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
                if socket.write_all(handshake.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 256];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        return;
                    }
                }
            });
        }
    });

    (addr, rx)
}

/// WebSocket echo backend reporting the path of each handshake.
pub async fn start_websocket_backend() -> (SocketAddr, mpsc::UnboundedReceiver<BackendEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let events = events.clone();
            tokio::spawn(async move {
                let record = events.clone();
                let callback = move |request: &Request,
                                      response: Response|
                      -> Result<Response, ErrorResponse> {
                    let target = request
                        .uri()
                        .path_and_query()
                        .map(|pq| pq.as_str().to_string())
                        .unwrap_or_default();
                    let _ = record.send(BackendEvent::Request(target));
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    }
                }
                let _ = events.send(BackendEvent::Closed);
            });
        }
    });

    (addr, rx)
}

/// A URL nothing listens on.
pub fn dead_url() -> String {
    "http://127.0.0.1:1".to_string()
}

/// Config with every backend pointing nowhere.
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends = BackendsConfig {
        renderer_url: dead_url(),
        task_api_url: dead_url(),
        desktop_stream_url: format!("{}/websockify", dead_url()),
        local_desktop_url: Some(dead_url()),
    };
    config
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config, shutdown.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Send a raw upgrade handshake and return the connection with the
/// response head read off it.
pub async fn raw_upgrade(gateway: SocketAddr, path: &str) -> (TcpStream, String) {
    raw_upgrade_with(gateway, path, "Connection: Upgrade\r\n").await
}

/// Like [`raw_upgrade`], with `extra` (CRLF-terminated header lines) in place
/// of the default `Connection` header.
pub async fn raw_upgrade_with(
    gateway: SocketAddr,
    path: &str,
    extra: &str,
) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(gateway).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\n{}\r\n",
        path, gateway, extra
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Byte at a time so nothing after the head is consumed.
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(WAIT, stream.read(&mut byte))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(n, 0, "gateway closed before finishing the response head");
        head.push(byte[0]);
    }

    (stream, String::from_utf8_lossy(&head).into_owned())
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<BackendEvent>) -> BackendEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("backend event timed out")
        .expect("backend gone")
}

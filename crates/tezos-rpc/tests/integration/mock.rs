//! Minimal HTTP/1.1 node stand-in.
//!
//! Serves canned replies by path, records every request, and can write
//! chunked bodies that end without the terminating chunk or stay open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub enum Reply {
    Body {
        status: u16,
        content_type: Option<&'static str>,
        body: Vec<u8>,
    },
    Stream {
        chunks: Vec<Vec<u8>>,
        terminate: bool,
        hold_open: bool,
        reset: bool,
    },
}

impl Reply {
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, Some("application/json"), body)
    }

    pub fn status(status: u16, content_type: Option<&'static str>, body: impl Into<Vec<u8>>) -> Self {
        Reply::Body {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn no_content() -> Self {
        Self::status(204, None, Vec::new())
    }

    /// Chunked body, one chunk per element, properly terminated.
    pub fn stream(chunks: &[&str]) -> Self {
        Reply::Stream {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            terminate: true,
            hold_open: false,
            reset: false,
        }
    }

    /// Close the connection without writing the zero-length chunk.
    pub fn unterminated(self) -> Self {
        match self {
            Reply::Stream {
                chunks,
                hold_open,
                reset,
                ..
            } => Reply::Stream {
                chunks,
                terminate: false,
                hold_open,
                reset,
            },
            other => other,
        }
    }

    /// Keep the connection open after the last chunk.
    pub fn held_open(self) -> Self {
        match self {
            Reply::Stream { chunks, .. } => Reply::Stream {
                chunks,
                terminate: false,
                hold_open: true,
                reset: false,
            },
            other => other,
        }
    }

    /// Abort the connection with a TCP reset after the last chunk.
    pub fn reset(self) -> Self {
        match self {
            Reply::Stream { chunks, .. } => Reply::Stream {
                chunks,
                terminate: false,
                hold_open: false,
                reset: true,
            },
            other => other,
        }
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockNode {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockNode {
    pub async fn start(routes: Vec<(&str, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<HashMap<String, Reply>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, reply)| (path.to_string(), reply))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, routes.clone(), recorded.clone()));
            }
        });

        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(
    mut socket: TcpStream,
    routes: Arc<HashMap<String, Reply>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let path = target.split('?').next().unwrap_or_default().to_string();
    requests.lock().unwrap().push(Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let reply = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Reply::status(404, Some("text/plain"), "Not found"));

    match reply {
        Reply::Body {
            status,
            content_type,
            body,
        } => {
            let mut head = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", status, reason(status));
            if let Some(ct) = content_type {
                head.push_str(&format!("Content-Type: {}\r\n", ct));
            }
            if status != 204 {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
            head.push_str("\r\n");
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.flush().await;
        }
        Reply::Stream {
            chunks,
            terminate,
            hold_open,
            reset,
        } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                        Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for data in chunks {
                let mut frame = format!("{:x}\r\n", data.len()).into_bytes();
                frame.extend_from_slice(&data);
                frame.extend_from_slice(b"\r\n");
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            if terminate {
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.flush().await;
            }
            if reset {
                // Let the client read what was written before the RST
                tokio::time::sleep(Duration::from_millis(100)).await;
                #[allow(deprecated)]
                let _ = socket.set_linger(Some(Duration::ZERO));
                return;
            }
            if hold_open {
                // Park until the client hangs up
                let _ = socket.read(&mut chunk).await;
                return;
            }
        }
    }
    let _ = socket.shutdown().await;
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

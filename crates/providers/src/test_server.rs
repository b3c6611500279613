//! A one-shot HTTP server on localhost for exercising the clients over a
//! real socket.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve one request. The response head is written first, then each body
/// part in its own write with a pause in between so they reach the client
/// as separate reads. The connection is closed after the last part.
///
/// Returns the base URL and a handle resolving to the raw request.
pub async fn serve_once(content_type: &str, parts: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: {content_type}\r\nconnection: close\r\n\r\n"
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        for part in parts {
            tokio::time::sleep(Duration::from_millis(30)).await;
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
        }
        socket.shutdown().await.unwrap();
        request
    });

    (format!("http://{addr}"), handle)
}

/// Read headers and a `content-length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        if raw.len() >= head_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// `data: <json>\n\n` framing.
pub fn sse_event(json: &serde_json::Value) -> Vec<u8> {
    format!("data: {json}\n\n").into_bytes()
}

// src/fetch/test_server.rs
//! One-connection-per-reply HTTP responder for download tests.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

pub(crate) struct Reply {
    status: &'static str,
    body: Vec<u8>,
    /// Content-Length sent, when it differs from the body length.
    claimed_len: Option<usize>,
}

impl Reply {
    pub(crate) fn ok(body: &[u8]) -> Self {
        Reply {
            status: "200 OK",
            body: body.to_vec(),
            claimed_len: None,
        }
    }

    /// 200 with a Content-Length of `claimed_len`, then the connection closes after `body`.
    pub(crate) fn truncated(body: &[u8], claimed_len: usize) -> Self {
        Reply {
            status: "200 OK",
            body: body.to_vec(),
            claimed_len: Some(claimed_len),
        }
    }

    pub(crate) fn status(status: &'static str) -> Self {
        Reply {
            status,
            body: Vec::new(),
            claimed_len: None,
        }
    }
}

/// Bind an ephemeral port and answer one request per reply, in order.
/// Returns the base URL with a trailing slash.
pub(crate) async fn serve(replies: Vec<Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for reply in replies {
            let (mut sock, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reply.claimed_len.unwrap_or(reply.body.len())
            );
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(&reply.body).await;
            let _ = sock.shutdown().await;
        }
    });
    format!("http://{}/", addr)
}

//! In-process servers speaking the framed envelope protocol.
#![allow(dead_code)]

use std::sync::Once;

use corvus_common::transport::codec::{decode_envelope, encode_envelope};
use corvus_common::{CommandKind, Envelope, Node, ResponseCode, PONG};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Echoes every request back as a success response with the same body;
/// heartbeats get a PONG.
pub async fn spawn_echo_server() -> Node {
    spawn_server(|request| {
        Some(match request.kind {
            CommandKind::Heartbeat => {
                Envelope::response(request.seq, ResponseCode::Success, PONG.to_vec())
            }
            _ => Envelope::response(request.seq, ResponseCode::Success, request.body),
        })
    })
    .await
}

/// Accepts connections and reads requests but never answers.
pub async fn spawn_silent_server() -> Node {
    spawn_server(|_| None).await
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

async fn spawn_server<F>(respond: F) -> Node
where
    F: Fn(Envelope) -> Option<Envelope> + Clone + Send + Sync + 'static,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, respond.clone()));
        }
    });
    Node::new("127.0.0.1", addr.port())
}

async fn serve_connection<F>(mut stream: TcpStream, respond: F)
where
    F: Fn(Envelope) -> Option<Envelope>,
{
    loop {
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if stream.read_exact(&mut buf).await.is_err() {
            return;
        }
        let request = match decode_envelope(&buf) {
            Ok(request) => request,
            Err(_) => return,
        };
        if let Some(reply) = respond(request) {
            let encoded = encode_envelope(&reply).unwrap();
            let frame_len = (encoded.len() as u32).to_be_bytes();
            if stream.write_all(&frame_len).await.is_err()
                || stream.write_all(&encoded).await.is_err()
            {
                return;
            }
        }
    }
}

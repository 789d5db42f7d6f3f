//! WebSocket connection to the game server
//!
//! The socket is split into a reader task and a writer task. The game
//! session never touches the socket; it only sees the two channels of a
//! [`NetLink`].

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::protocol::{self, ClientMsg, ServerMsg};

/// How long shutdown waits for queued outbound frames to flush
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Something that arrived from the network
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Message(ServerMsg),
    /// Connection closed or failed; nothing follows
    Closed,
}

/// Session side of the connection
#[derive(Debug)]
pub struct NetLink {
    pub inbound: UnboundedReceiver<NetEvent>,
    pub outbound: UnboundedSender<ClientMsg>,
}

/// Network side of a [`NetLink`]
#[derive(Debug)]
pub struct NetPeer {
    pub inbound: UnboundedSender<NetEvent>,
    pub outbound: UnboundedReceiver<ClientMsg>,
}

impl NetLink {
    /// Create a connected link/peer pair without any socket
    pub fn pair() -> (NetLink, NetPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            NetLink {
                inbound: in_rx,
                outbound: out_tx,
            },
            NetPeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

/// Network error types
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Handles of the spawned I/O tasks
#[derive(Debug)]
pub struct NetTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl NetTasks {
    /// Give the writer a moment to flush (e.g. a final `leave`), then stop both tasks
    pub async fn shutdown(self) {
        let mut writer = self.writer;
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
            debug!("Writer did not finish in time, aborting");
            writer.abort();
        }
        self.reader.abort();
    }

    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Open a websocket to `url` and spawn its I/O tasks
pub async fn connect(url: &str) -> Result<(NetLink, NetTasks), NetError> {
    let (stream, _response) = connect_async(url).await?;
    info!(url = %url, "Connected to game server");
    Ok(spawn_io(stream))
}

/// Spawn reader and writer tasks over an established websocket
pub fn spawn_io<S>(stream: WebSocketStream<S>) -> (NetLink, NetTasks)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (link, peer) = NetLink::pair();
    let NetPeer {
        inbound: in_tx,
        outbound: mut out_rx,
    } = peer;
    let (mut ws_sink, mut ws_stream) = stream.split();

    // Reader task: WebSocket -> session queue
    let reader = tokio::spawn(async move {
        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Text(text)) => match protocol::decode(text.as_str()) {
                    Ok(msg) => {
                        if in_tx.send(NetEvent::Message(msg)).is_err() {
                            debug!("Inbound channel closed");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse server message");
                    }
                },
                Ok(Message::Binary(_)) => {
                    warn!("Received binary message, ignoring");
                }
                Ok(Message::Close(_)) => {
                    info!("Server closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
        let _ = in_tx.send(NetEvent::Closed);
    });

    // Writer task: session queue -> WebSocket
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let leaving = matches!(msg, ClientMsg::Leave);
            let json = match protocol::encode(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to encode client message");
                    continue;
                }
            };
            if let Err(e) = ws_sink.send(Message::text(json)).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
            if leaving {
                let _ = ws_sink.close().await;
                break;
            }
        }
    });

    (link, NetTasks { reader, writer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn messages_flow_through_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::text(r#"{"type":"welcome","id":7,"serverTime":100}"#))
                .await
                .unwrap();
            ws.send(Message::text("not json")).await.unwrap();
            ws.send(Message::text(r#"{"type":"leave","id":3}"#))
                .await
                .unwrap();

            let frame = ws.next().await.unwrap().unwrap();
            frame.into_text().unwrap().as_str().to_string()
        });

        let (mut link, tasks) = connect(&format!("ws://{addr}")).await.unwrap();

        assert_eq!(
            link.inbound.recv().await,
            Some(NetEvent::Message(ServerMsg::Welcome {
                id: 7,
                server_time: 100
            }))
        );
        // The malformed frame is skipped
        assert_eq!(
            link.inbound.recv().await,
            Some(NetEvent::Message(ServerMsg::Leave { id: 3 }))
        );

        link.outbound.send(ClientMsg::Leave).unwrap();
        assert_eq!(server.await.unwrap(), r#"{"type":"leave"}"#);

        assert_eq!(link.inbound.recv().await, Some(NetEvent::Closed));
        tasks.shutdown().await;
    }

    #[test]
    fn pair_connects_both_ends() {
        let (mut link, mut peer) = NetLink::pair();
        peer.inbound.send(NetEvent::Closed).unwrap();
        link.outbound.send(ClientMsg::Leave).unwrap();

        tokio_test::block_on(async {
            assert_eq!(link.inbound.recv().await, Some(NetEvent::Closed));
            assert_eq!(peer.outbound.recv().await, Some(ClientMsg::Leave));
        });
    }
}

//! WebSocket transport for credential channels
//!
//! Splits the socket and runs a writer task and a reader task per
//! connection. Dropping the [`Channel`] ends the writer,
//! which sends a close frame; the reader ends on close, read error, or when
//! the channel is dropped.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use super::{Channel, ConnectionId, Inbound, Outbound, CHANNEL_BUFFER};

/// Attach a WebSocket stream to a new channel
pub fn attach<S>(ws: WebSocketStream<S>, id: ConnectionId) -> Channel
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(CHANNEL_BUFFER);
    let (in_tx, in_rx) = mpsc::channel::<Inbound>(CHANNEL_BUFFER);

    tokio::spawn(async move {
        while let Some(item) = out_rx.recv().await {
            let text = match item.into_text() {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection = %id, error = %e, "Dropping unencodable envelope");
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                debug!(connection = %id, error = %e, "WebSocket write failed");
                break;
            }
        }
        let _ = write.close().await;
    });

    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            let inbound = match msg {
                Ok(Message::Text(text)) => Inbound::decode(&text),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => Inbound::decode(&text),
                    Err(_) => Inbound::Malformed("binary frame is not UTF-8".to_string()),
                },
                Ok(Message::Close(_)) => break,
                // tungstenite queues pongs itself
                Ok(_) => continue,
                Err(e) => {
                    debug!(connection = %id, error = %e, "WebSocket read ended");
                    break;
                }
            };
            if in_tx.send(inbound).await.is_err() {
                break;
            }
        }
        debug!(connection = %id, "WebSocket reader finished");
    });

    Channel::new(id, out_tx, in_rx)
}

//! Credential channels
//!
//! A [`Channel`] is one end of a persistent, bidirectional, message-oriented
//! connection. It carries [`Envelope`]s out and yields [`Inbound`] items in
//! FIFO order until the peer goes away, at which point `recv()` returns
//! `None` for good.
//!
//! One channel is one connection and carries at most one client identity.
//! Two transports are provided:
//! - [`ws::attach`] wraps a WebSocket stream (server or client side)
//! - [`Channel::pair`] links two in-memory ends

pub mod ws;

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::protocol::Envelope;
use crate::types::{KeyholeError, Result};

/// Per-direction buffer depth
pub(crate) const CHANNEL_BUFFER: usize = 32;

/// Identity of one connection
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Item received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Envelope(Envelope),
    /// A frame arrived but did not decode; carries the parse failure
    Malformed(String),
}

impl Inbound {
    /// Decode a text frame
    pub fn decode(text: &str) -> Self {
        match Envelope::parse(text) {
            Ok(env) => Self::Envelope(env),
            Err(e) => Self::Malformed(e.to_string()),
        }
    }
}

/// Item queued for the peer
#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    Envelope(Envelope),
    /// Raw text, bypassing envelope encoding
    #[cfg(test)]
    Raw(String),
}

impl Outbound {
    pub(crate) fn into_text(self) -> Result<String> {
        match self {
            Self::Envelope(env) => env.to_json(),
            #[cfg(test)]
            Self::Raw(text) => Ok(text),
        }
    }
}

/// One end of a credential channel
pub struct Channel {
    id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Receiver<Inbound>,
}

impl Channel {
    pub(crate) fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
        inbound: mpsc::Receiver<Inbound>,
    ) -> Self {
        Self {
            id,
            outbound,
            inbound,
        }
    }

    /// Two linked in-memory ends. Text goes through the same decode path as a
    /// socket, so malformed frames surface as [`Inbound::Malformed`].
    ///
    /// Must be called inside a tokio runtime.
    pub fn pair() -> (Channel, Channel) {
        let (a_out_tx, a_out_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (b_out_tx, b_out_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (a_in_tx, a_in_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (b_in_tx, b_in_rx) = mpsc::channel(CHANNEL_BUFFER);

        tokio::spawn(forward(a_out_rx, b_in_tx));
        tokio::spawn(forward(b_out_rx, a_in_tx));

        (
            Channel::new(ConnectionId::new(), a_out_tx, a_in_rx),
            Channel::new(ConnectionId::new(), b_out_tx, b_in_rx),
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an envelope for the peer
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound
            .send(Outbound::Envelope(envelope))
            .await
            .map_err(|_| KeyholeError::ChannelClosed)
    }

    /// Queue an envelope, giving up at `deadline`.
    ///
    /// A peer that stops reading fills the outbound queue; this is the send
    /// to use whenever that must not stall the caller.
    pub async fn send_before(&self, envelope: Envelope, deadline: Instant) -> Result<()> {
        tokio::time::timeout_at(deadline, self.send(envelope))
            .await
            .map_err(|_| KeyholeError::HandshakeTimeout)?
    }

    /// Queue raw text for the peer, skipping envelope encoding
    #[cfg(test)]
    pub(crate) async fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(Outbound::Raw(text.into()))
            .await
            .map_err(|_| KeyholeError::ChannelClosed)
    }

    /// Next item from the peer; `None` once the connection is closed
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("id", &self.id).finish()
    }
}

async fn forward(mut rx: mpsc::Receiver<Outbound>, tx: mpsc::Sender<Inbound>) {
    while let Some(item) = rx.recv().await {
        let inbound = match item {
            Outbound::Envelope(env) => Inbound::Envelope(env),
            #[cfg(test)]
            Outbound::Raw(text) => Inbound::decode(&text),
        };
        if tx.send(inbound).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, mut b) = Channel::pair();

        a.send(Envelope::token_request("one")).await.unwrap();
        a.send(Envelope::error("two")).await.unwrap();

        assert_eq!(
            b.recv().await,
            Some(Inbound::Envelope(Envelope::token_request("one")))
        );
        assert_eq!(b.recv().await, Some(Inbound::Envelope(Envelope::error("two"))));
    }

    #[tokio::test]
    async fn test_raw_garbage_is_malformed() {
        let (a, mut b) = Channel::pair();
        a.send_raw("{not json").await.unwrap();

        match b.recv().await {
            Some(Inbound::Malformed(reason)) => assert!(reason.contains("malformed")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drop_closes_peer() {
        let (a, mut b) = Channel::pair();
        drop(a);
        assert_eq!(b.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_after_peer_gone_is_channel_closed() {
        let (a, b) = Channel::pair();
        drop(b);

        // The forwarder notices on its next delivery attempt
        let mut result = Ok(());
        for _ in 0..(CHANNEL_BUFFER * 4) {
            result = a.send(Envelope::error("x")).await;
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(KeyholeError::ChannelClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_gives_up_when_peer_stops_reading() {
        let (a, _b) = Channel::pair();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);

        // Nobody reads `_b`, so both queues and the forwarder eventually fill
        let mut result = Ok(());
        for _ in 0..(CHANNEL_BUFFER * 4) {
            result = a.send_before(Envelope::error("x"), deadline).await;
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(KeyholeError::HandshakeTimeout)));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}

//! Challenge login over a credential channel

use std::time::Duration;

use tokio_tungstenite::connect_async_with_config;
use tracing::{debug, info};

use super::handshake::{HandshakeClient, Step};
use crate::channel::{ws, Channel, ConnectionId};
use crate::credentials::CredentialBundle;
use crate::identity::Signer;
use crate::types::{KeyholeError, Result};

/// Run one handshake to completion on an already open channel
pub async fn run_handshake(channel: &mut Channel, signer: &dyn Signer) -> Result<CredentialBundle> {
    let mut client = HandshakeClient::new(signer);
    let mut step = client.start();

    loop {
        match step {
            Step::Send(envelope) => {
                debug!(kind = envelope.kind(), "Sending envelope");
                channel.send(envelope).await?;
            }
            Step::Complete(bundle) => return Ok(bundle),
            Step::Fail(err) => return Err(err),
            Step::Ignore => {}
        }

        step = match channel.recv().await {
            Some(inbound) => client.on_inbound(inbound),
            None => client.on_closed(),
        };
    }
}

/// Connect to `ws_url`, prove possession of `signer`'s key and return the
/// issued credentials. `timeout` bounds the whole attempt.
pub async fn login_with_challenge(
    ws_url: &str,
    signer: &dyn Signer,
    timeout: Duration,
) -> Result<CredentialBundle> {
    let attempt = async {
        let (stream, _) = connect_async_with_config(ws_url, None, false)
            .await
            .map_err(|e| KeyholeError::WebSocket(format!("WebSocket connect failed: {}", e)))?;
        let mut channel = ws::attach(stream, ConnectionId::new());
        debug!(url = %ws_url, connection = %channel.id(), "Connected");

        run_handshake(&mut channel, signer).await
    };

    let bundle = tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| KeyholeError::HandshakeTimeout)??;

    info!(identifier = %signer.public_identifier(), expires_at = %bundle.expires_at, "Login complete");
    Ok(bundle)
}

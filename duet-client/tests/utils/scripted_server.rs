use anyhow::{Context, Result};
use duet_client::SignalingLink;
use duet_core::SignalMessage;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single expected frame (ms).
pub const FRAME_TIMEOUT_MS: u64 = 10_000;

/// The server side of a SignalingLink, scripted by the test.
pub struct ScriptedServer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<String>>,
}

pub fn scripted_link() -> (SignalingLink, ScriptedServer) {
    let (outbound, from_client) = mpsc::unbounded_channel();
    let (to_client, inbound) = mpsc::unbounded_channel();

    let server = ScriptedServer {
        from_client,
        to_client: Some(to_client),
    };
    (SignalingLink::from_channels(outbound, inbound), server)
}

impl ScriptedServer {
    pub fn send(&self, msg: &SignalMessage) -> Result<()> {
        self.send_raw(msg.encode()?)
    }

    pub fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.to_client
            .as_ref()
            .context("Server already closed the link")?
            .send(text.into())
            .context("Client dropped the link")
    }

    /// `None` once the client has dropped its end.
    pub async fn recv(&mut self) -> Result<Option<SignalMessage>> {
        let frame = tokio::time::timeout(
            Duration::from_millis(FRAME_TIMEOUT_MS),
            self.from_client.recv(),
        )
        .await
        .context("Timeout waiting for client frame")?;

        frame
            .map(|text| SignalMessage::decode(&text).context("Client sent malformed frame"))
            .transpose()
    }

    /// Wait for the next frame of the given kind, skipping others.
    pub async fn expect(&mut self, kind: &str) -> Result<SignalMessage> {
        loop {
            let msg = self.recv().await?.context("Client closed the link")?;
            if msg.kind() == kind {
                return Ok(msg);
            }
            tracing::debug!("[ScriptedServer] skipping {}", msg.kind());
        }
    }

    /// Kinds of every frame sent until the client drops the link.
    pub async fn drain_kinds(&mut self) -> Result<Vec<&'static str>> {
        let mut kinds = Vec::new();
        while let Some(msg) = self.recv().await? {
            kinds.push(msg.kind());
        }
        Ok(kinds)
    }

    /// Drop the server half, which the client sees as a lost connection.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

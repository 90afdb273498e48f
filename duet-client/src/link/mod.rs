mod ws_link;

pub use ws_link::*;

use tokio::sync::mpsc;

/// Duplex, message-oriented signaling connection as seen by a call session.
///
/// Frames are JSON text; the session encodes and decodes them. The inbound half
/// yielding `None` means the connection is gone.
pub struct SignalingLink {
    pub(crate) outbound: mpsc::UnboundedSender<String>,
    pub(crate) inbound: mpsc::UnboundedReceiver<String>,
}

impl SignalingLink {
    /// Wrap an existing pair of frame channels, e.g. an in-process server connection.
    pub fn from_channels(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self { outbound, inbound }
    }
}

//! Wire format for the call-signaling WebSocket.
//!
//! Frames are text JSON with a required `type` tag. The relay only inspects
//! `type` and `target`; SDP and ICE payloads are opaque and forwarded
//! verbatim, so inbound frames are parsed as a thin envelope rather than a
//! full message model.

use serde::Deserialize;

/// Message types carried over the signaling socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    UserJoined,
    UserLeft,
    Disconnect,
}

impl SignalKind {
    /// Offer/answer/ICE frames are relayed to a named target participant.
    pub fn is_relay(self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::IceCandidate)
    }
}

/// Envelope view of an inbound signaling frame. Unknown `type` values and
/// unparseable JSON fail the read and close the connection.
#[derive(Debug, Deserialize)]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Target participant for relayed frames; absent on control frames.
    #[serde(default)]
    pub target: Option<String>,
}

impl SignalEnvelope {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Server-built notice that `user_id` joined the channel.
pub fn user_joined_frame(user_id: &str) -> String {
    serde_json::json!({ "type": "user-joined", "user_id": user_id }).to_string()
}

/// Server-built notice that `user_id` left the channel.
pub fn user_left_frame(user_id: &str) -> String {
    serde_json::json!({ "type": "user-left", "user_id": user_id }).to_string()
}

//! JSON wire frames exchanged over the relay WebSocket.
//!
//! Each frame is one UTF-8 text message containing a JSON object whose
//! `type` field selects the variant. Anything that fails to parse into
//! a known variant with its required routing fields present is
//! discarded at the boundary and never answered.
//!
//! Payload fields beyond the routing metadata are opaque to the relay:
//! forwarded frames are relayed as the sender's original text, so
//! fields this module does not model pass through untouched.

use crate::types::{reason, ClientId};
use serde::Deserialize;
use serde_json::json;

/// A client-to-relay frame, reduced to its routing metadata.
///
/// Variants map 1:1 to wire `type` values in `snake_case`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Bind an identifier and public key to this connection.
    Register {
        /// Identifier the client claims for itself.
        uuid: ClientId,
        /// Base64 public key material, opaque to the relay.
        #[serde(default)]
        public_key: String,
    },
    /// Look up the cached public key of `target`.
    GetPublicKey {
        /// Identifier whose key is requested.
        target: ClientId,
        /// Identifier the response is routed to.
        from: ClientId,
    },
    /// Encrypted chat message, relayed verbatim.
    Message {
        /// Destination identifier.
        to: ClientId,
        /// Self-reported sender identifier.
        from: ClientId,
    },
    /// Encrypted file chunk, relayed verbatim with no failure notice.
    FileChunk {
        /// Destination identifier.
        to: ClientId,
    },
    /// WebRTC call offer, relayed verbatim.
    WebrtcOffer {
        /// Destination identifier.
        to: ClientId,
    },
    /// WebRTC call answer, relayed verbatim.
    WebrtcAnswer {
        /// Destination identifier.
        to: ClientId,
    },
    /// WebRTC ICE candidate, relayed verbatim.
    WebrtcIce {
        /// Destination identifier.
        to: ClientId,
    },
    /// Presence/status update, broadcast to every other live connection.
    Status {
        /// Identifier excluded from the broadcast.
        from: ClientId,
    },
}

impl ClientFrame {
    /// Parse one inbound text frame.
    ///
    /// Returns `None` for unparseable JSON, unknown `type` values, and
    /// frames whose required routing fields are missing or empty —
    /// all of which the router silently discards.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let frame: Self = serde_json::from_str(raw).ok()?;
        frame.routing_complete().then_some(frame)
    }

    /// Empty routing fields are treated the same as absent ones.
    fn routing_complete(&self) -> bool {
        match self {
            Self::Register { uuid, .. } => !uuid.is_empty(),
            Self::GetPublicKey { target, from } => !target.is_empty() && !from.is_empty(),
            Self::Message { to, from } => !to.is_empty() && !from.is_empty(),
            Self::FileChunk { to }
            | Self::WebrtcOffer { to }
            | Self::WebrtcAnswer { to }
            | Self::WebrtcIce { to } => !to.is_empty(),
            Self::Status { from } => !from.is_empty(),
        }
    }

    /// Wire name of this frame's `type` field, for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::GetPublicKey { .. } => "get_public_key",
            Self::Message { .. } => "message",
            Self::FileChunk { .. } => "file_chunk",
            Self::WebrtcOffer { .. } => "webrtc_offer",
            Self::WebrtcAnswer { .. } => "webrtc_answer",
            Self::WebrtcIce { .. } => "webrtc_ice",
            Self::Status { .. } => "status",
        }
    }
}

/// A relay-to-client frame originated by the relay itself.
///
/// Forwarded traffic never passes through this type; only registration
/// acknowledgments, key lookup responses, and failure notices do.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges a successful `register`.
    Registered {
        /// Identifier that was bound.
        uuid: ClientId,
    },
    /// Successful public key lookup.
    PublicKeyResponse {
        /// Identifier the key belongs to.
        target: ClientId,
        /// Cached public key material.
        public_key: String,
    },
    /// Key lookup miss or failed call setup.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// A `message` frame could not be delivered.
    DeliveryFailed {
        /// Destination that was unreachable.
        to: ClientId,
        /// Failure reason, see [`crate::types::reason`].
        reason: String,
    },
}

impl ServerFrame {
    /// Error frame for a public key lookup miss.
    #[must_use]
    pub fn key_not_found(target: &str) -> Self {
        Self::Error {
            message: format!("UUID {target} not found or has no public key"),
        }
    }

    /// Failure notice for an undeliverable `message` frame.
    #[must_use]
    pub fn recipient_offline(to: &str) -> Self {
        Self::DeliveryFailed {
            to: to.to_owned(),
            reason: reason::RECIPIENT_OFFLINE.to_owned(),
        }
    }

    /// Error frame for a `webrtc_offer` whose callee is unreachable.
    #[must_use]
    pub fn callee_offline(to: &str) -> Self {
        Self::Error {
            message: format!("Call recipient {to} is offline"),
        }
    }

    /// Serialize to the single-line JSON text sent on the wire.
    #[must_use]
    pub fn to_text(&self) -> String {
        let value = match self {
            Self::Registered { uuid } => json!({
                "type": "registered",
                "uuid": uuid,
            }),
            Self::PublicKeyResponse { target, public_key } => json!({
                "type": "public_key_response",
                "target": target,
                "public_key": public_key,
            }),
            Self::Error { message } => json!({
                "type": "error",
                "message": message,
            }),
            Self::DeliveryFailed { to, reason } => json!({
                "type": "delivery_failed",
                "to": to,
                "reason": reason,
            }),
        };
        value.to_string()
    }
}

//! Core type definitions and protocol constants for the relay.

/// A client-chosen opaque identifier used as a routing address.
///
/// Clients generate their own identifiers; the relay makes no
/// uniqueness claim beyond last-register-wins.
pub type ClientId = String;

/// Request path of the WebSocket endpoint. Upgrades on any other path
/// are rejected.
pub const ENDPOINT_PATH: &str = "/ws";

/// Reason strings carried in `delivery_failed` frames.
pub mod reason {
    /// The destination has no live connection, or its connection died
    /// during delivery.
    pub const RECIPIENT_OFFLINE: &str = "recipient_offline";
}

//! Common wire-protocol types shared across the relay stack.
//!
//! This crate provides:
//! - JSON frame definitions and boundary parsing ([`frame`])
//! - Protocol type definitions and constants ([`types`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod frame;
pub mod types;

pub use frame::{ClientFrame, ServerFrame};
pub use types::ClientId;

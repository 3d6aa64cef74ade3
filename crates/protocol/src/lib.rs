//! Wire types for the remote-object channel protocol.
//!
//! This crate contains the serde-serializable shapes exchanged between the
//! client runtime and the driver process. Types here are pure data: they carry
//! no behavior beyond serialization and a few constructors.
//!
//! - [`Request`], [`Response`], [`Event`] and the [`Message`] union
//! - [`CreateParams`] / [`DisposeParams`] for the lifecycle events
//! - [`LogEvent`] for the structured API diagnostics

pub mod log_event;
pub mod message;

pub use log_event::*;
pub use message::*;

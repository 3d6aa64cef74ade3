//! Remote-object channel runtime.
//!
//! Represents driver-side objects as local [`RemoteObject`] handles, keeps them
//! in an identifier-keyed ownership tree, forwards calls through a per-object
//! [`Channel`], and instruments every API call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  wrap_api_call   ┌──────────────┐
//! │ RemoteObject │ ───────────────▶ │  instrument  │  started/succeeded/failed
//! └──────┬───────┘                  └──────────────┘
//!        │ channel().invoke(method, params)
//! ┌──────▼───────┐  ProtocolSchema  ┌──────────────┐
//! │   Channel    │ ───────────────▶ │  Connection  │  ids, correlation, events
//! └──────────────┘                  └──────┬───────┘
//!                                          │ Transport
//!                                          ▼
//!                                     driver process
//! ```
//!
//! Objects are stored in an arena ([`ObjectStore`]) keyed by identifier. A
//! node refers to its parent and children by identifier only, so disposing a
//! node is a walk over identifiers rather than over owning references.

pub mod channel;
pub mod connection;
pub mod error;
pub mod instrument;
pub mod remote_object;
pub mod schema;
pub mod transport;

pub use channel::{Channel, ChannelEvent, Member, classify_member};
pub use connection::object_store::ObjectStore;
pub use connection::{Connection, ConnectionLike, ConnectionOptions};
pub use error::{Error, Result};
pub use instrument::{ApiLogger, TracingLogger, wrap_api_call};
pub use remote_object::{DisposeReason, ObjectOptions, ParentOrConnection, RemoteObject, ScopeState};
pub use schema::{MethodDescriptor, ProtocolSchema, UnknownMethodPolicy, ValueShape};
pub use transport::{ChannelTransport, ServerEnd, Transport, TransportParts};

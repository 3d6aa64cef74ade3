//! Error types for the channel runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the channel runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// An object with this identifier is already registered.
	#[error("Duplicate object identifier: {guid}")]
	DuplicateIdentifier { guid: String },

	/// Object not found in the connection registry.
	#[error("Object not found: {guid}")]
	ObjectNotFound { guid: String },

	/// Dispatch through an object that has already been disposed.
	#[error("Object has been disposed: {guid}")]
	ObjectDisposed { guid: String },

	/// A structural member name was passed to the remote dispatch path.
	#[error("'{0}' is a local channel member and cannot be invoked remotely")]
	ReservedMember(String),

	/// Method is not in the schema and the schema rejects unknown methods.
	#[error("Unknown method {object_type}.{method}")]
	UnknownMethod { object_type: String, method: String },

	/// Parameters or result did not match the method descriptor.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// Protocol-level error (malformed or unexpected message).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Transport-level error.
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Connection closed before a reply arrived.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// The remote call itself failed.
	#[error("{message}")]
	Remote {
		/// Error type name (e.g., "TimeoutError", "Error")
		name: String,
		/// Human-readable error message
		message: String,
		/// Stack trace from the driver (if available)
		stack: Option<String>,
	},

	/// An error raised inside an instrumented API call, with the API name as context.
	#[error("{api_name}: {source}")]
	Api {
		api_name: String,
		#[source]
		source: Box<Error>,
	},

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Wraps `self` with the name of the API call it escaped from.
	pub fn in_api(self, api_name: impl Into<String>) -> Self {
		Error::Api {
			api_name: api_name.into(),
			source: Box::new(self),
		}
	}

	/// Returns the innermost error, looking through [`Error::Api`] context.
	pub fn root_cause(&self) -> &Error {
		match self {
			Error::Api { source, .. } => source.root_cause(),
			other => other,
		}
	}

	/// Returns the API name if this error carries call context.
	pub fn api_name(&self) -> Option<&str> {
		match self {
			Error::Api { api_name, .. } => Some(api_name),
			_ => None,
		}
	}

	/// Returns the error name if this is a Remote error.
	pub fn error_name(&self) -> Option<&str> {
		match self.root_cause() {
			Error::Remote { name, .. } => Some(name),
			_ => None,
		}
	}

	/// Returns the stack trace if this is a Remote error with a stack.
	pub fn stack_trace(&self) -> Option<&str> {
		match self.root_cause() {
			Error::Remote { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}

	/// Returns true if the remote call itself failed.
	pub fn is_remote(&self) -> bool {
		matches!(self.root_cause(), Error::Remote { .. })
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		match self.root_cause() {
			Error::Timeout(_) => true,
			Error::Remote { name, .. } => name == "TimeoutError",
			_ => false,
		}
	}

	/// Returns true if the target object is gone.
	pub fn is_disposed(&self) -> bool {
		match self.root_cause() {
			Error::ObjectDisposed { .. } => true,
			Error::Remote { name, .. } => name == "TargetClosedError",
			_ => false,
		}
	}
}

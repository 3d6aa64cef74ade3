//! Transport capability consumed by [`Connection`](crate::Connection).
//!
//! How bytes reach the driver is not this crate's concern: a transport only
//! has to accept outbound JSON messages and feed inbound ones into an mpsc
//! channel. [`ChannelTransport`] is an in-memory implementation whose other
//! end ([`ServerEnd`]) plays the driver in tests and embeddings.

use futures_util::future::BoxFuture;
use pw_protocol::{CreateParams, DisposeParams, Event, Request, Response};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Outbound half of a transport.
pub trait Transport: Send {
	/// Delivers one message to the driver.
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
}

/// Everything [`Connection::new`](crate::Connection::new) needs from a transport.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	/// Inbound messages from the driver; closing it ends the connection.
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// In-memory transport backed by tokio channels.
pub struct ChannelTransport {
	tx: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
	/// Creates a connected pair: client-side parts and the driver-side end.
	pub fn pair() -> (TransportParts, ServerEnd) {
		let (request_tx, request_rx) = mpsc::unbounded_channel();
		let (reply_tx, reply_rx) = mpsc::unbounded_channel();

		let parts = TransportParts {
			sender: Box::new(ChannelTransport { tx: request_tx }),
			message_rx: reply_rx,
		};
		let server = ServerEnd {
			requests: request_rx,
			replies: reply_tx,
		};
		(parts, server)
	}
}

impl Transport for ChannelTransport {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
		let result = self
			.tx
			.send(message)
			.map_err(|_| Error::TransportError("peer dropped".to_string()));
		Box::pin(async move { result })
	}
}

/// Driver side of a [`ChannelTransport`]. Dropping it closes the connection.
pub struct ServerEnd {
	requests: mpsc::UnboundedReceiver<Value>,
	replies: mpsc::UnboundedSender<Value>,
}

impl ServerEnd {
	/// Receives the next request sent by the client.
	///
	/// Returns `None` once the client side is gone.
	pub async fn next_request(&mut self) -> Option<Request> {
		loop {
			let value = self.requests.recv().await?;
			match serde_json::from_value(value) {
				Ok(request) => return Some(request),
				Err(e) => tracing::warn!(error = %e, "ServerEnd: skipping malformed request"),
			}
		}
	}

	pub fn send_response(&self, response: Response) -> Result<()> {
		self.push(serde_json::to_value(response)?)
	}

	pub fn send_event(&self, event: Event) -> Result<()> {
		self.push(serde_json::to_value(event)?)
	}

	/// Announces a new object under `parent_guid` (`""` for the root).
	pub fn create(
		&self,
		parent_guid: &str,
		type_name: &str,
		guid: &str,
		initializer: Value,
	) -> Result<()> {
		let params = CreateParams {
			type_name: type_name.to_string(),
			guid: guid.to_string(),
			initializer,
		};
		self.send_event(Event {
			guid: parent_guid.into(),
			method: pw_protocol::CREATE_METHOD.to_string(),
			params: serde_json::to_value(params)?,
		})
	}

	/// Announces that `guid` went away; `gc` marks it as garbage collected.
	pub fn dispose(&self, guid: &str, gc: bool) -> Result<()> {
		let params = DisposeParams {
			reason: gc.then(|| "gc".to_string()),
		};
		self.send_event(Event {
			guid: guid.into(),
			method: pw_protocol::DISPOSE_METHOD.to_string(),
			params: serde_json::to_value(params)?,
		})
	}

	/// Pushes a raw message, bypassing the typed helpers.
	pub fn push(&self, message: Value) -> Result<()> {
		self.replies
			.send(message)
			.map_err(|_| Error::TransportError("client dropped".to_string()))
	}
}

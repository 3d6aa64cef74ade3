//! Channel - per-object forwarding stub.
//!
//! Every [`RemoteObject`] owns a `Channel`. Local members (event subscription,
//! the back-reference to the owning object, identity) are plain methods here;
//! anything else goes through [`Channel::invoke`], which turns a method name
//! and params into a request for the connection.

use std::sync::{Arc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::connection::ConnectionLike;
use crate::error::{Error, Result};
use crate::remote_object::RemoteObject;
use crate::schema::UnknownMethodPolicy;

const EVENT_CAPACITY: usize = 64;

/// Member names that belong to the local channel surface.
const STRUCTURAL_MEMBERS: &[&str] = &[
	"then",
	"emit",
	"on",
	"once",
	"addEventListener",
	"removeEventListener",
	"domain",
];

/// How a member name is handled by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
	/// Served locally, never forwarded.
	Structural,
	/// Forwarded to the driver.
	Remote,
}

/// Classifies a member name. `_`-prefixed names are private and local.
pub fn classify_member(name: &str) -> Member {
	if name.starts_with('_') || STRUCTURAL_MEMBERS.contains(&name) {
		Member::Structural
	} else {
		Member::Remote
	}
}

/// Event pushed by the driver for the owning object.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
	pub method: String,
	pub params: Value,
}

/// Forwarding stub bound to one remote object.
#[derive(Clone)]
pub struct Channel {
	object: Weak<RemoteObject>,
	connection: Weak<dyn ConnectionLike>,
	type_name: Arc<str>,
	guid: Arc<str>,
	events: broadcast::Sender<ChannelEvent>,
}

impl Channel {
	pub(crate) fn new(
		object: Weak<RemoteObject>,
		connection: Weak<dyn ConnectionLike>,
		type_name: Arc<str>,
		guid: Arc<str>,
	) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			object,
			connection,
			type_name,
			guid,
			events,
		}
	}

	/// Returns the owning object, unless it has been dropped.
	pub fn object(&self) -> Option<Arc<RemoteObject>> {
		self.object.upgrade()
	}

	/// Returns the GUID this channel represents.
	pub fn guid(&self) -> &str {
		&self.guid
	}

	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	/// Subscribes to events the driver sends for this object.
	pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
		self.events.subscribe()
	}

	pub(crate) fn emit(&self, method: &str, params: Value) {
		// No subscribers is fine.
		let _ = self.events.send(ChannelEvent {
			method: method.to_string(),
			params,
		});
	}

	/// Invokes `method` on the remote object.
	///
	/// Known methods are checked against their [`MethodDescriptor`](crate::MethodDescriptor)
	/// on the way out and on the way back. Unknown methods follow the schema's
	/// [`UnknownMethodPolicy`].
	pub async fn invoke(&self, method: &str, params: Value) -> Result<Value> {
		if classify_member(method) == Member::Structural {
			return Err(Error::ReservedMember(method.to_string()));
		}
		self.ensure_live()?;
		let connection = self.connection()?;

		let descriptor = connection
			.schema()
			.lookup(&self.type_name, method)
			.copied();

		match descriptor {
			Some(descriptor) => {
				descriptor.params.check("params", method, &params)?;
				let result = self.forward(&connection, method, params).await?;
				descriptor.result.check("result", method, &result)?;
				Ok(result)
			}
			None => match connection.schema().unknown_method_policy() {
				UnknownMethodPolicy::Forward => {
					tracing::debug!(
						guid = %self.guid,
						type_name = %self.type_name,
						method,
						"forwarding method not listed in schema"
					);
					self.forward(&connection, method, params).await
				}
				UnknownMethodPolicy::Reject => Err(Error::UnknownMethod {
					object_type: self.type_name.to_string(),
					method: method.to_string(),
				}),
			},
		}
	}

	/// Sends a method call and deserializes the result.
	pub async fn send<P: Serialize, R: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> Result<R> {
		let params = serde_json::to_value(params)?;
		let response = self.invoke(method, params).await?;
		serde_json::from_value(response).map_err(Into::into)
	}

	/// Sends a method call with no parameters.
	pub async fn send_no_params<R: DeserializeOwned>(&self, method: &str) -> Result<R> {
		self.send(method, Value::Null).await
	}

	/// Sends a method call that returns no result.
	pub async fn send_no_result<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
		let _: Value = self.send(method, params).await?;
		Ok(())
	}

	async fn forward(
		&self,
		connection: &Arc<dyn ConnectionLike>,
		method: &str,
		params: Value,
	) -> Result<Value> {
		connection
			.send_message_to_server(&self.type_name, &self.guid, method, params)
			.await
	}

	fn connection(&self) -> Result<Arc<dyn ConnectionLike>> {
		self.connection.upgrade().ok_or(Error::ChannelClosed)
	}

	fn ensure_live(&self) -> Result<()> {
		match self.object.upgrade() {
			Some(object) if !object.is_disposed() => Ok(()),
			_ => Err(Error::ObjectDisposed {
				guid: self.guid.to_string(),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn structural_members_stay_local() {
		for name in ["then", "on", "once", "emit", "domain", "_object", "_guid"] {
			assert_eq!(classify_member(name), Member::Structural, "{name}");
		}
		for name in ["click", "goto", "evaluateExpression", "onclick", "then_"] {
			assert_eq!(classify_member(name), Member::Remote, "{name}");
		}
	}
}

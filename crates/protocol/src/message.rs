//! Request, response and event messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event method announcing a new remote object.
pub const CREATE_METHOD: &str = "__create__";

/// Event method announcing that a remote object went away.
pub const DISPOSE_METHOD: &str = "__dispose__";

/// Metadata attached to every outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
	/// Unix timestamp in milliseconds.
	#[serde(rename = "wallTime")]
	pub wall_time: i64,
	/// Whether this is an internal call (not user-facing API).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub internal: Option<bool>,
	/// Optional title for the operation.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

impl Metadata {
	/// Creates minimal metadata stamped with the current time.
	pub fn now() -> Self {
		let wall_time = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_millis() as i64)
			.unwrap_or_default();
		Self {
			wall_time,
			internal: Some(false),
			title: None,
		}
	}
}

/// Outbound call: `{objectType, objectId, method, params}` plus correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Sequential id used to correlate the reply.
	pub id: u32,
	/// Type tag of the target object.
	#[serde(
		rename = "type",
		serialize_with = "serialize_arc_str",
		deserialize_with = "deserialize_arc_str"
	)]
	pub object_type: Arc<str>,
	/// Identifier of the target object.
	#[serde(
		serialize_with = "serialize_arc_str",
		deserialize_with = "deserialize_arc_str"
	)]
	pub guid: Arc<str>,
	/// Remote method name.
	pub method: String,
	/// Method parameters.
	pub params: Value,
	pub metadata: Metadata,
}

/// Serde helper for `Arc<str>` fields.
pub fn serialize_arc_str<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	serializer.serialize_str(arc)
}

/// Serde helper for `Arc<str>` fields.
pub fn deserialize_arc_str<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let s: String = Deserialize::deserialize(deserializer)?;
	Ok(Arc::from(s))
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// Id of the request this reply belongs to.
	pub id: u32,
	/// Success value (mutually exclusive with `error`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure (mutually exclusive with `result`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorWrapper>,
}

impl Response {
	/// Builds a successful reply.
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	/// Builds a failed reply with the given error name and message.
	pub fn err(id: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			id,
			result: None,
			error: Some(ErrorWrapper {
				error: ErrorPayload {
					message: message.into(),
					name: Some(name.into()),
					stack: None,
				},
			}),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorWrapper {
	pub error: ErrorPayload,
}

/// Structured error reported by the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	/// Error type name (e.g. "TimeoutError").
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

/// Event pushed by the remote side for a given object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	/// Target object; empty for the connection root.
	#[serde(
		serialize_with = "serialize_arc_str",
		deserialize_with = "deserialize_arc_str"
	)]
	pub guid: Arc<str>,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Any inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Has an `id` field.
	Response(Response),
	/// Has `guid` and `method`, no `id`.
	Event(Event),
	/// Forward-compatible catch-all.
	Unknown(Value),
}

/// Parameters of a `__create__` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParams {
	#[serde(rename = "type")]
	pub type_name: String,
	pub guid: String,
	#[serde(default)]
	pub initializer: Value,
}

/// Parameters of a `__dispose__` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisposeParams {
	/// `"gc"` when the server collected the object.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl DisposeParams {
	pub fn is_gc(&self) -> bool {
		self.reason.as_deref() == Some("gc")
	}
}

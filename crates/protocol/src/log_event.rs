//! Structured diagnostic events emitted around API calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel name used for API call diagnostics.
pub const API_CHANNEL: &str = "api";

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Verbose,
	Info,
	Warning,
	Error,
}

/// Display hints attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStyle {
	pub color: String,
}

/// `{ channel, level, message, extra, style: { color } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
	pub channel: String,
	pub level: Severity,
	pub message: String,
	#[serde(default)]
	pub extra: Vec<Value>,
	pub style: LogStyle,
}

impl LogEvent {
	/// An `api`/`info` event rendered in cyan.
	pub fn api(message: impl Into<String>) -> Self {
		Self {
			channel: API_CHANNEL.to_string(),
			level: Severity::Info,
			message: message.into(),
			extra: Vec::new(),
			style: LogStyle {
				color: "cyan".to_string(),
			},
		}
	}
}

//! API call instrumentation.
//!
//! [`wrap_api_call`] brackets an operation with `started` / `succeeded` /
//! `failed` events and attaches the API name to any error that escapes.
//! Events go to an optional [`ApiLogger`] and always to `tracing` under the
//! `pw:api` target.

use std::future::Future;
use std::sync::Arc;

use pw_protocol::{API_CHANNEL, LogEvent, Severity};

use crate::error::Result;

/// Structured sink for API diagnostics.
pub trait ApiLogger: Send + Sync {
	fn is_enabled(&self, channel: &str, severity: Severity) -> bool;

	fn log(&self, event: LogEvent);
}

/// [`ApiLogger`] that re-emits events as `tracing` info records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ApiLogger for TracingLogger {
	fn is_enabled(&self, _channel: &str, severity: Severity) -> bool {
		match severity {
			Severity::Verbose => tracing::enabled!(target: "pw:api", tracing::Level::DEBUG),
			Severity::Info => tracing::enabled!(target: "pw:api", tracing::Level::INFO),
			Severity::Warning => tracing::enabled!(target: "pw:api", tracing::Level::WARN),
			Severity::Error => tracing::enabled!(target: "pw:api", tracing::Level::ERROR),
		}
	}

	fn log(&self, event: LogEvent) {
		tracing::info!(
			target: "pw:api",
			channel = %event.channel,
			color = %event.style.color,
			"{}",
			event.message
		);
	}
}

fn log_api_call(logger: Option<&Arc<dyn ApiLogger>>, message: String) {
	tracing::debug!(target: "pw:api", "{message}");
	if let Some(logger) = logger {
		if logger.is_enabled(API_CHANNEL, Severity::Info) {
			logger.log(LogEvent::api(message));
		}
	}
}

/// Runs `operation` as the API call `api_name`.
///
/// The successful value is returned untouched. A failure is returned as
/// [`Error::Api`](crate::Error::Api) wrapping the original error, so its
/// message reads `"<api_name>: <original>"`.
pub async fn wrap_api_call<T, F>(
	api_name: &str,
	operation: F,
	logger: Option<&Arc<dyn ApiLogger>>,
) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	log_api_call(logger, format!("=> {api_name} started"));
	match operation.await {
		Ok(value) => {
			log_api_call(logger, format!("<= {api_name} succeeded"));
			Ok(value)
		}
		Err(e) => {
			log_api_call(logger, format!("<= {api_name} failed"));
			Err(e.in_api(api_name))
		}
	}
}

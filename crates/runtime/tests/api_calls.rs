use std::sync::Arc;

use parking_lot::Mutex;
use pw_protocol::{LogEvent, Severity};
use pw_runtime::{
	ApiLogger, ChannelTransport, Connection, ConnectionOptions, Error, ObjectOptions, RemoteObject,
	ServerEnd, wrap_api_call,
};
use serde_json::Value;

#[derive(Default)]
struct RecordingLogger {
	muted: bool,
	events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogger {
	fn messages(&self) -> Vec<String> {
		self.events.lock().iter().map(|e| e.message.clone()).collect()
	}
}

impl ApiLogger for RecordingLogger {
	fn is_enabled(&self, channel: &str, severity: Severity) -> bool {
		!self.muted && channel == "api" && severity == Severity::Info
	}

	fn log(&self, event: LogEvent) {
		self.events.lock().push(event);
	}
}

fn object_with(logger: &Arc<RecordingLogger>) -> (Arc<RemoteObject>, ServerEnd) {
	let (parts, server) = ChannelTransport::pair();
	let conn = Arc::new(Connection::new(parts, ConnectionOptions::default()));
	let object = conn
		.create_root(
			"Page",
			"page@1",
			Value::Null,
			ObjectOptions {
				logger: Some(Arc::clone(logger) as Arc<dyn ApiLogger>),
			},
		)
		.unwrap();
	(object, server)
}

#[tokio::test]
async fn success_logs_started_then_succeeded() {
	let logger = Arc::new(RecordingLogger::default());
	let (page, _server) = object_with(&logger);

	let value = page
		.wrap_api_call("title", async { Ok(String::from("Example Domain")) }, None)
		.await
		.unwrap();

	assert_eq!(value, "Example Domain");
	assert_eq!(
		logger.messages(),
		vec!["=> title started", "<= title succeeded"]
	);
	let events = logger.events.lock();
	let event = &events[0];
	assert_eq!(event.channel, "api");
	assert_eq!(event.level, Severity::Info);
	assert!(event.extra.is_empty());
	assert_eq!(event.style.color, "cyan");
}

#[tokio::test]
async fn failure_is_prefixed_and_keeps_kind() {
	let logger = Arc::new(RecordingLogger::default());
	let (page, _server) = object_with(&logger);

	let err = page
		.wrap_api_call::<(), _>(
			"waitForSelector",
			async { Err(Error::Timeout("30000ms exceeded".to_string())) },
			None,
		)
		.await
		.unwrap_err();

	assert!(err.to_string().starts_with("waitForSelector: "));
	assert_eq!(err.to_string(), "waitForSelector: Timeout: 30000ms exceeded");
	assert!(err.is_timeout());
	assert!(matches!(err.root_cause(), Error::Timeout(_)));
	assert_eq!(
		logger.messages(),
		vec!["=> waitForSelector started", "<= waitForSelector failed"]
	);
}

#[tokio::test]
async fn override_logger_takes_precedence() {
	let inherited = Arc::new(RecordingLogger::default());
	let (page, _server) = object_with(&inherited);
	let custom = Arc::new(RecordingLogger::default());

	page.wrap_api_call(
		"reload",
		async { Ok(()) },
		Some(Arc::clone(&custom) as Arc<dyn ApiLogger>),
	)
	.await
	.unwrap();

	assert!(inherited.messages().is_empty());
	assert_eq!(custom.messages().len(), 2);
}

#[tokio::test]
async fn disabled_logger_receives_nothing() {
	let logger = Arc::new(RecordingLogger {
		muted: true,
		..Default::default()
	});
	let (page, _server) = object_with(&logger);

	page.wrap_api_call("close", async { Ok(()) }, None)
		.await
		.unwrap();

	assert!(logger.messages().is_empty());
}

#[tokio::test]
async fn free_function_without_logger() {
	let result = wrap_api_call("evaluate", async { Ok(42) }, None).await.unwrap();
	assert_eq!(result, 42);

	let err = wrap_api_call::<(), _>(
		"evaluate",
		async {
			Err(Error::Remote {
				name: "Error".to_string(),
				message: "ReferenceError: x is not defined".to_string(),
				stack: None,
			})
		},
		None,
	)
	.await
	.unwrap_err();
	assert_eq!(err.to_string(), "evaluate: ReferenceError: x is not defined");
}

use std::sync::Arc;

use pw_protocol::Response;
use pw_runtime::{
	ChannelTransport, Connection, ConnectionLike, ConnectionOptions, DisposeReason, Error, MethodDescriptor,
	ObjectOptions, ParentOrConnection, ProtocolSchema, RemoteObject, ServerEnd, UnknownMethodPolicy,
	ValueShape,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

struct Harness {
	conn: Arc<Connection>,
	server: ServerEnd,
	runner: JoinHandle<pw_runtime::Result<()>>,
}

fn start(schema: ProtocolSchema) -> Harness {
	let (parts, server) = ChannelTransport::pair();
	let conn = Arc::new(Connection::new(
		parts,
		ConnectionOptions {
			schema,
			..Default::default()
		},
	));
	let runner = {
		let conn = Arc::clone(&conn);
		tokio::spawn(async move { conn.run().await })
	};
	Harness {
		conn,
		server,
		runner,
	}
}

fn element(conn: &Arc<Connection>) -> Arc<RemoteObject> {
	let frame = conn
		.create_root("Frame", "frame@1", Value::Null, ObjectOptions::default())
		.unwrap();
	RemoteObject::new(
		ParentOrConnection::Parent(frame),
		"ElementHandle",
		"c1",
		Value::Null,
		ObjectOptions::default(),
	)
	.unwrap()
}

#[tokio::test]
async fn click_is_forwarded_and_failure_is_prefixed() {
	let mut h = start(ProtocolSchema::new());
	let handle = element(&h.conn);

	let call = {
		let handle = Arc::clone(&handle);
		tokio::spawn(async move {
			handle
				.wrap_api_call(
					"click",
					handle.channel().invoke("click", json!({"button": "left"})),
					None,
				)
				.await
		})
	};

	let request = h.server.next_request().await.unwrap();
	assert_eq!(request.object_type.as_ref(), "ElementHandle");
	assert_eq!(request.guid.as_ref(), "c1");
	assert_eq!(request.method, "click");
	assert_eq!(request.params, json!({"button": "left"}));

	h.server
		.send_response(Response::err(request.id, "Error", "Element not found"))
		.unwrap();

	let err = call.await.unwrap().unwrap_err();
	assert_eq!(err.to_string(), "click: Element not found");
	assert!(err.is_remote());
	assert_eq!(err.api_name(), Some("click"));
	assert_eq!(err.error_name(), Some("Error"));

	drop(h.server);
	h.runner.await.unwrap().unwrap();
	assert!(handle.is_disposed());
}

#[tokio::test]
async fn typed_send_round_trip() {
	#[derive(Deserialize)]
	struct BoundingBox {
		width: f64,
	}

	let mut h = start(ProtocolSchema::new());
	let handle = element(&h.conn);

	let call = {
		let handle = Arc::clone(&handle);
		tokio::spawn(async move { handle.channel().send_no_params::<BoundingBox>("boundingBox").await })
	};

	let request = h.server.next_request().await.unwrap();
	assert_eq!(request.params, Value::Null);
	h.server
		.send_response(Response::ok(request.id, json!({"width": 12.5})))
		.unwrap();

	assert_eq!(call.await.unwrap().unwrap().width, 12.5);
}

#[tokio::test]
async fn structural_members_are_not_forwarded() {
	let h = start(ProtocolSchema::new());
	let handle = element(&h.conn);

	for name in ["then", "on", "_guid"] {
		let err = handle.channel().invoke(name, Value::Null).await.unwrap_err();
		assert!(matches!(err, Error::ReservedMember(ref n) if n == name));
	}
}

#[tokio::test]
async fn dispatch_after_dispose_fails() {
	let h = start(ProtocolSchema::new());
	let handle = element(&h.conn);
	let channel = handle.channel().clone();

	handle.dispose(DisposeReason::Closed);

	let err = channel.invoke("click", json!({})).await.unwrap_err();
	assert!(matches!(err, Error::ObjectDisposed { ref guid } if guid == "c1"));
	assert!(err.is_disposed());
}

#[tokio::test]
async fn known_methods_are_validated() {
	let schema = ProtocolSchema::new()
		.method(
			"ElementHandle",
			"fill",
			MethodDescriptor::new(ValueShape::Object, ValueShape::Empty),
		)
		.method(
			"ElementHandle",
			"textContent",
			MethodDescriptor::new(ValueShape::Empty, ValueShape::Object),
		);
	let mut h = start(schema);
	let handle = element(&h.conn);

	let err = handle
		.channel()
		.invoke("fill", json!("not an object"))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)));

	let call = {
		let handle = Arc::clone(&handle);
		tokio::spawn(async move { handle.channel().invoke("textContent", Value::Null).await })
	};
	let request = h.server.next_request().await.unwrap();
	assert_eq!(request.method, "textContent");
	h.server
		.send_response(Response::ok(request.id, json!("bare string")))
		.unwrap();

	let err = call.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("result")));
}

#[tokio::test]
async fn unknown_methods_follow_policy() {
	let h = start(ProtocolSchema::new().unknown_methods(UnknownMethodPolicy::Reject));
	let handle = element(&h.conn);

	let err = handle
		.channel()
		.invoke("noSuchMethod", json!({}))
		.await
		.unwrap_err();
	assert_eq!(err.to_string(), "Unknown method ElementHandle.noSuchMethod");
}

#[tokio::test]
async fn late_reply_after_dispose_is_dropped() {
	let mut h = start(ProtocolSchema::new());
	let handle = element(&h.conn);

	let call = {
		let handle = Arc::clone(&handle);
		tokio::spawn(async move { handle.channel().invoke("hover", json!({})).await })
	};
	let request = h.server.next_request().await.unwrap();

	handle.dispose(DisposeReason::Closed);
	call.abort();
	let _ = call.await;

	h.server
		.send_response(Response::ok(request.id, json!({})))
		.unwrap();
	h.server
		.send_response(Response::ok(request.id, json!({})))
		.unwrap();

	// The connection keeps serving after discarding the replies.
	let frame = h.conn.get_object("frame@1").unwrap();
	let call = {
		let frame = Arc::clone(&frame);
		tokio::spawn(async move { frame.channel().invoke("title", Value::Null).await })
	};
	let request = h.server.next_request().await.unwrap();
	assert_eq!(request.guid.as_ref(), "frame@1");
	h.server
		.send_response(Response::ok(request.id, json!("Home")))
		.unwrap();
	assert_eq!(call.await.unwrap().unwrap(), json!("Home"));
}

#[tokio::test]
async fn waiting_caller_still_gets_reply_after_dispose() {
	let mut h = start(ProtocolSchema::new());
	let handle = element(&h.conn);

	let call = {
		let handle = Arc::clone(&handle);
		tokio::spawn(async move { handle.channel().invoke("hover", json!({})).await })
	};
	let request = h.server.next_request().await.unwrap();

	handle.dispose(DisposeReason::Closed);
	assert!(handle.is_disposed());
	assert!(!h.conn.objects().contains("c1"));

	h.server
		.send_response(Response::ok(request.id, json!({"ok": 1})))
		.unwrap();
	assert_eq!(call.await.unwrap().unwrap(), json!({"ok": 1}));
}

#[tokio::test]
async fn driver_events_reach_subscribers() {
	let h = start(ProtocolSchema::new());
	let handle = element(&h.conn);
	let mut events = handle.channel().subscribe();

	h.server
		.send_event(pw_protocol::Event {
			guid: "c1".into(),
			method: "visibilityChanged".to_string(),
			params: json!({"visible": true}),
		})
		.unwrap();

	let event = events.recv().await.unwrap();
	assert_eq!(event.method, "visibilityChanged");
	assert_eq!(event.params["visible"], true);
}

#[tokio::test]
async fn driver_lifecycle_events_manage_tree() {
	let h = start(ProtocolSchema::new());

	h.server.create("", "Playwright", "pw", json!({})).unwrap();
	h.server
		.create("pw", "Browser", "browser@1", json!({"version": "1.0"}))
		.unwrap();

	let browser = h
		.conn
		.wait_for_object("browser@1", std::time::Duration::from_secs(5))
		.await
		.unwrap();
	assert_eq!(browser.initializer()["version"], "1.0");

	h.server.dispose("pw", false).unwrap();
	let mut events = browser.channel().subscribe();
	h.server
		.send_event(pw_protocol::Event {
			guid: "browser@1".into(),
			method: "ping".to_string(),
			params: Value::Null,
		})
		.unwrap();
	h.server.create("", "Marker", "marker", json!({})).unwrap();
	h.conn
		.wait_for_object("marker", std::time::Duration::from_secs(5))
		.await
		.unwrap();

	assert!(browser.is_disposed());
	assert_eq!(h.conn.objects().guids(), vec!["marker".to_string()]);
	assert!(events.try_recv().is_err());
}

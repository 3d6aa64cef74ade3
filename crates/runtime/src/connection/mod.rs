//! Connection layer: object registry, request correlation and event routing.
//!
//! # Message Flow
//!
//! 1. A [`Channel`](crate::Channel) calls `send_message_to_server()` with type, GUID, method and params
//! 2. Connection generates a unique ID and stores a oneshot sender for it
//! 3. The request is queued for the writer task, which hands it to the transport
//! 4. The caller awaits the oneshot receiver
//! 5. The read loop receives the reply and resolves the matching sender
//!
//! Replies whose sender is gone (caller dropped, object disposed) are
//! discarded. `__create__` and `__dispose__` events build and tear down the
//! object tree; every other event is delivered to the target's channel.

pub mod object_store;


use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use pw_protocol::{
	CREATE_METHOD, CreateParams, DISPOSE_METHOD, DisposeParams, ErrorPayload, Event, Message,
	Metadata, Request,
};
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

use self::object_store::ObjectStore;
use crate::error::{Error, Result};
use crate::instrument::ApiLogger;
use crate::remote_object::{DisposeReason, ObjectOptions, ParentOrConnection, RemoteObject};
use crate::schema::ProtocolSchema;
use crate::transport::{Transport, TransportParts};

/// What a [`RemoteObject`] and its [`Channel`](crate::Channel) need from a connection.
pub trait ConnectionLike: Send + Sync {
	/// The registry all objects of this connection live in.
	fn objects(&self) -> &ObjectStore;

	/// Method descriptors consulted by channels.
	fn schema(&self) -> &ProtocolSchema;

	/// Logger given to root objects that do not bring their own.
	fn default_logger(&self) -> Option<Arc<dyn ApiLogger>>;

	/// Sends `method` to the object `guid` of type `object_type` and awaits the reply.
	fn send_message_to_server(
		&self,
		object_type: &str,
		guid: &str,
		method: &str,
		params: Value,
	) -> BoxFuture<'_, Result<Value>>;
}

/// Connection configuration.
#[derive(Clone, Default)]
pub struct ConnectionOptions {
	/// Default [`ApiLogger`] for root objects.
	pub logger: Option<Arc<dyn ApiLogger>>,
	pub schema: ProtocolSchema,
}

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<TokioMutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					tracing::debug!(id, "CancelGuard: removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`Connection::send_message_to_server`] with cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Client side of a driver connection.
///
/// Owns the object registry and correlates requests with replies using
/// sequential IDs and oneshot channels.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	/// Channel for sending outbound messages to the writer task
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Taken by run()
	outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
	message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	objects: ObjectStore,
	options: ConnectionOptions,
	closed: AtomicBool,
}

impl Connection {
	/// Creates a connection over the given transport. Nothing flows until [`run`](Self::run).
	pub fn new(parts: TransportParts, options: ConnectionOptions) -> Self {
		let TransportParts { sender, message_rx } = parts;
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(TokioMutex::new(HashMap::new())),
			outbound_tx,
			outbound_rx: TokioMutex::new(Some(outbound_rx)),
			transport_sender: TokioMutex::new(Some(sender)),
			message_rx: TokioMutex::new(Some(message_rx)),
			objects: ObjectStore::new(),
			options,
			closed: AtomicBool::new(false),
		}
	}

	/// Creates a root object owned directly by this connection.
	pub fn create_root(
		self: &Arc<Self>,
		type_name: &str,
		guid: &str,
		initializer: Value,
		options: ObjectOptions,
	) -> Result<Arc<RemoteObject>> {
		RemoteObject::new(
			ParentOrConnection::Connection(Arc::clone(self) as Arc<dyn ConnectionLike>),
			type_name,
			guid,
			initializer,
			options,
		)
	}

	/// Looks up a live object.
	pub fn get_object(&self, guid: &str) -> Result<Arc<RemoteObject>> {
		self.objects.get(guid)
	}

	/// Waits until `guid` is registered (its `__create__` may still be in flight).
	pub async fn wait_for_object(&self, guid: &str, timeout: Duration) -> Result<Arc<RemoteObject>> {
		self.objects.wait_for(guid, timeout).await
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Sends a message to the driver and awaits the reply.
	pub async fn send_message_to_server(
		&self,
		object_type: &str,
		guid: &str,
		method: &str,
		params: Value,
	) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(id, guid, method, "sending message");

		let (tx, rx) = oneshot::channel();
		{
			// close() sets the flag before clearing callbacks under this lock.
			let mut callbacks = self.callbacks.lock().await;
			if self.is_closed() {
				return Err(Error::ChannelClosed);
			}
			callbacks.insert(id, tx);
		}

		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			object_type: Arc::from(object_type),
			guid: Arc::from(guid),
			method: method.to_string(),
			params,
			metadata: Metadata::now(),
		};

		let request_value = serde_json::to_value(&request)?;
		if self.outbound_tx.send(request_value).is_err() {
			tracing::error!("Failed to queue message: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Runs the writer task and the read/dispatch loop until the transport closes.
	///
	/// Closes the connection on exit.
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let already_running = || Error::ProtocolError("run() can only be called once".to_string());
		let mut transport_sender = self.transport_sender.lock().await.take().ok_or_else(already_running)?;
		let mut outbound_rx = self.outbound_rx.lock().await.take().ok_or_else(already_running)?;
		let mut message_rx = self.message_rx.lock().await.take().ok_or_else(already_running)?;

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = transport_sender.send(message).await {
					tracing::error!("Transport write error: {}", e);
					break;
				}
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(message_value) {
				Ok(message) => {
					if let Err(e) = self.dispatch(message).await {
						tracing::error!("Error dispatching message: {}", e);
					}
				}
				Err(e) => {
					tracing::error!("Failed to parse message: {}", e);
				}
			}
		}

		tracing::debug!("transport closed, tearing down connection");
		self.close().await;
		writer_handle.abort();
		Ok(())
	}

	/// Disposes every object and fails all pending calls with [`Error::ChannelClosed`].
	pub async fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		for object in self.objects.snapshot() {
			object.dispose(DisposeReason::Closed);
		}
		// Dropping the senders resolves every waiting ResponseFuture.
		self.callbacks.lock().await.clear();
	}

	/// Routes one inbound message.
	pub async fn dispatch(self: &Arc<Self>, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let Some(callback) = self.callbacks.lock().await.remove(&response.id) else {
					tracing::debug!(id = response.id, "discarding reply with no pending request");
					return Ok(());
				};

				let result = match response.error {
					Some(wrapper) => Err(parse_protocol_error(wrapper.error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = callback.send(result);
				Ok(())
			}
			Message::Event(event) => match event.method.as_str() {
				CREATE_METHOD => self.handle_create(&event),
				DISPOSE_METHOD => {
					self.handle_dispose(&event);
					Ok(())
				}
				_ => {
					match self.objects.try_get(&event.guid) {
						Some(object) => object.channel().emit(&event.method, event.params),
						None => tracing::debug!(
							guid = %event.guid,
							method = %event.method,
							"event for unknown object (ignored)"
						),
					}
					Ok(())
				}
			},
			Message::Unknown(value) => {
				tracing::debug!("Unknown message type (forward-compatible, ignored): {}", value);
				Ok(())
			}
		}
	}

	fn handle_create(self: &Arc<Self>, event: &Event) -> Result<()> {
		let params: CreateParams = serde_json::from_value(event.params.clone())
			.map_err(|e| Error::ProtocolError(format!("malformed __create__: {e}")))?;

		let parent = if event.guid.is_empty() {
			ParentOrConnection::Connection(Arc::clone(self) as Arc<dyn ConnectionLike>)
		} else {
			let parent = self.objects.try_get(&event.guid).ok_or_else(|| {
				Error::ProtocolError(format!("Parent object not found: {}", event.guid))
			})?;
			ParentOrConnection::Parent(parent)
		};

		RemoteObject::new(
			parent,
			params.type_name,
			params.guid,
			params.initializer,
			ObjectOptions::default(),
		)?;
		Ok(())
	}

	fn handle_dispose(&self, event: &Event) {
		let params: DisposeParams = serde_json::from_value(event.params.clone()).unwrap_or_default();
		let reason = if params.is_gc() {
			DisposeReason::GarbageCollected
		} else {
			DisposeReason::Closed
		};

		match self.objects.try_get(&event.guid) {
			Some(object) => object.dispose(reason),
			None => tracing::debug!(guid = %event.guid, "dispose for unknown object (ignored)"),
		}
	}
}

/// Converts an [`ErrorPayload`] from the driver into [`Error::Remote`].
fn parse_protocol_error(error: ErrorPayload) -> Error {
	Error::Remote {
		name: error.name.unwrap_or_else(|| "Error".to_string()),
		message: error.message,
		stack: error.stack,
	}
}

impl ConnectionLike for Connection {
	fn objects(&self) -> &ObjectStore {
		&self.objects
	}

	fn schema(&self) -> &ProtocolSchema {
		&self.options.schema
	}

	fn default_logger(&self) -> Option<Arc<dyn ApiLogger>> {
		self.options.logger.clone()
	}

	fn send_message_to_server(
		&self,
		object_type: &str,
		guid: &str,
		method: &str,
		params: Value,
	) -> BoxFuture<'_, Result<Value>> {
		let object_type = object_type.to_string();
		let guid = guid.to_string();
		let method = method.to_string();
		Box::pin(async move {
			Connection::send_message_to_server(self, &object_type, &guid, &method, params).await
		})
	}
}

//! RemoteObject - local handle for one driver-side object.
//!
//! Objects live in the connection's [`ObjectStore`](crate::ObjectStore) arena.
//! Parent and children are held as identifiers and resolved through the store,
//! so the tree never owns itself. Objects refer to their connection weakly:
//! dropping the last [`Connection`](crate::Connection) handle frees the whole
//! graph even if [`Connection::close`](crate::Connection::close) never ran.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::Serialize;
use serde::ser::SerializeStruct;
use serde_json::Value;

use crate::channel::Channel;
use crate::connection::ConnectionLike;
use crate::error::{Error, Result};
use crate::instrument::{self, ApiLogger};

/// Reason why an object was disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeReason {
	/// Object was closed by user code or by the driver.
	Closed,
	/// Object was garbage collected by the driver.
	GarbageCollected,
}

/// Parent can be either another object or the connection itself.
pub enum ParentOrConnection {
	Parent(Arc<RemoteObject>),
	Connection(Arc<dyn ConnectionLike>),
}

/// Construction options for a [`RemoteObject`].
#[derive(Clone, Default)]
pub struct ObjectOptions {
	/// Logger for this object's API calls. `None` inherits the parent's
	/// (or the connection default for root objects).
	pub logger: Option<Arc<dyn ApiLogger>>,
}

/// Debug snapshot of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeState {
	pub guid: String,
	pub objects: Vec<ScopeState>,
}

/// Local proxy for a driver-side object.
pub struct RemoteObject {
	guid: Arc<str>,
	type_name: Arc<str>,
	parent: Option<Arc<str>>,
	connection: Weak<dyn ConnectionLike>,
	children: Mutex<IndexSet<Arc<str>>>,
	initializer: Value,
	logger: Option<Arc<dyn ApiLogger>>,
	channel: Channel,
	disposed: AtomicBool,
	was_collected: AtomicBool,
}

impl RemoteObject {
	/// Creates an object and registers it with the connection and its parent.
	///
	/// # Errors
	///
	/// - [`Error::DuplicateIdentifier`] if `guid` is already registered; nothing is changed.
	/// - [`Error::ObjectDisposed`] if the parent has been disposed.
	/// - [`Error::ChannelClosed`] if the parent's connection has been dropped.
	pub fn new(
		parent: ParentOrConnection,
		type_name: impl Into<Arc<str>>,
		guid: impl Into<Arc<str>>,
		initializer: Value,
		options: ObjectOptions,
	) -> Result<Arc<Self>> {
		let type_name = type_name.into();
		let guid = guid.into();

		let (connection, parent) = match parent {
			ParentOrConnection::Parent(p) => (p.connection().ok_or(Error::ChannelClosed)?, Some(p)),
			ParentOrConnection::Connection(c) => (c, None),
		};

		if let Some(p) = &parent {
			if p.is_disposed() {
				return Err(Error::ObjectDisposed {
					guid: p.guid.to_string(),
				});
			}
		}

		let logger = options.logger.or_else(|| match &parent {
			Some(p) => p.logger.clone(),
			None => connection.default_logger(),
		});

		let object = Arc::new_cyclic(|weak| Self {
			channel: Channel::new(
				weak.clone(),
				Arc::downgrade(&connection),
				Arc::clone(&type_name),
				Arc::clone(&guid),
			),
			guid: Arc::clone(&guid),
			type_name,
			parent: parent.as_ref().map(|p| Arc::clone(&p.guid)),
			connection: Arc::downgrade(&connection),
			children: Mutex::new(IndexSet::new()),
			initializer,
			logger,
			disposed: AtomicBool::new(false),
			was_collected: AtomicBool::new(false),
		});

		connection.objects().insert(Arc::clone(&object))?;

		if let Some(p) = &parent {
			if !p.add_child(Arc::clone(&guid)) {
				connection.objects().remove_object(&object);
				return Err(Error::ObjectDisposed {
					guid: p.guid.to_string(),
				});
			}
		}

		tracing::debug!(type_name = %object.type_name, guid = %object.guid, "created object");
		Ok(object)
	}

	/// Returns the unique GUID for this object.
	pub fn guid(&self) -> &str {
		&self.guid
	}

	/// Returns the protocol type name (e.g., "Browser", "Page").
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	pub fn parent_guid(&self) -> Option<&str> {
		self.parent.as_deref()
	}

	/// Returns the parent object while it is still registered.
	pub fn parent(&self) -> Option<Arc<RemoteObject>> {
		let guid = self.parent.as_ref()?;
		self.connection()?.objects().try_get(guid)
	}

	/// Returns the live children, in creation order.
	pub fn children(&self) -> Vec<Arc<RemoteObject>> {
		let Some(connection) = self.connection() else {
			return Vec::new();
		};
		let objects = connection.objects();
		self.child_guids()
			.iter()
			.filter_map(|g| objects.try_get(g))
			.collect()
	}

	pub fn child_guids(&self) -> Vec<Arc<str>> {
		self.children.lock().iter().cloned().collect()
	}

	/// Returns the owning connection, unless it has been dropped.
	pub fn connection(&self) -> Option<Arc<dyn ConnectionLike>> {
		self.connection.upgrade()
	}

	/// Returns the initializer sent by the driver at creation.
	pub fn initializer(&self) -> &Value {
		&self.initializer
	}

	/// Returns the channel for RPC.
	pub fn channel(&self) -> &Channel {
		&self.channel
	}

	pub fn logger(&self) -> Option<&Arc<dyn ApiLogger>> {
		self.logger.as_ref()
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}

	/// Returns true if the driver garbage collected this object.
	pub fn was_collected(&self) -> bool {
		self.was_collected.load(Ordering::SeqCst)
	}

	/// Disposes this object and every descendant.
	///
	/// Removes the object from its parent and from the connection, then
	/// disposes a snapshot of its children depth-first. Calling it again is a
	/// no-op.
	pub fn dispose(&self, reason: DisposeReason) {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return;
		}
		if reason == DisposeReason::GarbageCollected {
			self.was_collected.store(true, Ordering::SeqCst);
		}

		if let Some(parent) = self.parent() {
			parent.remove_child(&self.guid);
		}

		if let Some(connection) = self.connection() {
			let objects = connection.objects();
			objects.remove_object(self);

			let children = self.child_guids();
			for guid in children {
				if let Some(child) = objects.try_get(&guid) {
					child.dispose(reason);
				}
			}
		}

		self.children.lock().clear();
		tracing::debug!(guid = %self.guid, ?reason, "disposed object");
	}

	/// Snapshot of this subtree for diagnostics. Read-only.
	pub fn debug_scope_state(&self) -> ScopeState {
		ScopeState {
			guid: self.guid.to_string(),
			objects: self
				.children()
				.iter()
				.map(|child| child.debug_scope_state())
				.collect(),
		}
	}

	/// Runs `operation` as the instrumented API call `api_name`.
	///
	/// `logger` overrides this object's logger for the call.
	pub async fn wrap_api_call<T, F>(
		&self,
		api_name: &str,
		operation: F,
		logger: Option<Arc<dyn ApiLogger>>,
	) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let logger = logger.or_else(|| self.logger.clone());
		instrument::wrap_api_call(api_name, operation, logger.as_ref()).await
	}

	/// Adds a child unless this object is already disposed.
	fn add_child(&self, guid: Arc<str>) -> bool {
		let mut children = self.children.lock();
		if self.is_disposed() {
			return false;
		}
		children.insert(guid);
		true
	}

	fn remove_child(&self, guid: &str) {
		self.children.lock().shift_remove(guid);
	}
}

impl fmt::Debug for RemoteObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RemoteObject")
			.field("type", &self.type_name)
			.field("guid", &self.guid)
			.finish()
	}
}

/// Only `{type, guid}`; the object graph is never walked.
impl Serialize for RemoteObject {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("RemoteObject", 2)?;
		state.serialize_field("type", self.type_name.as_ref())?;
		state.serialize_field("guid", self.guid.as_ref())?;
		state.end()
	}
}

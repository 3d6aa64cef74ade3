//! Thread-safe object registry with per-GUID notification.
//!
//! Uses [`DashMap`] for concurrent access. Per-GUID [`Notify`] ensures only
//! relevant waiters wake up, and [`ObjectStore::wait_for`] registers waiters
//! before checking to prevent lost wakeups.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::remote_object::RemoteObject;

/// Registry of live objects by GUID.
pub struct ObjectStore {
	objects: DashMap<Arc<str>, Arc<RemoteObject>>,
	waiters: DashMap<Arc<str>, Arc<Notify>>,
}

impl Default for ObjectStore {
	fn default() -> Self {
		Self::new()
	}
}

impl ObjectStore {
	pub fn new() -> Self {
		Self {
			objects: DashMap::new(),
			waiters: DashMap::new(),
		}
	}

	/// Registers an object under its GUID and wakes waiters for it.
	///
	/// Fails with [`Error::DuplicateIdentifier`] if the GUID is taken.
	pub fn insert(&self, object: Arc<RemoteObject>) -> Result<()> {
		let guid: Arc<str> = Arc::from(object.guid());
		match self.objects.entry(Arc::clone(&guid)) {
			Entry::Occupied(_) => {
				return Err(Error::DuplicateIdentifier {
					guid: guid.to_string(),
				});
			}
			Entry::Vacant(slot) => {
				slot.insert(object);
			}
		}
		if let Some((_, notify)) = self.waiters.remove(&guid) {
			notify.notify_waiters();
		}
		Ok(())
	}

	/// Removes whatever is registered under `guid`. Absent entries are fine.
	pub fn remove(&self, guid: &str) -> Option<Arc<RemoteObject>> {
		self.objects.remove(guid).map(|(_, object)| object)
	}

	/// Removes `object`'s entry only if it is still the registered instance.
	pub fn remove_object(&self, object: &RemoteObject) -> bool {
		self.objects
			.remove_if(object.guid(), |_, registered| {
				std::ptr::eq(Arc::as_ptr(registered), object)
			})
			.is_some()
	}

	/// Synchronous lookup.
	pub fn try_get(&self, guid: &str) -> Option<Arc<RemoteObject>> {
		self.objects.get(guid).map(|r| Arc::clone(r.value()))
	}

	/// Lookup that reports a missing GUID as [`Error::ObjectNotFound`].
	pub fn get(&self, guid: &str) -> Result<Arc<RemoteObject>> {
		self.try_get(guid).ok_or_else(|| Error::ObjectNotFound {
			guid: guid.to_string(),
		})
	}

	pub fn contains(&self, guid: &str) -> bool {
		self.objects.contains_key(guid)
	}

	pub fn len(&self) -> usize {
		self.objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}

	/// Registered GUIDs, sorted.
	pub fn guids(&self) -> Vec<String> {
		let mut guids: Vec<String> = self.objects.iter().map(|r| r.key().to_string()).collect();
		guids.sort();
		guids
	}

	/// Every registered object at this moment.
	pub fn snapshot(&self) -> Vec<Arc<RemoteObject>> {
		self.objects.iter().map(|r| Arc::clone(r.value())).collect()
	}

	/// Waits for an object to be registered, with timeout.
	///
	/// Registers waiter before checking to prevent lost wakeups.
	pub async fn wait_for(&self, guid: &str, timeout: Duration) -> Result<Arc<RemoteObject>> {
		let g: Arc<str> = Arc::from(guid);
		let deadline = tokio::time::Instant::now() + timeout;

		loop {
			let notify = self
				.waiters
				.entry(Arc::clone(&g))
				.or_insert_with(|| Arc::new(Notify::new()))
				.clone();
			let notified = notify.notified();

			if let Some(object) = self.try_get(&g) {
				drop(notified);
				self.release_waiter(&g, notify);
				return Ok(object);
			}

			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				drop(notified);
			} else {
				tokio::select! {
					biased;
					_ = notified => continue,
					_ = tokio::time::sleep(remaining) => {}
				}
			}
			self.release_waiter(&g, notify);
			return Err(Self::timeout_error(&g));
		}
	}

	/// Drops the waiter entry for `guid` once no other caller is waiting on it.
	fn release_waiter(&self, guid: &str, notify: Arc<Notify>) {
		drop(notify);
		self.waiters.remove_if(guid, |_, n| Arc::strong_count(n) == 1);
	}

	#[cfg(test)]
	pub(crate) fn waiter_count(&self) -> usize {
		self.waiters.len()
	}

	fn timeout_error(guid: &str) -> Error {
		Error::Timeout(format!("Timeout waiting for object: {guid}"))
	}
}

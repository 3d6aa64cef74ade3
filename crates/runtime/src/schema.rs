//! Method descriptors consulted by [`Channel::invoke`](crate::Channel::invoke).
//!
//! The set of remote methods is open-ended: a [`ProtocolSchema`] describes the
//! methods it knows about, and [`UnknownMethodPolicy`] decides what happens to
//! the rest.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Error, Result};

/// Coarse JSON shape expected for parameters or results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueShape {
	/// Anything goes.
	#[default]
	Any,
	/// `null` or an empty object.
	Empty,
	Object,
	Array,
	String,
	Number,
	Boolean,
}

impl ValueShape {
	pub fn matches(self, value: &Value) -> bool {
		match self {
			Self::Any => true,
			Self::Empty => match value {
				Value::Null => true,
				Value::Object(map) => map.is_empty(),
				_ => false,
			},
			Self::Object => value.is_object(),
			Self::Array => value.is_array(),
			Self::String => value.is_string(),
			Self::Number => value.is_number(),
			Self::Boolean => value.is_boolean(),
		}
	}

	pub(crate) fn check(self, what: &str, method: &str, value: &Value) -> Result<()> {
		if self.matches(value) {
			return Ok(());
		}
		Err(Error::InvalidArgument(format!(
			"{method}: expected {what} of shape {self:?}, got {}",
			json_kind(value)
		)))
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// Parameter and result shape of one remote method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodDescriptor {
	pub params: ValueShape,
	pub result: ValueShape,
}

impl MethodDescriptor {
	pub const fn new(params: ValueShape, result: ValueShape) -> Self {
		Self { params, result }
	}
}

/// What [`Channel::invoke`](crate::Channel::invoke) does with a method the schema does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMethodPolicy {
	/// Send it anyway and let the driver decide.
	#[default]
	Forward,
	/// Fail locally with [`Error::UnknownMethod`].
	Reject,
}

/// Known methods per object type.
#[derive(Debug, Clone, Default)]
pub struct ProtocolSchema {
	types: HashMap<String, HashMap<String, MethodDescriptor>>,
	unknown_methods: UnknownMethodPolicy,
}

impl ProtocolSchema {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds (or replaces) a method descriptor for `type_name`.
	pub fn method(
		mut self,
		type_name: impl Into<String>,
		method: impl Into<String>,
		descriptor: MethodDescriptor,
	) -> Self {
		self.types
			.entry(type_name.into())
			.or_default()
			.insert(method.into(), descriptor);
		self
	}

	pub fn unknown_methods(mut self, policy: UnknownMethodPolicy) -> Self {
		self.unknown_methods = policy;
		self
	}

	pub fn lookup(&self, type_name: &str, method: &str) -> Option<&MethodDescriptor> {
		self.types.get(type_name)?.get(method)
	}

	pub fn unknown_method_policy(&self) -> UnknownMethodPolicy {
		self.unknown_methods
	}
}

//! Error types for console queries.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// A selector part names an engine the host does not provide.
	#[error("Unknown engine \"{0}\"")]
	UnknownEngine(String),

	/// The selector string could not be parsed.
	#[error("Invalid selector '{selector}': {reason}")]
	InvalidSelector { selector: String, reason: String },
}

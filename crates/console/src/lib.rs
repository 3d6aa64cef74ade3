//! Debug console helpers for selector queries.
//!
//! [`ConsoleApi`] exposes `$`, `$$` and `inspect` style lookups on top of a
//! [`SelectorHost`], which owns the actual engines and DOM traversal. Every
//! selector is parsed and its engines checked before the host is asked to
//! traverse anything.

mod console;
pub mod error;
pub mod selector;

pub use console::{ConsoleApi, SelectorHost};
pub use error::{Error, Result};
pub use selector::{ParsedSelector, SelectorPart, parse_selector};

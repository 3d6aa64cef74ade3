//! [`ConsoleApi`] over a [`SelectorHost`].

use crate::error::{Error, Result};
use crate::selector::{ParsedSelector, parse_selector};

/// Selector engines and traversal supplied by the page side.
pub trait SelectorHost {
	type Element: Clone;
	type Root;

	/// Returns true if an engine with this name is registered.
	fn has_engine(&self, name: &str) -> bool;

	/// Root node queries start from.
	fn document(&self) -> &Self::Root;

	fn query_selector_all(&self, selector: &ParsedSelector, root: &Self::Root) -> Vec<Self::Element>;

	/// Whether the host can reveal an element in an inspector.
	fn can_inspect(&self) -> bool {
		false
	}

	fn inspect(&self, _element: Option<&Self::Element>) {}
}

/// `$`, `$$` and `inspect` helpers.
pub struct ConsoleApi<H> {
	host: H,
}

impl<H: SelectorHost> ConsoleApi<H> {
	pub fn new(host: H) -> Self {
		Self { host }
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	/// First element matching `selector` (`playwright.$`).
	pub fn query_selector(&self, selector: &str) -> Result<Option<H::Element>> {
		Ok(self.query_selector_all(selector)?.into_iter().next())
	}

	/// Every element matching `selector` (`playwright.$$`).
	pub fn query_selector_all(&self, selector: &str) -> Result<Vec<H::Element>> {
		let parsed = parse_selector(selector)?;
		self.check_selector(&parsed)?;
		let elements = self.host.query_selector_all(&parsed, self.host.document());
		tracing::debug!(%parsed, matches = elements.len(), "console query");
		Ok(elements)
	}

	/// Reveals the first match in the host inspector, if it has one.
	pub fn inspect(&self, selector: &str) -> Result<()> {
		if !self.host.can_inspect() {
			return Ok(());
		}
		let element = self.query_selector(selector)?;
		self.host.inspect(element.as_ref());
		Ok(())
	}

	fn check_selector(&self, parsed: &ParsedSelector) -> Result<()> {
		for part in &parsed.parts {
			if !self.host.has_engine(&part.name) {
				return Err(Error::UnknownEngine(part.name.clone()));
			}
		}
		Ok(())
	}
}

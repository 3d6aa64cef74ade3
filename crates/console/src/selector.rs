//! Selector parsing.
//!
//! A selector is a chain of parts separated by `>>`. Each part is either
//! `engine=body` or a bare body whose engine is implied:
//!
//! - `//…` or `..` → `xpath`
//! - a quoted string → `text`
//! - anything else → `css`
//!
//! A leading `*` marks the part whose matches are returned instead of the
//! last part's.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPart {
	/// Engine name, lowercased.
	pub name: String,
	pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
	pub parts: Vec<SelectorPart>,
	/// Index of the capturing part, if any.
	pub capture: Option<usize>,
}

impl fmt::Display for ParsedSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, part) in self.parts.iter().enumerate() {
			if i > 0 {
				f.write_str(" >> ")?;
			}
			if self.capture == Some(i) {
				f.write_str("*")?;
			}
			write!(f, "{}={}", part.name, part.body)?;
		}
		Ok(())
	}
}

/// Parses a selector string into its parts.
pub fn parse_selector(selector: &str) -> Result<ParsedSelector> {
	let invalid = |reason: &str| Error::InvalidSelector {
		selector: selector.to_string(),
		reason: reason.to_string(),
	};

	let mut parts = Vec::new();
	let mut capture = None;

	for chunk in split_chain(selector) {
		let mut chunk = chunk.trim();
		if chunk.starts_with('*') {
			if capture.is_some() {
				return Err(invalid("only one part can capture using the * modifier"));
			}
			capture = Some(parts.len());
			chunk = chunk[1..].trim_start();
		}
		if chunk.is_empty() {
			return Err(invalid("empty selector part"));
		}
		parts.push(parse_part(chunk));
	}

	if capture == Some(parts.len() - 1) {
		// Capturing the last part is the default.
		capture = None;
	}

	Ok(ParsedSelector { parts, capture })
}

fn parse_part(chunk: &str) -> SelectorPart {
	if let Some(eq) = chunk.find('=') {
		let name = &chunk[..eq];
		if is_engine_name(name) {
			return SelectorPart {
				name: name.to_ascii_lowercase(),
				body: chunk[eq + 1..].trim().to_string(),
			};
		}
	}

	let name = if chunk.starts_with("//") || chunk.starts_with("..") {
		"xpath"
	} else if chunk.starts_with('"') || chunk.starts_with('\'') {
		"text"
	} else {
		"css"
	};
	SelectorPart {
		name: name.to_string(),
		body: chunk.to_string(),
	}
}

fn is_engine_name(name: &str) -> bool {
	!name.is_empty()
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

/// Splits on `>>` outside of quotes.
fn split_chain(selector: &str) -> Vec<&str> {
	let bytes = selector.as_bytes();
	let mut chunks = Vec::new();
	let mut quote: Option<u8> = None;
	let mut start = 0;
	let mut i = 0;

	while i < bytes.len() {
		let c = bytes[i];
		match quote {
			Some(_) if c == b'\\' => {
				i += 2;
				continue;
			}
			Some(q) if c == q => quote = None,
			Some(_) => {}
			None if c == b'"' || c == b'\'' => quote = Some(c),
			None if c == b'>' && bytes.get(i + 1) == Some(&b'>') => {
				chunks.push(&selector[start..i]);
				i += 2;
				start = i;
				continue;
			}
			None => {}
		}
		i += 1;
	}
	chunks.push(&selector[start.min(selector.len())..]);
	chunks
}

#[cfg(test)]
mod tests {
	use super::*;

	fn names(selector: &str) -> Vec<(String, String)> {
		parse_selector(selector)
			.unwrap()
			.parts
			.into_iter()
			.map(|p| (p.name, p.body))
			.collect()
	}

	#[test]
	fn implicit_engines() {
		assert_eq!(names("div.item"), vec![("css".into(), "div.item".into())]);
		assert_eq!(names("//html/body"), vec![("xpath".into(), "//html/body".into())]);
		assert_eq!(names("\"Sign in\""), vec![("text".into(), "\"Sign in\"".into())]);
	}

	#[test]
	fn explicit_engines_and_chains() {
		assert_eq!(
			names("CSS=form >> text=Submit"),
			vec![("css".into(), "form".into()), ("text".into(), "Submit".into())]
		);
	}

	#[test]
	fn css_attribute_is_not_an_engine() {
		assert_eq!(
			names("input[name=q]"),
			vec![("css".into(), "input[name=q]".into())]
		);
	}

	#[test]
	fn separator_inside_quotes_is_body() {
		assert_eq!(
			names("text=\"a >> b\" >> css=span"),
			vec![("text".into(), "\"a >> b\"".into()), ("css".into(), "span".into())]
		);
	}

	#[test]
	fn capture_marker() {
		let parsed = parse_selector("*css=section >> text=Title").unwrap();
		assert_eq!(parsed.capture, Some(0));
		assert_eq!(parsed.to_string(), "*css=section >> text=Title");

		let last = parse_selector("css=section >> *text=Title").unwrap();
		assert_eq!(last.capture, None);

		assert!(parse_selector("*a >> *b").is_err());
	}

	#[test]
	fn empty_parts_are_rejected() {
		assert!(matches!(
			parse_selector(""),
			Err(Error::InvalidSelector { .. })
		));
		assert!(parse_selector("div >> ").is_err());
	}
}

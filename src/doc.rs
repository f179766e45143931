// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! The structured document node model and the builder seam towards the host
//! runtime.
//!
//! The host runtime normally supplies its own [`DocumentBuilder`] so decoded
//! items land directly in its data model. [`XmlBuilder`] is the default:
//! it parses one serialized unit into a [`DocNode`] tree, accepting a single
//! document element or, for non-XML output such as a module returning a bare
//! string, a text-only document.

use crate::{diagnostic::decode, error::Error};

/// One structured document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocNode {
	/// Element name, or `#text` for a text-only document.
	pub name: String,
	pub attributes: Vec<(String, String)>,
	pub children: Vec<DocChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocChild {
	Element(DocNode),
	Text(String),
}

impl DocNode {
	/// Concatenated descendant text content, in document order.
	pub fn text(&self) -> String {
		let mut out = String::new();
		self.collect_text(&mut out);
		out
	}

	fn collect_text(&self, out: &mut String) {
		for child in &self.children {
			match child {
				DocChild::Text(text) => out.push_str(text),
				DocChild::Element(node) => node.collect_text(out),
			}
		}
	}

	/// Child elements, skipping interleaved text.
	pub fn child_elements(&self) -> impl Iterator<Item = &DocNode> {
		self.children.iter().filter_map(|child| match child {
			DocChild::Element(node) => Some(node),
			DocChild::Text(_) => None,
		})
	}

	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.as_str())
	}
}

/// Turns one serialized result unit into a node of the host's data model.
pub trait DocumentBuilder {
	type Doc;

	fn build(&self, raw: &[u8]) -> Result<Self::Doc, Error>;
}

/// Default builder producing [`DocNode`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlBuilder;

impl DocumentBuilder for XmlBuilder {
	type Doc = DocNode;

	fn build(&self, raw: &[u8]) -> Result<DocNode, Error> {
		let text = std::str::from_utf8(raw)
			.map_err(|e| Error(decode::not_well_formed(e)))?;
		if text.trim_start().starts_with('<') {
			parse_fragment(text).map_err(|e| Error(decode::not_well_formed(e)))
		} else {
			// Bare output, e.g. a module returning a string.
			Ok(DocNode {
				name: "#text".to_string(),
				attributes: vec![],
				children: vec![DocChild::Text(text.to_string())],
			})
		}
	}
}

/// Parse one XML fragment with a single document element.
pub fn parse_fragment(input: &str) -> Result<DocNode, String> {
	let mut parser = Parser {
		input,
		pos: 0,
	};
	parser.skip_misc();
	let node = parser.parse_element()?;
	parser.skip_misc();
	if parser.pos != parser.input.len() {
		return Err("trailing content after the document element".to_string());
	}
	Ok(node)
}

struct Parser<'a> {
	input: &'a str,
	pos: usize,
}

impl<'a> Parser<'a> {
	fn rest(&self) -> &'a str {
		&self.input[self.pos..]
	}

	fn peek(&self) -> Option<u8> {
		self.input.as_bytes().get(self.pos).copied()
	}

	fn eat(&mut self, token: &str) -> bool {
		if self.rest().starts_with(token) {
			self.pos += token.len();
			true
		} else {
			false
		}
	}

	fn skip_whitespace(&mut self) {
		while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
			self.pos += 1;
		}
	}

	// Whitespace, an XML declaration, comments and processing instructions
	// may precede or follow the document element.
	fn skip_misc(&mut self) {
		loop {
			self.skip_whitespace();
			if self.rest().starts_with("<?") {
				match self.rest().find("?>") {
					Some(end) => self.pos += end + 2,
					None => return,
				}
			} else if self.rest().starts_with("<!--") {
				match self.rest().find("-->") {
					Some(end) => self.pos += end + 3,
					None => return,
				}
			} else {
				return;
			}
		}
	}

	fn read_name(&mut self) -> Result<String, String> {
		let start = self.pos;
		while let Some(b) = self.peek() {
			let ok = b.is_ascii_alphanumeric()
				|| matches!(b, b'_' | b'-' | b'.' | b':')
				|| b >= 0x80;
			if !ok {
				break;
			}
			self.pos += 1;
		}
		if self.pos == start {
			return Err(format!("expected a name at offset {}", start));
		}
		Ok(self.input[start..self.pos].to_string())
	}

	fn parse_element(&mut self) -> Result<DocNode, String> {
		if !self.eat("<") {
			return Err(format!("expected '<' at offset {}", self.pos));
		}
		let name = self.read_name()?;
		let mut node = DocNode {
			name,
			attributes: vec![],
			children: vec![],
		};
		loop {
			self.skip_whitespace();
			if self.eat("/>") {
				return Ok(node);
			}
			if self.eat(">") {
				break;
			}
			node.attributes.push(self.parse_attribute()?);
		}
		self.parse_children(&mut node)?;
		Ok(node)
	}

	fn parse_attribute(&mut self) -> Result<(String, String), String> {
		let name = self.read_name()?;
		self.skip_whitespace();
		if !self.eat("=") {
			return Err(format!("expected '=' after attribute '{}'", name));
		}
		self.skip_whitespace();
		let quote = match self.peek() {
			Some(q @ (b'"' | b'\'')) => q as char,
			_ => return Err(format!("expected a quoted value for attribute '{}'", name)),
		};
		self.pos += 1;
		let rest = self.rest();
		let end = rest
			.find(quote)
			.ok_or_else(|| format!("unterminated value for attribute '{}'", name))?;
		let value = decode_entities(&rest[..end])?;
		self.pos += end + 1;
		Ok((name, value))
	}

	fn parse_children(&mut self, node: &mut DocNode) -> Result<(), String> {
		loop {
			if self.rest().is_empty() {
				return Err(format!("element '{}' is never closed", node.name));
			}
			if self.eat("</") {
				let name = self.read_name()?;
				if name != node.name {
					return Err(format!(
						"mismatched closing tag: expected '{}', got '{}'",
						node.name, name
					));
				}
				self.skip_whitespace();
				if !self.eat(">") {
					return Err(format!("expected '>' after '</{}'", name));
				}
				return Ok(());
			}
			if self.rest().starts_with("<!--") {
				match self.rest().find("-->") {
					Some(end) => self.pos += end + 3,
					None => return Err("unterminated comment".to_string()),
				}
			} else if self.peek() == Some(b'<') {
				let child = self.parse_element()?;
				node.children.push(DocChild::Element(child));
			} else {
				let rest = self.rest();
				let end = rest.find('<').unwrap_or(rest.len());
				let text = decode_entities(&rest[..end])?;
				node.children.push(DocChild::Text(text));
				self.pos += end;
			}
		}
	}
}

fn decode_entities(input: &str) -> Result<String, String> {
	if !input.contains('&') {
		return Ok(input.to_string());
	}
	let mut out = String::with_capacity(input.len());
	let mut rest = input;
	while let Some(start) = rest.find('&') {
		out.push_str(&rest[..start]);
		rest = &rest[start..];
		let end = rest.find(';').ok_or("unterminated entity reference")?;
		let entity = &rest[1..end];
		match entity {
			"lt" => out.push('<'),
			"gt" => out.push('>'),
			"amp" => out.push('&'),
			"apos" => out.push('\''),
			"quot" => out.push('"'),
			_ => {
				let code = entity
					.strip_prefix("#x")
					.map(|hex| u32::from_str_radix(hex, 16))
					.or_else(|| entity.strip_prefix('#').map(|dec| dec.parse()))
					.ok_or_else(|| format!("unknown entity '&{};'", entity))?
					.map_err(|_| format!("invalid character reference '&{};'", entity))?;
				let ch = char::from_u32(code)
					.ok_or_else(|| format!("invalid character reference '&{};'", entity))?;
				out.push(ch);
			}
		}
		rest = &rest[end + 1..];
	}
	out.push_str(rest);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_simple_element() {
		let node = parse_fragment("<test>1</test>").unwrap();
		assert_eq!(node.name, "test");
		assert_eq!(node.text(), "1");
	}

	#[test]
	fn parses_nested_elements_and_attributes() {
		let node = parse_fragment(
			"<doc id=\"d1\"><title lang='en'>Hello</title><body>world</body></doc>",
		)
		.unwrap();
		assert_eq!(node.attribute("id"), Some("d1"));
		let children: Vec<_> = node.child_elements().collect();
		assert_eq!(children.len(), 2);
		assert_eq!(children[0].name, "title");
		assert_eq!(children[0].attribute("lang"), Some("en"));
		assert_eq!(node.text(), "Helloworld");
	}

	#[test]
	fn parses_self_closing_and_prolog() {
		let node = parse_fragment("<?xml version=\"1.0\"?><!-- c --><r><empty/></r>").unwrap();
		assert_eq!(node.child_elements().count(), 1);
		assert_eq!(node.child_elements().next().unwrap().name, "empty");
	}

	#[test]
	fn decodes_entities() {
		let node = parse_fragment("<t>&lt;a&gt; &amp; &#65;&#x42;</t>").unwrap();
		assert_eq!(node.text(), "<a> & AB");
	}

	#[test]
	fn rejects_mismatched_tags() {
		assert!(parse_fragment("<a><b></a></b>").is_err());
		assert!(parse_fragment("<a>").is_err());
		assert!(parse_fragment("<a></a><b></b>").is_err());
	}

	#[test]
	fn builder_accepts_bare_text() {
		let doc = XmlBuilder.build(b"test").unwrap();
		assert_eq!(doc.name, "#text");
		assert_eq!(doc.text(), "test");
	}

	#[test]
	fn builder_rejects_broken_fragment() {
		let err = XmlBuilder.build(b"<broken").unwrap_err();
		assert!(err.is_decode());
	}
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

use std::net::{Shutdown, TcpStream};

use tracing::debug;

use crate::{diagnostic::decode, error::Error, stream::RawItemStream};

/// Cursor over one `multipart/mixed` response body, yielding entity bodies
/// in arrival order through the shared raw-item-stream contract.
///
/// Owns the HTTP connection the body arrived on; it is released together
/// with the stream, on the same path as a native session.
#[derive(Debug)]
pub struct MultipartStream {
	conn: Option<TcpStream>,
	body: Vec<u8>,
	delimiter: Vec<u8>,
	pos: usize,
	finished: bool,
}

impl MultipartStream {
	/// Position the cursor after the first boundary delimiter. The body may
	/// carry a preamble before it; a missing delimiter is a decode failure.
	pub(crate) fn new(
		conn: Option<TcpStream>,
		body: Vec<u8>,
		boundary: &str,
	) -> Result<Self, Error> {
		let delimiter = format!("--{}", boundary).into_bytes();
		let mut stream = Self {
			conn,
			body,
			delimiter,
			pos: 0,
			finished: false,
		};

		let first = stream.find_delimiter_from(0).ok_or_else(|| {
			stream.close();
			Error(decode::malformed_multipart("missing opening boundary"))
		})?;
		stream.pos = first + stream.delimiter.len();
		stream.consume_delimiter_tail()?;
		Ok(stream)
	}

	/// A delimiter only counts at the start of a line.
	fn find_delimiter_from(&self, from: usize) -> Option<usize> {
		let mut search = from;
		loop {
			let offset = find(&self.body[search..], &self.delimiter)?;
			let at = search + offset;
			if at == 0 || self.body[..at].ends_with(b"\r\n") {
				return Some(at);
			}
			search = at + 1;
		}
	}

	/// After a delimiter: `--` ends the body, CRLF starts the next entity.
	fn consume_delimiter_tail(&mut self) -> Result<(), Error> {
		let tail = &self.body[self.pos..];
		if tail.starts_with(b"--") {
			self.finished = true;
			return Ok(());
		}
		if tail.starts_with(b"\r\n") {
			self.pos += 2;
			return Ok(());
		}
		self.finished = true;
		self.close();
		Err(Error(decode::malformed_multipart("garbage after boundary delimiter")))
	}
}

impl RawItemStream for MultipartStream {
	fn next_item(&mut self) -> Result<Option<Vec<u8>>, Error> {
		if self.finished {
			return Ok(None);
		}

		// The entity runs up to the next delimiter on its own line.
		let next = self.find_delimiter_from(self.pos).ok_or_else(|| {
			self.finished = true;
			self.close();
			Error(decode::malformed_multipart("missing closing boundary"))
		})?;
		// The delimiter's leading CRLF belongs to the entity; a delimiter
		// earlier than that means the entity is missing entirely.
		if next < self.pos + 2 {
			self.finished = true;
			self.close();
			return Err(Error(decode::malformed_multipart(
				"boundary delimiter without a preceding entity",
			)));
		}
		let entity = &self.body[self.pos..next - 2];

		// Entity headers end at the first blank line.
		let body_start = match find(entity, b"\r\n\r\n") {
			Some(at) => at + 4,
			None if entity.starts_with(b"\r\n") => 2,
			None => {
				self.finished = true;
				self.close();
				return Err(Error(decode::malformed_multipart(
					"entity without a header/body separator",
				)));
			}
		};
		let item = entity[body_start..].to_vec();

		self.pos = next + self.delimiter.len();
		self.consume_delimiter_tail()?;
		Ok(Some(item))
	}

	fn close(&mut self) {
		if let Some(conn) = self.conn.take() {
			let _ = conn.shutdown(Shutdown::Both);
			debug!("rest response connection released");
		}
	}
}

impl Drop for MultipartStream {
	fn drop(&mut self) {
		self.close();
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|window| window == needle)
}

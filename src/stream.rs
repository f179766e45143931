// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! The raw-item-stream capability shared by both transports.

use crate::error::Error;

/// An ordered, forward-only sequence of opaque byte-encoded result items.
///
/// A stream is consumed at most once and cannot be restarted. Implementations
/// own their network resources (session, connection, response body);
/// [`close`](RawItemStream::close) releases them and must be idempotent.
pub trait RawItemStream {
	/// Block until the next raw item arrives. `Ok(None)` signals that the
	/// producer ended the sequence.
	fn next_item(&mut self) -> Result<Option<Vec<u8>>, Error>;

	/// Release the session and any transport resources. Safe to call any
	/// number of times; failures during teardown are logged, not raised.
	fn close(&mut self);
}

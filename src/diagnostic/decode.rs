// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Diagnostics for malformed result data.

use std::fmt::Display;

use super::Diagnostic;

/// One raw result item could not be decoded into a document node.
pub fn malformed_item(index: u64, cause: impl Display) -> Diagnostic {
	Diagnostic::new(
		"DEC_001",
		format!("result item {} is not a well-formed document unit", index),
	)
	.with_cause(cause)
}

/// The multipart/mixed response body has a broken MIME structure.
pub fn malformed_multipart(cause: impl Display) -> Diagnostic {
	Diagnostic::new("DEC_002", "malformed multipart/mixed response body").with_cause(cause)
}

/// The HTTP response could not be parsed at all.
pub fn malformed_response(cause: impl Display) -> Diagnostic {
	Diagnostic::new("DEC_003", "malformed HTTP response").with_cause(cause)
}

/// A native protocol message could not be parsed.
pub fn malformed_message(cause: impl Display) -> Diagnostic {
	Diagnostic::new("DEC_004", "malformed protocol message").with_cause(cause)
}

/// A serialized unit is not a well-formed document fragment.
pub fn not_well_formed(cause: impl Display) -> Diagnostic {
	Diagnostic::new("DEC_006", "not a well-formed document fragment").with_cause(cause)
}

/// The result stream was already torn down by an earlier failure.
pub fn stream_closed() -> Diagnostic {
	Diagnostic::new("DEC_005", "the result stream is already closed")
		.with_help("a failed evaluation cannot be resumed; start a new call")
}

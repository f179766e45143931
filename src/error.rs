// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

use std::fmt::{Display, Formatter};

use crate::diagnostic::Diagnostic;

/// The single error type of this crate, wrapping a [`Diagnostic`].
///
/// Every error is terminal for the evaluation call that produced it; nothing
/// is retried internally. The diagnostic code prefix identifies the area:
/// `CFG_` for configuration, `NET_` for transport, `DEC_` for decoding.
#[derive(Debug, PartialEq)]
pub struct Error(pub Diagnostic);

impl Error {
	pub fn diagnostic(self) -> Diagnostic {
		self.0
	}

	pub fn code(&self) -> &str {
		&self.0.code
	}

	/// Bad or missing arguments, detected before any network I/O.
	pub fn is_config(&self) -> bool {
		self.0.code.starts_with("CFG_")
	}

	/// Connect, authentication or remote-execution failure.
	pub fn is_transport(&self) -> bool {
		self.0.code.starts_with("NET_")
	}

	/// Malformed raw item, protocol message or multipart body.
	pub fn is_decode(&self) -> bool {
		self.0.code.starts_with("DEC_")
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl std::error::Error for Error {}

impl From<Diagnostic> for Error {
	fn from(diagnostic: Diagnostic) -> Self {
		Error(diagnostic)
	}
}

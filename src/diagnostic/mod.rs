// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Diagnostic values carried by every [`crate::Error`].
//!
//! Each failure area has its own constructor module: [`config`] for argument
//! resolution (`CFG_xxx`), [`transport`] for connect/auth/remote-execution
//! failures (`NET_xxx`) and [`decode`] for malformed result data (`DEC_xxx`).
//! Configuration diagnostics are always produced before any network I/O.

pub mod config;
pub mod decode;
pub mod transport;

use std::fmt::{Display, Formatter};

/// A structured description of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	/// Machine-readable code, e.g. `CFG_003`.
	pub code: String,
	/// Human-readable message.
	pub message: String,
	/// Optional hint on how to fix the problem.
	pub help: Option<String>,
	/// Additional notes.
	pub notes: Vec<String>,
	/// The underlying cause, when this diagnostic wraps another failure.
	pub cause: Option<String>,
}

impl Diagnostic {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			help: None,
			notes: vec![],
			cause: None,
		}
	}

	pub fn with_help(mut self, help: impl Into<String>) -> Self {
		self.help = Some(help.into());
		self
	}

	pub fn with_cause(mut self, cause: impl Display) -> Self {
		self.cause = Some(cause.to_string());
		self
	}
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)?;
		if let Some(cause) = &self.cause {
			write!(f, ": {}", cause)?;
		}
		if let Some(help) = &self.help {
			write!(f, " ({})", help)?;
		}
		Ok(())
	}
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Diagnostics for connection, authentication and remote-execution failures.

use std::fmt::Display;

use super::Diagnostic;

/// Could not reach the server at all.
pub fn connection_failed(host: &str, port: u16, cause: impl Display) -> Diagnostic {
	Diagnostic::new(
		"NET_001",
		format!("failed to connect to {}:{}", host, port),
	)
	.with_help("check network connectivity and server status")
	.with_cause(cause)
}

/// The server rejected the supplied credentials.
pub fn authentication_failed(user: &str, cause: impl Display) -> Diagnostic {
	Diagnostic::new(
		"NET_002",
		format!("authentication failed for user '{}'", user),
	)
	.with_help("check the credentials and the authentication scheme")
	.with_cause(cause)
}

/// The server accepted the credentials but refused the operation.
pub fn permission_denied(cause: impl Display) -> Diagnostic {
	Diagnostic::new("NET_003", "the server refused the evaluation request")
		.with_help("the user needs evaluation privileges on the target database")
		.with_cause(cause)
}

/// Reading from or writing to an established connection failed.
pub fn io_failed(context: &str, cause: impl Display) -> Diagnostic {
	Diagnostic::new("NET_004", format!("i/o failure while {}", context)).with_cause(cause)
}

/// The server reported a remote execution failure.
pub fn remote_execution_failed(cause: impl Display) -> Diagnostic {
	Diagnostic::new("NET_005", "remote evaluation failed").with_cause(cause)
}

/// The session handshake did not complete.
pub fn handshake_failed(cause: impl Display) -> Diagnostic {
	Diagnostic::new("NET_006", "session handshake failed").with_cause(cause)
}

/// The server answered with an unexpected HTTP status.
pub fn unexpected_status(status: u16, reason: &str) -> Diagnostic {
	Diagnostic::new(
		"NET_007",
		format!("unexpected HTTP status {} {}", status, reason),
	)
}

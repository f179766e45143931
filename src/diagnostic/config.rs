// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Diagnostics for call-shape and configuration resolution.

use super::Diagnostic;

const LEGAL_SHAPES: &str = "arguments are either (query, config-element), \
	(query, config-map), (query, server, port, user, password), \
	(query, server, port, user, password, database), or \
	(query, server, port, user, password, database, authentication)";

/// Wrong number of arguments for any recognized call shape.
pub fn illegal_argument_count(count: usize) -> Diagnostic {
	Diagnostic::new(
		"CFG_001",
		format!("illegal number of arguments: {}", count),
	)
	.with_help(LEGAL_SHAPES)
}

/// Two-argument form where the second argument is neither a config element
/// nor a config map.
pub fn invalid_two_argument_form() -> Diagnostic {
	Diagnostic::new(
		"CFG_002",
		"the two-argument form requires a config element or a config map \
		 as second argument",
	)
	.with_help(LEGAL_SHAPES)
}

/// Positional form where one of the arguments is not a string.
pub fn invalid_positional_form() -> Diagnostic {
	Diagnostic::new(
		"CFG_003",
		"the positional form requires every argument to be a string",
	)
	.with_help(LEGAL_SHAPES)
}

/// Config element with a child name outside the recognized set.
pub fn unknown_config_child(name: &str) -> Diagnostic {
	Diagnostic::new(
		"CFG_004",
		format!("unrecognized config element child '{}'", name),
	)
	.with_help(
		"children must be 'server', 'port', 'user', 'password', \
		 'database'? and 'authentication'?",
	)
}

/// Config map with a key outside the recognized set.
pub fn unknown_config_key(key: &str) -> Diagnostic {
	Diagnostic::new("CFG_005", format!("unrecognized config key '{}'", key))
		.with_help(
			"keys must be 'server', 'port', 'user', 'password', \
			 'database'?, 'authentication'? and 'isXQueryOnServer'?",
		)
}

/// One or more mandatory connection fields are absent.
pub fn missing_config_fields(missing: &[&str]) -> Diagnostic {
	Diagnostic::new(
		"CFG_006",
		format!("missing mandatory config fields: {}", missing.join(", ")),
	)
	.with_help("'server', 'port', 'user' and 'password' are mandatory")
}

/// `port` is present but does not parse as an integer.
pub fn invalid_port(value: &str) -> Diagnostic {
	Diagnostic::new("CFG_007", format!("'port' is not a valid port number: '{}'", value))
}

/// `isXQueryOnServer` is present but does not parse as a boolean.
pub fn invalid_module_flag(value: &str) -> Diagnostic {
	Diagnostic::new(
		"CFG_008",
		format!("'isXQueryOnServer' must be 'true' or 'false', got '{}'", value),
	)
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Call-shape resolution.
//!
//! The host expression evaluator hands over an array of already-evaluated
//! arguments; four call shapes are recognized by argument count and runtime
//! shape. Classification happens exactly once at this boundary and produces
//! one canonical [`Configuration`]; nothing downstream is shape-aware.

use std::collections::BTreeMap;

use crate::{diagnostic::config, doc::DocNode, error::Error};

/// An already-evaluated argument as supplied by the host runtime.
#[derive(Debug, Clone)]
pub enum Argument {
	Text(String),
	Node(DocNode),
	Map(BTreeMap<String, String>),
}

/// Which kind of evaluation the invoked entry point stands for: an ad-hoc
/// script or a pre-deployed server-side module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
	Script,
	Module,
}

/// What gets submitted to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReference {
	/// A query body evaluated ad hoc.
	InlineScript(String),
	/// The location of a pre-deployed module, invoked without a body.
	ModulePath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
	#[default]
	Basic,
	Digest,
}

impl AuthScheme {
	/// Anything other than exactly `"digest"` resolves to Basic, typos
	/// included.
	pub fn resolve(value: &str) -> Self {
		match value {
			"digest" => AuthScheme::Digest,
			_ => AuthScheme::Basic,
		}
	}
}

/// The wire strategy used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
	/// Persistent session protocol.
	#[default]
	Native,
	/// `POST /v1/eval`, response parsed as `multipart/mixed`.
	HttpRest,
}

/// The canonical configuration of one evaluation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
	pub query: QueryReference,
	pub host: String,
	pub port: u16,
	pub database: Option<String>,
	pub user: String,
	pub password: String,
	pub auth: AuthScheme,
	pub transport: TransportKind,
}

/// The recognized call shapes, resolved once from the raw argument array.
#[derive(Debug)]
enum CallShape<'a> {
	StructuredConfig(&'a DocNode),
	MapConfig(&'a BTreeMap<String, String>),
	PositionalStrings(Vec<&'a str>),
}

impl Configuration {
	/// Resolve one of the four call shapes into a configuration.
	///
	/// `kind` is the default query flavor of the invoked entry point; the
	/// map shape's `isXQueryOnServer` key overrides it.
	pub fn resolve(kind: QueryKind, args: &[Argument]) -> Result<Configuration, Error> {
		let shape = classify(args)?;
		let query_text = query_argument(args, &shape)?;
		match shape {
			CallShape::StructuredConfig(node) => from_structured(kind, query_text, node),
			CallShape::MapConfig(map) => from_map(kind, query_text, map),
			CallShape::PositionalStrings(strings) => {
				from_positional(kind, query_text, &strings)
			}
		}
	}

	pub fn with_transport(mut self, transport: TransportKind) -> Self {
		self.transport = transport;
		self
	}
}

fn classify(args: &[Argument]) -> Result<CallShape<'_>, Error> {
	match args.len() {
		2 => match &args[1] {
			Argument::Node(node) => Ok(CallShape::StructuredConfig(node)),
			Argument::Map(map) => Ok(CallShape::MapConfig(map)),
			Argument::Text(_) => Err(Error(config::invalid_two_argument_form())),
		},
		5..=7 => {
			let mut strings = Vec::with_capacity(args.len() - 1);
			for arg in &args[1..] {
				match arg {
					Argument::Text(text) => strings.push(text.as_str()),
					_ => return Err(Error(config::invalid_positional_form())),
				}
			}
			Ok(CallShape::PositionalStrings(strings))
		}
		count => Err(Error(config::illegal_argument_count(count))),
	}
}

fn query_argument<'a>(args: &'a [Argument], shape: &CallShape<'_>) -> Result<&'a str, Error> {
	match &args[0] {
		Argument::Text(text) => Ok(text.as_str()),
		_ => Err(match shape {
			CallShape::PositionalStrings(_) => Error(config::invalid_positional_form()),
			_ => Error(config::invalid_two_argument_form()),
		}),
	}
}

/// Field values as collected from a shape, before validation.
#[derive(Default)]
struct RawFields {
	server: Option<String>,
	port: Option<String>,
	user: Option<String>,
	password: Option<String>,
	database: Option<String>,
	authentication: Option<String>,
}

impl RawFields {
	fn into_configuration(self, query: QueryReference) -> Result<Configuration, Error> {
		let mut missing = Vec::new();
		if self.server.is_none() {
			missing.push("server");
		}
		if self.port.is_none() {
			missing.push("port");
		}
		if self.user.is_none() {
			missing.push("user");
		}
		if self.password.is_none() {
			missing.push("password");
		}
		if !missing.is_empty() {
			return Err(Error(config::missing_config_fields(&missing)));
		}
		let port_text = self.port.unwrap_or_default();
		let port = port_text
			.parse::<u16>()
			.map_err(|_| Error(config::invalid_port(&port_text)))?;
		Ok(Configuration {
			query,
			host: self.server.unwrap_or_default(),
			port,
			database: self.database,
			user: self.user.unwrap_or_default(),
			password: self.password.unwrap_or_default(),
			auth: AuthScheme::resolve(self.authentication.as_deref().unwrap_or("basic")),
			transport: TransportKind::default(),
		})
	}
}

fn query_reference(kind: QueryKind, query: &str) -> QueryReference {
	match kind {
		QueryKind::Script => QueryReference::InlineScript(query.to_string()),
		QueryKind::Module => QueryReference::ModulePath(query.to_string()),
	}
}

fn from_structured(kind: QueryKind, query: &str, node: &DocNode) -> Result<Configuration, Error> {
	let mut fields = RawFields::default();
	for child in node.child_elements() {
		let value = child.text();
		match child.name.as_str() {
			"server" => fields.server = Some(value),
			"port" => fields.port = Some(value),
			"user" => fields.user = Some(value),
			"password" => fields.password = Some(value),
			"database" => fields.database = Some(value),
			"authentication" => fields.authentication = Some(value),
			other => return Err(Error(config::unknown_config_child(other))),
		}
	}
	fields.into_configuration(query_reference(kind, query))
}

fn from_map(
	kind: QueryKind,
	query: &str,
	map: &BTreeMap<String, String>,
) -> Result<Configuration, Error> {
	let mut fields = RawFields::default();
	let mut on_server = None;
	for (key, value) in map {
		match key.as_str() {
			"server" => fields.server = Some(value.clone()),
			"port" => fields.port = Some(value.clone()),
			"user" => fields.user = Some(value.clone()),
			"password" => fields.password = Some(value.clone()),
			"database" => fields.database = Some(value.clone()),
			"authentication" => fields.authentication = Some(value.clone()),
			"isXQueryOnServer" => {
				let flag = value
					.parse::<bool>()
					.map_err(|_| Error(config::invalid_module_flag(value)))?;
				on_server = Some(flag);
			}
			other => return Err(Error(config::unknown_config_key(other))),
		}
	}
	let kind = match on_server {
		Some(true) => QueryKind::Module,
		Some(false) => QueryKind::Script,
		None => kind,
	};
	fields.into_configuration(query_reference(kind, query))
}

fn from_positional(kind: QueryKind, query: &str, strings: &[&str]) -> Result<Configuration, Error> {
	let fields = RawFields {
		server: Some(strings[0].to_string()),
		port: Some(strings[1].to_string()),
		user: Some(strings[2].to_string()),
		password: Some(strings[3].to_string()),
		database: strings.get(4).map(|s| s.to_string()),
		authentication: strings.get(5).map(|s| s.to_string()),
	};
	fields.into_configuration(query_reference(kind, query))
}

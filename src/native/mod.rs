// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Native session protocol strategy.
//!
//! One evaluation call opens one framed session, authenticates it, submits
//! the query and then pulls one result item per frame until the server sends
//! the end-of-results message.

pub(crate) mod wire;

mod session;

use serde::{Deserialize, Serialize};
pub use session::{NativeSession, NativeStream};

use crate::{
	config::Configuration,
	error::Error,
	eval::Transport,
	stream::RawItemStream,
};

/// Protocol request envelope.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Request {
	pub id: String,
	#[serde(flatten)]
	pub payload: RequestPayload,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub(crate) enum RequestPayload {
	Auth(AuthRequest),
	Eval(EvalRequest),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AuthRequest {
	pub scheme: String,
	pub user: String,
	pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EvalRequest {
	/// Session scope; the server default database when absent.
	pub database: Option<String>,
	#[serde(flatten)]
	pub source: EvalSource,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub(crate) enum EvalSource {
	/// Ad-hoc script body.
	Xquery(String),
	/// Location of a pre-deployed module.
	Module(String),
}

/// Protocol response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Response {
	pub id: String,
	#[serde(flatten)]
	pub payload: ResponsePayload,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub(crate) enum ResponsePayload {
	Auth(AuthResponse),
	Item(ItemResponse),
	End(EndResponse),
	Err(ErrResponse),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AuthResponse {}

/// One serialized result item.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ItemResponse {
	pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EndResponse {}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrResponse {
	pub code: String,
	pub message: String,
}

/// The native strategy behind the [`Transport`] capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTransport;

impl Transport for NativeTransport {
	fn submit(&self, config: &Configuration) -> Result<Box<dyn RawItemStream>, Error> {
		let session = NativeSession::connect(config)?;
		Ok(Box::new(session.submit(config)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_envelope_serializes_with_flat_payload() {
		let request = Request {
			id: "1".to_string(),
			payload: RequestPayload::Eval(EvalRequest {
				database: Some("Documents".to_string()),
				source: EvalSource::Xquery("1 to 3".to_string()),
			}),
		};
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json["type"], "Eval");
		assert_eq!(json["payload"]["database"], "Documents");
		assert_eq!(json["payload"]["kind"], "xquery");
		assert_eq!(json["payload"]["text"], "1 to 3");
	}

	#[test]
	fn response_envelope_parses_items_and_errors() {
		let item: Response = serde_json::from_str(
			r#"{"id":"1","type":"Item","payload":{"body":"<test>1</test>"}}"#,
		)
		.unwrap();
		assert!(matches!(
			item.payload,
			ResponsePayload::Item(ItemResponse { body }) if body == "<test>1</test>"
		));

		let err: Response = serde_json::from_str(
			r#"{"id":"1","type":"Err","payload":{"code":"XDMP-UNDFUN","message":"undefined function"}}"#,
		)
		.unwrap();
		assert!(matches!(err.payload, ResponsePayload::Err(_)));
	}
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Raw HTTP strategy against the REST evaluation endpoint.
//!
//! One evaluation call is one `POST /v1/eval` (or `/v1/invoke` for module
//! references); the `multipart/mixed` response body is tokenized into the
//! same ordered raw-item contract the native strategy provides.

mod client;
mod multipart;

pub use client::RestSession;
pub use multipart::MultipartStream;

use crate::{config::Configuration, error::Error, eval::Transport, stream::RawItemStream};

/// The REST strategy behind the [`Transport`] capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestTransport;

impl Transport for RestTransport {
	fn submit(&self, config: &Configuration) -> Result<Box<dyn RawItemStream>, Error> {
		let session = RestSession::connect(config)?;
		Ok(Box::new(session.submit(config)?))
	}
}

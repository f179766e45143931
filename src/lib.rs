// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Blocking client for evaluating XQuery against a remote document
//! database and streaming the result sequence lazily.
//!
//! A query is either an inline script sent with the request or the path
//! of a module already deployed on the server. Connection details come
//! from the call arguments in one of three shapes: a structured config
//! document, a key/value map, or positional strings. Results arrive as a
//! stream of items that are decoded one at a time into [`DocNode`]
//! fragments; the session is held open while the caller pulls and is
//! released exactly once, whether the stream is drained, abandoned or
//! fails midway.
//!
//! ```no_run
//! use xqeval::{evaluate, Argument, QueryKind};
//!
//! let args = vec![
//! 	Argument::Text("1 to 3".into()),
//! 	Argument::Text("localhost".into()),
//! 	Argument::Text("8003".into()),
//! 	Argument::Text("admin".into()),
//! 	Argument::Text("admin".into()),
//! 	Argument::Text("Documents".into()),
//! ];
//! for doc in evaluate(QueryKind::Script, &args)? {
//! 	println!("{}", doc?.text());
//! }
//! # Ok::<(), xqeval::Error>(())
//! ```

mod config;
pub mod diagnostic;
mod doc;
mod error;
mod eval;
pub mod native;
pub mod rest;
mod stream;

pub use config::{
	Argument, AuthScheme, Configuration, QueryKind, QueryReference,
	TransportKind,
};
pub use diagnostic::Diagnostic;
pub use doc::{DocChild, DocNode, DocumentBuilder, XmlBuilder};
pub use error::Error;
pub use eval::{evaluate, evaluate_config, evaluate_with, EvalIterator, Transport};
pub use native::NativeTransport;
pub use rest::RestTransport;
pub use stream::RawItemStream;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

use tracing::{debug, warn};

use crate::{
	config::{Argument, Configuration, QueryKind, TransportKind},
	diagnostic::decode,
	doc::{DocumentBuilder, XmlBuilder},
	error::Error,
	native::NativeTransport,
	rest::RestTransport,
	stream::RawItemStream,
};

/// Connection strategy behind an evaluation. Implementations resolve a
/// session from the configuration, submit the query and hand back the raw
/// item stream; nothing is pulled from the server until the caller asks.
pub trait Transport {
	fn submit(&self, config: &Configuration) -> Result<Box<dyn RawItemStream>, Error>;
}

/// Evaluate a query against the built-in transports, decoding each result
/// item into a [`DocNode`](crate::doc::DocNode).
///
/// Resolves the call arguments first; a malformed call never opens a
/// connection. The returned iterator streams lazily and releases its
/// session exactly once, on exhaustion, failure, [`EvalIterator::close`]
/// or drop.
pub fn evaluate(
	kind: QueryKind,
	args: &[Argument],
) -> Result<EvalIterator<XmlBuilder>, Error> {
	let config = Configuration::resolve(kind, args)?;
	evaluate_config(config, XmlBuilder)
}

/// [`evaluate`] with a caller-supplied document builder.
pub fn evaluate_with<B: DocumentBuilder>(
	kind: QueryKind,
	args: &[Argument],
	transport: &dyn Transport,
	builder: B,
) -> Result<EvalIterator<B>, Error> {
	let config = Configuration::resolve(kind, args)?;
	let stream = transport.submit(&config)?;
	Ok(EvalIterator::new(stream, builder))
}

/// Evaluate an already-resolved configuration.
pub fn evaluate_config<B: DocumentBuilder>(
	config: Configuration,
	builder: B,
) -> Result<EvalIterator<B>, Error> {
	let stream = match config.transport {
		TransportKind::Native => NativeTransport.submit(&config)?,
		TransportKind::HttpRest => RestTransport.submit(&config)?,
	};
	Ok(EvalIterator::new(stream, builder))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
	Created,
	Streaming,
	Closed(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
	Exhausted,
	Aborted,
	Failed,
}

/// Lazy cursor over the result sequence of one evaluation.
///
/// Each pull decodes exactly one item through the document builder. The
/// underlying session is released exactly once: when the stream runs out,
/// when decoding or transport fails, or when the iterator is closed or
/// dropped before exhaustion.
pub struct EvalIterator<B: DocumentBuilder> {
	stream: Box<dyn RawItemStream>,
	builder: B,
	state: StreamState,
	decoded: u64,
}

impl<B: DocumentBuilder> EvalIterator<B> {
	fn new(stream: Box<dyn RawItemStream>, builder: B) -> Self {
		Self {
			stream,
			builder,
			state: StreamState::Created,
			decoded: 0,
		}
	}

	/// Pull and decode the next result item. `Ok(None)` marks natural
	/// exhaustion; pulling past a failure or an explicit close is an error.
	pub fn next_doc(&mut self) -> Result<Option<B::Doc>, Error> {
		match self.state {
			StreamState::Closed(CloseReason::Exhausted) => return Ok(None),
			StreamState::Closed(_) => {
				return Err(Error(decode::stream_closed()));
			}
			StreamState::Created => self.state = StreamState::Streaming,
			StreamState::Streaming => {}
		}

		let raw = match self.stream.next_item() {
			Ok(Some(raw)) => raw,
			Ok(None) => {
				self.release(CloseReason::Exhausted);
				return Ok(None);
			}
			Err(e) => {
				self.release(CloseReason::Failed);
				return Err(e);
			}
		};

		match self.builder.build(&raw) {
			Ok(doc) => {
				self.decoded += 1;
				Ok(Some(doc))
			}
			Err(e) => {
				// Release before surfacing: a half-decoded stream is
				// not resumable.
				self.release(CloseReason::Failed);
				Err(Error(decode::malformed_item(self.decoded, e.0)))
			}
		}
	}

	/// Abandon the remainder of the result sequence and release the
	/// session. Safe to call at any point, any number of times.
	pub fn close(&mut self) {
		self.release(CloseReason::Aborted);
	}

	fn release(&mut self, reason: CloseReason) {
		if matches!(self.state, StreamState::Closed(_)) {
			return;
		}
		self.state = StreamState::Closed(reason);
		self.stream.close();
		match reason {
			CloseReason::Failed => {
				warn!(results = self.decoded, "evaluation stream released after failure");
			}
			_ => debug!(results = self.decoded, ?reason, "evaluation stream released"),
		}
	}
}

impl<B: DocumentBuilder> std::fmt::Debug for EvalIterator<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EvalIterator")
			.field("state", &self.state)
			.field("decoded", &self.decoded)
			.finish_non_exhaustive()
	}
}

impl<B: DocumentBuilder> Iterator for EvalIterator<B> {
	type Item = Result<B::Doc, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		if matches!(self.state, StreamState::Closed(_)) {
			return None;
		}
		self.next_doc().transpose()
	}
}

impl<B: DocumentBuilder> Drop for EvalIterator<B> {
	fn drop(&mut self) {
		self.release(CloseReason::Aborted);
	}
}

#[cfg(test)]
mod tests {
	use std::{cell::Cell, rc::Rc};

	use super::*;
	use crate::{config::QueryReference, doc::XmlBuilder};

	struct FakeStream {
		items: Vec<Result<Vec<u8>, Error>>,
		closes: Rc<Cell<u32>>,
	}

	impl RawItemStream for FakeStream {
		fn next_item(&mut self) -> Result<Option<Vec<u8>>, Error> {
			if self.items.is_empty() {
				return Ok(None);
			}
			self.items.remove(0).map(Some)
		}

		fn close(&mut self) {
			self.closes.set(self.closes.get() + 1);
		}
	}

	fn iterator(
		items: Vec<Result<Vec<u8>, Error>>,
	) -> (EvalIterator<XmlBuilder>, Rc<Cell<u32>>) {
		let closes = Rc::new(Cell::new(0));
		let stream = FakeStream {
			items,
			closes: Rc::clone(&closes),
		};
		(EvalIterator::new(Box::new(stream), XmlBuilder), closes)
	}

	fn item(s: &str) -> Result<Vec<u8>, Error> {
		Ok(s.as_bytes().to_vec())
	}

	#[test]
	fn decodes_items_in_order_and_releases_once_on_exhaustion() {
		let (mut iter, closes) = iterator(vec![item("<a/>"), item("<b/>")]);
		assert_eq!(iter.next_doc().unwrap().unwrap().name, "a");
		assert_eq!(iter.next_doc().unwrap().unwrap().name, "b");
		assert!(iter.next_doc().unwrap().is_none());
		assert_eq!(closes.get(), 1);

		// Exhaustion is sticky, not an error.
		assert!(iter.next_doc().unwrap().is_none());
		drop(iter);
		assert_eq!(closes.get(), 1);
	}

	#[test]
	fn abandonment_releases_the_session() {
		let (mut iter, closes) = iterator(vec![item("<a/>"), item("<b/>")]);
		assert!(iter.next_doc().unwrap().is_some());
		drop(iter);
		assert_eq!(closes.get(), 1);
	}

	#[test]
	fn explicit_close_is_idempotent_and_terminal() {
		let (mut iter, closes) = iterator(vec![item("<a/>")]);
		iter.close();
		iter.close();
		assert_eq!(closes.get(), 1);

		let err = iter.next_doc().unwrap_err();
		assert_eq!(err.code(), "DEC_005");
		assert!(iter.next().is_none());
	}

	#[test]
	fn decode_failure_releases_before_surfacing() {
		let (mut iter, closes) = iterator(vec![item("<a/>"), item("<broken")]);
		assert!(iter.next_doc().unwrap().is_some());
		let err = iter.next_doc().unwrap_err();
		assert_eq!(err.code(), "DEC_001");
		assert_eq!(closes.get(), 1);
		assert!(iter.next_doc().is_err());
		assert_eq!(closes.get(), 1);
	}

	#[test]
	fn transport_failure_releases_and_propagates() {
		let (mut iter, closes) = iterator(vec![
			item("<a/>"),
			Err(Error(crate::diagnostic::transport::io_failed(
				"reading result frame",
				"connection reset",
			))),
		]);
		assert!(iter.next_doc().unwrap().is_some());
		let err = iter.next_doc().unwrap_err();
		assert!(err.is_transport());
		assert_eq!(closes.get(), 1);
	}

	#[test]
	fn iterator_yields_results_then_none() {
		let (iter, _closes) = iterator(vec![item("<a/>"), item("<b/>")]);
		let names: Vec<String> =
			iter.map(|doc| doc.unwrap().name).collect();
		assert_eq!(names, ["a", "b"]);
	}

	struct RecordingTransport {
		submits: Rc<Cell<u32>>,
	}

	impl Transport for RecordingTransport {
		fn submit(
			&self,
			config: &Configuration,
		) -> Result<Box<dyn RawItemStream>, Error> {
			self.submits.set(self.submits.get() + 1);
			assert!(matches!(config.query, QueryReference::InlineScript(_)));
			Ok(Box::new(FakeStream {
				items: vec![Ok(b"<r/>".to_vec())],
				closes: Rc::new(Cell::new(0)),
			}))
		}
	}

	#[test]
	fn malformed_calls_never_reach_the_transport() {
		let submits = Rc::new(Cell::new(0));
		let transport = RecordingTransport {
			submits: Rc::clone(&submits),
		};

		let args = vec![
			Argument::Text("q".into()),
			Argument::Text("host".into()),
			Argument::Text("8003".into()),
		];
		let err = evaluate_with(QueryKind::Script, &args, &transport, XmlBuilder)
			.unwrap_err();
		assert!(err.is_config());
		assert_eq!(submits.get(), 0);

		let args = vec![
			Argument::Text("q".into()),
			Argument::Text("host".into()),
			Argument::Text("8003".into()),
			Argument::Text("user".into()),
			Argument::Text("pw".into()),
			Argument::Text("db".into()),
		];
		let mut iter =
			evaluate_with(QueryKind::Script, &args, &transport, XmlBuilder).unwrap();
		assert_eq!(submits.get(), 1);
		assert_eq!(iter.next_doc().unwrap().unwrap().name, "r");
	}
}

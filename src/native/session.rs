// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

use std::{
	io::Write,
	net::{Shutdown, TcpStream},
	sync::atomic::{AtomicU64, Ordering},
};

use tracing::debug;

use crate::{
	config::{AuthScheme, Configuration, QueryReference},
	diagnostic::{decode, transport},
	error::Error,
	native::{
		AuthRequest, EvalRequest, EvalSource, Request, RequestPayload, Response,
		ResponsePayload, wire,
	},
	stream::RawItemStream,
};

fn next_request_id() -> String {
	static COUNTER: AtomicU64 = AtomicU64::new(0);
	format!("req-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// One live authenticated session. Never pooled; exactly one per evaluation
/// call, consumed by [`NativeSession::submit`].
pub struct NativeSession {
	stream: TcpStream,
	host: String,
}

impl NativeSession {
	/// Connect, complete the protocol handshake and authenticate with the
	/// configured credentials.
	pub fn connect(config: &Configuration) -> Result<Self, Error> {
		let stream = TcpStream::connect((config.host.as_str(), config.port))
			.map_err(|e| {
				Error(transport::connection_failed(&config.host, config.port, e))
			})?;
		let mut session = Self {
			stream,
			host: config.host.clone(),
		};
		session.handshake(config)?;
		session.authenticate(config)?;
		debug!(host = %config.host, port = config.port, "native session established");
		Ok(session)
	}

	fn handshake(&mut self, config: &Configuration) -> Result<(), Error> {
		let key = wire::nonce_key();
		let request = format!(
			"GET /v1/session HTTP/1.1\r\n\
			 Host: {}:{}\r\n\
			 Upgrade: websocket\r\n\
			 Connection: Upgrade\r\n\
			 Sec-WebSocket-Key: {}\r\n\
			 Sec-WebSocket-Version: 13\r\n\
			 \r\n",
			self.host, config.port, key
		);
		self.stream
			.write_all(request.as_bytes())
			.and_then(|_| self.stream.flush())
			.map_err(|e| Error(transport::handshake_failed(e)))?;

		let head = wire::read_http_head(&mut self.stream)
			.map_err(|e| Error(transport::handshake_failed(e)))?;
		let head = String::from_utf8_lossy(&head);
		if !head.starts_with("HTTP/1.1 101") {
			return Err(Error(transport::handshake_failed(format!(
				"server answered: {}",
				head.lines().next().unwrap_or_default()
			))));
		}
		if !head.contains(&wire::accept_key(&key)) {
			return Err(Error(transport::handshake_failed(
				"invalid Sec-WebSocket-Accept value",
			)));
		}
		Ok(())
	}

	fn authenticate(&mut self, config: &Configuration) -> Result<(), Error> {
		let scheme = match config.auth {
			AuthScheme::Basic => "basic",
			AuthScheme::Digest => "digest",
		};
		self.send(&Request {
			id: next_request_id(),
			payload: RequestPayload::Auth(AuthRequest {
				scheme: scheme.to_string(),
				user: config.user.clone(),
				password: config.password.clone(),
			}),
		})?;
		match self.receive()?.payload {
			ResponsePayload::Auth(_) => Ok(()),
			ResponsePayload::Err(err) => Err(Error(transport::authentication_failed(
				&config.user,
				format!("{}: {}", err.code, err.message),
			))),
			_ => Err(Error(decode::malformed_message(
				"unexpected message during authentication",
			))),
		}
	}

	/// Submit the query and hand the connection over to the result stream.
	/// Returns as soon as the request is on the wire; no item is read here.
	pub fn submit(mut self, config: &Configuration) -> Result<NativeStream, Error> {
		let source = match &config.query {
			QueryReference::InlineScript(text) => EvalSource::Xquery(text.clone()),
			QueryReference::ModulePath(path) => EvalSource::Module(path.clone()),
		};
		self.send(&Request {
			id: next_request_id(),
			payload: RequestPayload::Eval(EvalRequest {
				database: config.database.clone(),
				source,
			}),
		})?;
		debug!(database = ?config.database, "evaluation submitted");
		Ok(NativeStream {
			stream: Some(self.stream),
		})
	}

	fn send(&mut self, request: &Request) -> Result<(), Error> {
		let json = serde_json::to_vec(request)
			.map_err(|e| Error(transport::io_failed("serializing a request", e)))?;
		let frame = wire::encode_frame(wire::OP_TEXT, &json, true);
		self.stream
			.write_all(&frame)
			.and_then(|_| self.stream.flush())
			.map_err(|e| Error(transport::io_failed("sending a request", e)))
	}

	fn receive(&mut self) -> Result<Response, Error> {
		receive_response(&mut self.stream)
	}
}

fn receive_response(stream: &mut TcpStream) -> Result<Response, Error> {
	loop {
		let (opcode, payload) = wire::read_frame(stream)
			.map_err(|e| Error(transport::io_failed("reading a response", e)))?;
		match opcode {
			wire::OP_TEXT | wire::OP_BINARY => {
				return serde_json::from_slice(&payload)
					.map_err(|e| Error(decode::malformed_message(e)));
			}
			wire::OP_PING => {
				let pong = wire::encode_frame(wire::OP_PONG, &payload, true);
				stream.write_all(&pong).map_err(|e| {
					Error(transport::io_failed("answering a ping", e))
				})?;
			}
			wire::OP_PONG => {}
			wire::OP_CLOSE => {
				return Err(Error(transport::io_failed(
					"reading a response",
					"connection closed by server",
				)));
			}
			other => {
				return Err(Error(decode::malformed_message(format!(
					"unknown frame opcode {:#x}",
					other
				))));
			}
		}
	}
}

/// The raw result stream of a native session: one item per frame, terminated
/// by the end message. Owns the connection; closing sends the protocol close
/// frame and shuts the socket down.
pub struct NativeStream {
	stream: Option<TcpStream>,
}

impl RawItemStream for NativeStream {
	fn next_item(&mut self) -> Result<Option<Vec<u8>>, Error> {
		let Some(stream) = self.stream.as_mut() else {
			return Ok(None);
		};
		match receive_response(stream)?.payload {
			ResponsePayload::Item(item) => Ok(Some(item.body.into_bytes())),
			ResponsePayload::End(_) => Ok(None),
			ResponsePayload::Err(err) => Err(Error(transport::remote_execution_failed(
				format!("{}: {}", err.code, err.message),
			))),
			ResponsePayload::Auth(_) => Err(Error(decode::malformed_message(
				"unexpected authentication message in the result stream",
			))),
		}
	}

	fn close(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			let close = wire::encode_frame(wire::OP_CLOSE, &[], true);
			if let Err(e) = stream.write_all(&close) {
				debug!(error = %e, "close frame not delivered");
			}
			let _ = stream.shutdown(Shutdown::Both);
			debug!("native session released");
		}
	}
}

impl Drop for NativeStream {
	fn drop(&mut self) {
		self.close();
	}
}

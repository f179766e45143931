// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! In-process fake servers for the two transport strategies.

use std::{
	io::{Read, Write},
	net::{TcpListener, TcpStream},
	sync::{
		Once,
		mpsc::{self, Receiver},
	},
	thread,
};

use base64::encode as b64;
use serde_json::{Value, json};
use sha1::{Digest, Sha1};
use xqeval::{Argument, Configuration, QueryKind, TransportKind};

/// What a fake server observed, in order. The final event of every
/// connection is `ConnectionClosed`, emitted once the peer goes away.
#[derive(Debug)]
pub enum ServerEvent {
	Request(String),
	Message(Value),
	ConnectionClosed,
}

fn init_tracing() {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.try_init();
	});
}

#[allow(dead_code)]
pub fn positional_args(port: u16, query: &str) -> Vec<Argument> {
	vec![
		Argument::Text(query.to_string()),
		Argument::Text("127.0.0.1".to_string()),
		Argument::Text(port.to_string()),
		Argument::Text("admin".to_string()),
		Argument::Text("secret".to_string()),
		Argument::Text("Documents".to_string()),
	]
}

#[allow(dead_code)]
pub fn config(port: u16, query: &str, transport: TransportKind) -> Configuration {
	Configuration::resolve(QueryKind::Script, &positional_args(port, query))
		.unwrap()
		.with_transport(transport)
}

#[allow(dead_code)]
pub fn multipart_body(boundary: &str, parts: &[String]) -> String {
	let mut body = String::new();
	for part in parts {
		body.push_str(&format!(
			"--{}\r\nContent-Type: text/xml\r\n\r\n{}\r\n",
			boundary, part
		));
	}
	body.push_str(&format!("--{}--\r\n", boundary));
	body
}

#[allow(dead_code)]
pub fn multipart_response(parts: &[String]) -> String {
	let body = multipart_body("FAKE_BOUNDARY", parts);
	format!(
		"HTTP/1.1 200 OK\r\n\
		 Content-Type: multipart/mixed; boundary=FAKE_BOUNDARY\r\n\
		 Content-Length: {}\r\n\
		 Connection: close\r\n\
		 \r\n{}",
		body.len(),
		body
	)
}

/// Serve one canned response per accepted connection, recording the raw
/// request and the eventual connection teardown.
#[allow(dead_code)]
pub fn spawn_rest_server(responses: Vec<String>) -> (u16, Receiver<ServerEvent>) {
	init_tracing();
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	let (events, receiver) = mpsc::channel();

	thread::spawn(move || {
		for response in responses {
			let (mut stream, _) = listener.accept().unwrap();
			let request = read_http_request(&mut stream);
			events.send(ServerEvent::Request(request)).unwrap();

			stream.write_all(response.as_bytes()).unwrap();
			let _ = stream.shutdown(std::net::Shutdown::Write);
			wait_for_peer_close(&mut stream);
			events.send(ServerEvent::ConnectionClosed).unwrap();
		}
	});
	(port, receiver)
}

fn read_http_request(stream: &mut TcpStream) -> String {
	let mut raw = Vec::new();
	let mut byte = [0u8; 1];
	while !raw.ends_with(b"\r\n\r\n") {
		stream.read_exact(&mut byte).unwrap();
		raw.push(byte[0]);
	}
	let head = String::from_utf8(raw.clone()).unwrap();
	let length: usize = head
		.lines()
		.find_map(|line| {
			let (name, value) = line.split_once(':')?;
			name.eq_ignore_ascii_case("content-length")
				.then(|| value.trim().parse().unwrap())
		})
		.unwrap_or(0);
	let mut body = vec![0u8; length];
	stream.read_exact(&mut body).unwrap();
	raw.extend_from_slice(&body);
	String::from_utf8(raw).unwrap()
}

fn wait_for_peer_close(stream: &mut TcpStream) {
	let mut scratch = [0u8; 256];
	while let Ok(n) = stream.read(&mut scratch) {
		if n == 0 {
			break;
		}
	}
}

/// Scripted behavior for one native protocol session.
#[allow(dead_code)]
pub struct NativeScript {
	pub reject_auth: bool,
	pub items: Vec<String>,
	pub error_after: Option<(String, String)>,
}

#[allow(dead_code)]
impl NativeScript {
	pub fn items(items: Vec<String>) -> Self {
		Self {
			reject_auth: false,
			items,
			error_after: None,
		}
	}
}

/// One scripted session: handshake, auth, eval, then the scripted result
/// frames. Records every client message and the connection teardown.
#[allow(dead_code)]
pub fn spawn_native_server(script: NativeScript) -> (u16, Receiver<ServerEvent>) {
	init_tracing();
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	let (events, receiver) = mpsc::channel();

	thread::spawn(move || {
		let (mut stream, _) = listener.accept().unwrap();
		handshake(&mut stream);

		// Auth round.
		let auth = read_client_message(&mut stream);
		let id = auth["id"].as_str().unwrap_or_default().to_string();
		events.send(ServerEvent::Message(auth)).unwrap();
		if script.reject_auth {
			send_message(
				&mut stream,
				&json!({
					"id": id,
					"type": "Err",
					"payload": {"code": "SEC-AUTH", "message": "unauthorized"}
				}),
			);
			wait_for_peer_close(&mut stream);
			events.send(ServerEvent::ConnectionClosed).unwrap();
			return;
		}
		send_message(&mut stream, &json!({"id": id, "type": "Auth", "payload": {}}));

		// Eval round.
		let eval = read_client_message(&mut stream);
		let id = eval["id"].as_str().unwrap_or_default().to_string();
		events.send(ServerEvent::Message(eval)).unwrap();
		for item in &script.items {
			send_message(
				&mut stream,
				&json!({"id": id, "type": "Item", "payload": {"body": item}}),
			);
		}
		match &script.error_after {
			Some((code, message)) => send_message(
				&mut stream,
				&json!({
					"id": id,
					"type": "Err",
					"payload": {"code": code, "message": message}
				}),
			),
			None => {
				send_message(&mut stream, &json!({"id": id, "type": "End", "payload": {}}))
			}
		}

		wait_for_peer_close(&mut stream);
		events.send(ServerEvent::ConnectionClosed).unwrap();
	});
	(port, receiver)
}

fn handshake(stream: &mut TcpStream) {
	let head = read_http_request(stream);
	assert!(head.starts_with("GET /v1/session HTTP/1.1"));
	let key = head
		.lines()
		.find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
		.unwrap();

	let mut hasher = Sha1::new();
	hasher.update(key.as_bytes());
	hasher.update(b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11");
	let response = format!(
		"HTTP/1.1 101 Switching Protocols\r\n\
		 Upgrade: websocket\r\n\
		 Connection: Upgrade\r\n\
		 Sec-WebSocket-Accept: {}\r\n\
		 \r\n",
		b64(hasher.finalize())
	);
	stream.write_all(response.as_bytes()).unwrap();
}

/// Read masked client frames until a text message arrives. A close frame or
/// EOF ends the session thread.
fn read_client_message(stream: &mut TcpStream) -> Value {
	loop {
		let mut head = [0u8; 2];
		stream.read_exact(&mut head).unwrap();
		let opcode = head[0] & 0x0F;
		let masked = head[1] & 0x80 != 0;
		let len = match head[1] & 0x7F {
			126 => {
				let mut ext = [0u8; 2];
				stream.read_exact(&mut ext).unwrap();
				u16::from_be_bytes(ext) as usize
			}
			127 => {
				let mut ext = [0u8; 8];
				stream.read_exact(&mut ext).unwrap();
				u64::from_be_bytes(ext) as usize
			}
			len => len as usize,
		};
		let mut key = [0u8; 4];
		if masked {
			stream.read_exact(&mut key).unwrap();
		}
		let mut payload = vec![0u8; len];
		stream.read_exact(&mut payload).unwrap();
		if masked {
			for (i, byte) in payload.iter_mut().enumerate() {
				*byte ^= key[i % 4];
			}
		}
		match opcode {
			0x1 => return serde_json::from_slice(&payload).unwrap(),
			0x8 => panic!("session closed before the expected message"),
			_ => {}
		}
	}
}

fn send_message(stream: &mut TcpStream, message: &Value) {
	let payload = serde_json::to_vec(message).unwrap();
	let mut frame = vec![0x80 | 0x1];
	match payload.len() {
		len if len < 126 => frame.push(len as u8),
		len if len < 65536 => {
			frame.push(126);
			frame.extend_from_slice(&(len as u16).to_be_bytes());
		}
		len => {
			frame.push(127);
			frame.extend_from_slice(&(len as u64).to_be_bytes());
		}
	}
	frame.extend_from_slice(&payload);
	stream.write_all(&frame).unwrap();
	stream.flush().unwrap();
}

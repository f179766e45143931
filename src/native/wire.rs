// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

//! Frame codec and handshake primitives for the native session protocol.
//!
//! The protocol runs over a WebSocket-style framed connection: the client
//! masks its frames, the server does not. Only final frames are produced by
//! the server's session endpoint; fragmentation is not part of the protocol.

use std::io::{self, Read};

use sha1::{Digest, Sha1};

pub(crate) const OP_TEXT: u8 = 0x1;
pub(crate) const OP_BINARY: u8 = 0x2;
pub(crate) const OP_CLOSE: u8 = 0x8;
pub(crate) const OP_PING: u8 = 0x9;
pub(crate) const OP_PONG: u8 = 0xA;

const ACCEPT_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Random nonce for the `Sec-WebSocket-Key` handshake header.
pub(crate) fn nonce_key() -> String {
	let nonce: [u8; 16] = rand::random();
	base64::encode(nonce)
}

/// The `Sec-WebSocket-Accept` value the server must answer with.
pub(crate) fn accept_key(key: &str) -> String {
	let mut hasher = Sha1::new();
	hasher.update(key.as_bytes());
	hasher.update(ACCEPT_MAGIC.as_bytes());
	base64::encode(hasher.finalize())
}

/// Encode one final frame. Client frames set `mask`.
pub(crate) fn encode_frame(opcode: u8, payload: &[u8], mask: bool) -> Vec<u8> {
	let mut frame = Vec::with_capacity(payload.len() + 14);
	frame.push(0x80 | opcode);

	let mask_bit = if mask {
		0x80
	} else {
		0x00
	};
	match payload.len() {
		len if len < 126 => frame.push(mask_bit | len as u8),
		len if len < 65536 => {
			frame.push(mask_bit | 126);
			frame.extend_from_slice(&(len as u16).to_be_bytes());
		}
		len => {
			frame.push(mask_bit | 127);
			frame.extend_from_slice(&(len as u64).to_be_bytes());
		}
	}

	if mask {
		let key: [u8; 4] = rand::random();
		frame.extend_from_slice(&key);
		frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
	} else {
		frame.extend_from_slice(payload);
	}
	frame
}

/// Block until one complete frame is read, returning `(opcode, payload)`.
pub(crate) fn read_frame(reader: &mut impl Read) -> io::Result<(u8, Vec<u8>)> {
	let mut head = [0u8; 2];
	reader.read_exact(&mut head)?;
	let opcode = head[0] & 0x0F;
	let masked = head[1] & 0x80 != 0;

	let len = match head[1] & 0x7F {
		126 => {
			let mut ext = [0u8; 2];
			reader.read_exact(&mut ext)?;
			u16::from_be_bytes(ext) as usize
		}
		127 => {
			let mut ext = [0u8; 8];
			reader.read_exact(&mut ext)?;
			u64::from_be_bytes(ext) as usize
		}
		len => len as usize,
	};

	let key = if masked {
		let mut key = [0u8; 4];
		reader.read_exact(&mut key)?;
		Some(key)
	} else {
		None
	};

	let mut payload = vec![0u8; len];
	reader.read_exact(&mut payload)?;
	if let Some(key) = key {
		for (i, byte) in payload.iter_mut().enumerate() {
			*byte ^= key[i % 4];
		}
	}
	Ok((opcode, payload))
}

/// Read an HTTP message head byte-wise, up to and including the blank line.
pub(crate) fn read_http_head(reader: &mut impl Read) -> io::Result<Vec<u8>> {
	let mut head = Vec::with_capacity(256);
	let mut byte = [0u8; 1];
	loop {
		reader.read_exact(&mut byte)?;
		head.push(byte[0]);
		if head.ends_with(b"\r\n\r\n") {
			return Ok(head);
		}
		if head.len() > 16 * 1024 {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				"handshake response head too large",
			));
		}
	}
}

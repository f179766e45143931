// SPDX-License-Identifier: MIT
// Copyright (c) 2026 xqeval

use std::{
	io::{Read, Write},
	net::TcpStream,
};

use tracing::debug;

use crate::{
	config::{AuthScheme, Configuration, QueryReference},
	diagnostic::{decode, transport},
	error::Error,
	rest::multipart::MultipartStream,
};

/// One REST evaluation session: a single connection carrying a single
/// request/response exchange. Digest authentication opens one extra
/// connection for the challenge round trip.
pub struct RestSession {
	stream: TcpStream,
}

impl RestSession {
	pub fn connect(config: &Configuration) -> Result<Self, Error> {
		let stream = TcpStream::connect((config.host.as_str(), config.port))
			.map_err(|e| {
				Error(transport::connection_failed(&config.host, config.port, e))
			})?;
		debug!(host = %config.host, port = config.port, "rest session connected");
		Ok(Self {
			stream,
		})
	}

	/// Submit the evaluation request and parse the `multipart/mixed`
	/// response into a raw item stream owning this connection.
	pub fn submit(self, config: &Configuration) -> Result<MultipartStream, Error> {
		let (path, body) = encode_request(config);
		let authorization = match config.auth {
			AuthScheme::Basic => Some(basic_authorization(config)),
			AuthScheme::Digest => None,
		};

		let mut stream = self.stream;
		let mut response =
			exchange(&mut stream, config, &path, &body, authorization.as_deref())?;

		if response.status == 401 && config.auth == AuthScheme::Digest {
			// The server closed the challenged connection; the
			// authorized retry needs a fresh one.
			let challenge = response
				.header("www-authenticate")
				.ok_or_else(|| {
					Error(transport::authentication_failed(
						&config.user,
						"401 without a WWW-Authenticate challenge",
					))
				})
				.and_then(|header| {
					parse_digest_challenge(header).map_err(|e| {
						Error(transport::authentication_failed(&config.user, e))
					})
				})?;
			let cnonce = format!("{:08x}", rand::random::<u32>());
			let authorization = digest_authorization(
				&config.user,
				&config.password,
				"POST",
				&path,
				&challenge,
				&cnonce,
				1,
			);
			stream = TcpStream::connect((config.host.as_str(), config.port))
				.map_err(|e| {
					Error(transport::connection_failed(
						&config.host,
						config.port,
						e,
					))
				})?;
			response = exchange(&mut stream, config, &path, &body, Some(&authorization))?;
		}

		match response.status {
			200..=299 => {}
			401 => {
				return Err(Error(transport::authentication_failed(
					&config.user,
					format!("401 {}", response.reason),
				)));
			}
			403 => {
				return Err(Error(transport::permission_denied(format!(
					"403 {}",
					response.reason
				))));
			}
			status => {
				return Err(Error(transport::unexpected_status(
					status,
					&response.reason,
				)));
			}
		}

		let content_type = response.header("content-type").unwrap_or_default();
		let boundary = multipart_boundary(content_type).ok_or_else(|| {
			Error(decode::malformed_response(format!(
				"expected multipart/mixed, got '{}'",
				content_type
			)))
		})?;
		let boundary = boundary.to_string();
		MultipartStream::new(Some(stream), response.body, &boundary)
	}
}

/// Endpoint path (with the database scope as a query parameter) and the
/// form-urlencoded body for the configured query reference.
fn encode_request(config: &Configuration) -> (String, String) {
	let (endpoint, field, text) = match &config.query {
		QueryReference::InlineScript(text) => ("/v1/eval", "xquery", text),
		QueryReference::ModulePath(path) => ("/v1/invoke", "module", path),
	};
	let path = match &config.database {
		Some(database) => {
			format!("{}?database={}", endpoint, urlencoding::encode(database))
		}
		None => endpoint.to_string(),
	};
	let body = format!("{}={}", field, urlencoding::encode(text));
	(path, body)
}

fn basic_authorization(config: &Configuration) -> String {
	let credentials = format!("{}:{}", config.user, config.password);
	format!("Basic {}", base64::encode(credentials))
}

/// One blocking request/response exchange on `stream`. The request asks the
/// server to close the connection, so the response is read to EOF.
fn exchange(
	stream: &mut TcpStream,
	config: &Configuration,
	path: &str,
	body: &str,
	authorization: Option<&str>,
) -> Result<HttpResponse, Error> {
	let mut request = format!(
		"POST {} HTTP/1.1\r\n\
		 Host: {}:{}\r\n\
		 Content-Type: application/x-www-form-urlencoded\r\n\
		 Accept: multipart/mixed\r\n\
		 Content-Length: {}\r\n\
		 Connection: close\r\n",
		path,
		config.host,
		config.port,
		body.len()
	);
	if let Some(authorization) = authorization {
		request.push_str("Authorization: ");
		request.push_str(authorization);
		request.push_str("\r\n");
	}
	request.push_str("\r\n");
	request.push_str(body);

	stream.write_all(request.as_bytes())
		.and_then(|_| stream.flush())
		.map_err(|e| Error(transport::io_failed("sending the eval request", e)))?;

	let mut raw = Vec::new();
	stream.read_to_end(&mut raw)
		.map_err(|e| Error(transport::io_failed("reading the eval response", e)))?;
	parse_response(&raw)
}

#[derive(Debug)]
pub(crate) struct HttpResponse {
	pub status: u16,
	pub reason: String,
	headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl HttpResponse {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}
}

pub(crate) fn parse_response(raw: &[u8]) -> Result<HttpResponse, Error> {
	let mut header_buf = [httparse::EMPTY_HEADER; 32];
	let mut parsed = httparse::Response::new(&mut header_buf);
	let head_len = match parsed.parse(raw) {
		Ok(httparse::Status::Complete(len)) => len,
		Ok(httparse::Status::Partial) => {
			return Err(Error(decode::malformed_response("truncated response head")));
		}
		Err(e) => return Err(Error(decode::malformed_response(e))),
	};

	let status = parsed.code.unwrap_or(0);
	let reason = parsed.reason.unwrap_or_default().to_string();
	let headers: Vec<(String, String)> = parsed
		.headers
		.iter()
		.map(|h| {
			(
				h.name.to_string(),
				String::from_utf8_lossy(h.value).into_owned(),
			)
		})
		.collect();

	let response = HttpResponse {
		status,
		reason,
		headers,
		body: Vec::new(),
	};

	let tail = &raw[head_len..];
	let body = if response
		.header("transfer-encoding")
		.is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
	{
		decode_chunked(tail)?
	} else if let Some(length) = response.header("content-length") {
		let length: usize = length.parse().map_err(|_| {
			Error(decode::malformed_response("invalid Content-Length"))
		})?;
		if tail.len() < length {
			return Err(Error(decode::malformed_response("truncated response body")));
		}
		tail[..length].to_vec()
	} else {
		tail.to_vec()
	};

	Ok(HttpResponse {
		body,
		..response
	})
}

fn decode_chunked(mut tail: &[u8]) -> Result<Vec<u8>, Error> {
	let mut body = Vec::new();
	loop {
		let line_end = find(tail, b"\r\n")
			.ok_or_else(|| Error(decode::malformed_response("truncated chunk size")))?;
		let size_text = std::str::from_utf8(&tail[..line_end])
			.map_err(|e| Error(decode::malformed_response(e)))?;
		let size_text = size_text.split(';').next().unwrap_or_default().trim();
		let size = usize::from_str_radix(size_text, 16)
			.map_err(|_| Error(decode::malformed_response("invalid chunk size")))?;
		tail = &tail[line_end + 2..];
		if size == 0 {
			return Ok(body);
		}
		let with_terminator = size
			.checked_add(2)
			.ok_or_else(|| Error(decode::malformed_response("invalid chunk size")))?;
		if tail.len() < with_terminator {
			return Err(Error(decode::malformed_response("truncated chunk")));
		}
		body.extend_from_slice(&tail[..size]);
		tail = &tail[size + 2..];
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|window| window == needle)
}

/// The `boundary` parameter of a `multipart/mixed` content type.
fn multipart_boundary(content_type: &str) -> Option<&str> {
	let mut parts = content_type.split(';');
	let media_type = parts.next().unwrap_or_default().trim();
	if !media_type.eq_ignore_ascii_case("multipart/mixed") {
		return None;
	}
	parts.map(str::trim).find_map(|part| {
		let value = part.strip_prefix("boundary=")?;
		Some(value.trim_matches('"'))
	})
}

pub(crate) struct DigestChallenge {
	realm: String,
	nonce: String,
	qop: Option<String>,
	opaque: Option<String>,
}

/// Parse a `WWW-Authenticate: Digest ...` challenge header.
pub(crate) fn parse_digest_challenge(header: &str) -> Result<DigestChallenge, String> {
	let params = header
		.trim()
		.strip_prefix("Digest ")
		.ok_or_else(|| format!("not a digest challenge: '{}'", header))?;

	let mut realm = None;
	let mut nonce = None;
	let mut qop = None;
	let mut opaque = None;
	for (key, value) in parse_auth_params(params) {
		match key.as_str() {
			"realm" => realm = Some(value),
			"nonce" => nonce = Some(value),
			"qop" => qop = Some(value),
			"opaque" => opaque = Some(value),
			_ => {}
		}
	}
	Ok(DigestChallenge {
		realm: realm.ok_or("challenge without realm")?,
		nonce: nonce.ok_or("challenge without nonce")?,
		qop,
		opaque,
	})
}

/// Comma-separated `key=value` pairs, values optionally quoted.
fn parse_auth_params(input: &str) -> Vec<(String, String)> {
	let mut params = Vec::new();
	let mut rest = input;
	while let Some(eq) = rest.find('=') {
		let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
		rest = &rest[eq + 1..];
		let value = if let Some(tail) = rest.strip_prefix('"') {
			match tail.find('"') {
				Some(end) => {
					rest = &tail[end + 1..];
					tail[..end].to_string()
				}
				None => {
					rest = "";
					tail.to_string()
				}
			}
		} else {
			let end = rest.find(',').unwrap_or(rest.len());
			let value = rest[..end].trim().to_string();
			rest = &rest[end..];
			value
		};
		params.push((key, value));
	}
	params
}

fn md5_hex(input: &str) -> String {
	format!("{:x}", md5::compute(input))
}

/// RFC 2617 digest response for the authorized retry.
pub(crate) fn digest_authorization(
	user: &str,
	password: &str,
	method: &str,
	uri: &str,
	challenge: &DigestChallenge,
	cnonce: &str,
	nc: u32,
) -> String {
	let ha1 = md5_hex(&format!("{}:{}:{}", user, challenge.realm, password));
	let ha2 = md5_hex(&format!("{}:{}", method, uri));

	let qop_auth = challenge
		.qop
		.as_deref()
		.is_some_and(|qop| qop.split(',').any(|q| q.trim() == "auth"));
	let response = if qop_auth {
		md5_hex(&format!(
			"{}:{}:{:08x}:{}:auth:{}",
			ha1, challenge.nonce, nc, cnonce, ha2
		))
	} else {
		md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2))
	};

	let mut header = format!(
		"Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
		user, challenge.realm, challenge.nonce, uri, response
	);
	if qop_auth {
		header.push_str(&format!(", qop=auth, nc={:08x}, cnonce=\"{}\"", nc, cnonce));
	}
	if let Some(opaque) = &challenge.opaque {
		header.push_str(&format!(", opaque=\"{}\"", opaque));
	}
	header
}

//! Minimal request-line/header parsing via `httparse`.

// self
use crate::_prelude::*;

/// A parsed request reduced to what the cache server needs: the path and
/// whether the connection should be kept open afterwards.
pub struct ParsedRequest {
	pub path: String,
	pub keep_alive: bool,
}
impl ParsedRequest {
	/// The cache key derived from the request path: the leading `/` is
	/// stripped, and a bare `/` maps to `index.html`.
	pub fn filename(&self) -> &str {
		match self.path.trim_start_matches('/') {
			"" => "index.html",
			rest => rest,
		}
	}
}

/// Read one HTTP/1.1 request from `socket`. Returns `Ok(None)` when the peer
/// closed the connection before sending any bytes (the normal end of a
/// keep-alive loop).
pub async fn read_request(socket: &mut tokio::net::TcpStream, max_bytes: usize) -> Result<Option<ParsedRequest>> {
	use tokio::io::AsyncReadExt;

	let mut buf = Vec::with_capacity(1024);
	let mut chunk = [0u8; 1024];

	loop {
		let mut headers = [httparse::EMPTY_HEADER; 32];
		let mut parsed = httparse::Request::new(&mut headers);

		match parsed.parse(&buf) {
			Ok(httparse::Status::Complete(_)) => return Ok(Some(finish(&parsed)?)),
			Ok(httparse::Status::Partial) => {},
			Err(err) => return Err(Error::Config { field: "request", reason: err.to_string() }),
		}

		if buf.len() >= max_bytes {
			return Err(Error::Config { field: "request", reason: "request header too large".into() });
		}

		let n = socket.read(&mut chunk).await?;
		if n == 0 {
			return if buf.is_empty() { Ok(None) } else { Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()) };
		}
		buf.extend_from_slice(&chunk[..n]);
	}
}

fn finish(request: &httparse::Request<'_, '_>) -> Result<ParsedRequest> {
	let path = request.path.ok_or_else(|| Error::Config { field: "request", reason: "missing request path".into() })?;

	if path.split('/').any(|segment| segment == "..") {
		return Err(Error::Config { field: "request", reason: "path traversal rejected".into() });
	}

	let keep_alive = request
		.headers
		.iter()
		.find(|header| header.name.eq_ignore_ascii_case("connection"))
		.map(|header| !String::from_utf8_lossy(header.value).eq_ignore_ascii_case("close"))
		.unwrap_or(true);

	Ok(ParsedRequest { path: path.to_string(), keep_alive })
}

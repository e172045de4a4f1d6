//! HTTP/1.1 response writing: status line, headers, and body.

// self
use crate::_prelude::*;

/// Write a response body already held in memory (the cache-hit path).
pub async fn write_bytes(socket: &mut tokio::net::TcpStream, path: &str, size: u64, mtime: SystemTime, bytes: &[u8], keep_alive: bool) -> Result<()> {
	use tokio::io::AsyncWriteExt;

	let head = response_head(http::StatusCode::OK, path, size, mtime, keep_alive);
	socket.write_all(head.as_bytes()).await?;
	socket.write_all(bytes).await?;

	Ok(())
}

/// Write a response body streamed directly from an open file (the
/// fall-through path: too large to cache, or the cache table was full).
pub async fn write_stream(
	socket: &mut tokio::net::TcpStream,
	path: &str,
	size: u64,
	mtime: SystemTime,
	mut file: tokio::fs::File,
	keep_alive: bool,
) -> Result<()> {
	use tokio::io::AsyncWriteExt;

	let head = response_head(http::StatusCode::OK, path, size, mtime, keep_alive);
	socket.write_all(head.as_bytes()).await?;
	tokio::io::copy(&mut file, socket).await?;

	Ok(())
}

/// Write a bare status response with no body (errors).
pub async fn write_status(socket: &mut tokio::net::TcpStream, status: http::StatusCode, keep_alive: bool) -> Result<()> {
	use tokio::io::AsyncWriteExt;

	let connection = if keep_alive { "keep-alive" } else { "close" };
	let reason = status.canonical_reason().unwrap_or("");
	let head = format!("HTTP/1.1 {} {reason}\r\nContent-Length: 0\r\nConnection: {connection}\r\n\r\n", status.as_u16());
	socket.write_all(head.as_bytes()).await?;

	Ok(())
}

fn response_head(status: http::StatusCode, path: &str, size: u64, mtime: SystemTime, keep_alive: bool) -> String {
	let content_type = mime_guess::from_path(path).first_or_octet_stream();
	let connection = if keep_alive { "keep-alive" } else { "close" };
	let reason = status.canonical_reason().unwrap_or("");

	format!(
		"HTTP/1.1 {} {reason}\r\nContent-Length: {size}\r\nContent-Type: {content_type}\r\nLast-Modified: {}\r\nConnection: {connection}\r\n\r\n",
		status.as_u16(),
		httpdate::fmt_http_date(mtime),
	)
}

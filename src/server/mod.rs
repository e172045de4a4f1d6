//! Thin HTTP/1.1 glue around [`FileCache`](crate::FileCache): request-line
//! parsing, MIME lookup, and response writing.
//!
//! This is deliberately not where the interesting logic lives — the cache
//! core treats the HTTP parser, accept loop, worker pool, and MIME table as
//! fixed external collaborators with a known contract, and this module is
//! exactly that contract, built from ordinary crates rather than hand-rolled
//! so it doesn't compete with the cache core for attention.

mod request;
mod response;

// self
use crate::{_prelude::*, cache::CacheOutcome, FileCache};

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_HEADER_BYTES: usize = 8 * 1024;

/// Accept connections on `addr` and serve them from `cache`, one task per
/// connection rather than a fixed-size worker pool: blocking I/O is already
/// off the hot path via `spawn_blocking`, so a pool-per-connection is no
/// longer needed to keep the accept loop responsive.
pub async fn run(addr: impl tokio::net::ToSocketAddrs, cache: FileCache) -> Result<()> {
	let listener = tokio::net::TcpListener::bind(addr).await?;
	tracing::info!(local_addr = ?listener.local_addr().ok(), "file cache server listening");

	loop {
		let (socket, peer_addr) = listener.accept().await?;
		let cache = cache.clone();

		tokio::spawn(async move {
			if let Err(err) = serve_connection(socket, &cache).await {
				tracing::debug!(%peer_addr, error = %err, "connection ended with an error");
			}
		});
	}
}

/// Serve one connection to completion: read requests until the peer closes
/// the connection, drops a keep-alive request, or goes idle past
/// `IDLE_TIMEOUT`. Exposed directly (rather than only through [`run`]) so a
/// caller can drive a connection against a listener it bound itself, which
/// is how the end-to-end tests pick an ephemeral port.
pub async fn serve_connection(mut socket: tokio::net::TcpStream, cache: &FileCache) -> Result<()> {
	loop {
		let request = match tokio::time::timeout(IDLE_TIMEOUT, request::read_request(&mut socket, MAX_REQUEST_HEADER_BYTES)).await {
			Ok(Ok(Some(request))) => request,
			Ok(Ok(None)) => return Ok(()),
			Ok(Err(err)) => {
				tracing::debug!(error = %err, "malformed request");
				response::write_status(&mut socket, http::StatusCode::BAD_REQUEST, false).await?;
				return Ok(());
			},
			Err(_) => {
				tracing::debug!("connection idle timeout");
				return Ok(());
			},
		};

		let keep_alive = request.keep_alive;
		let outcome = cache.get(request.filename()).await;

		match outcome {
			Ok(CacheOutcome::Hit { bytes, size, mtime, pin }) => {
				response::write_bytes(&mut socket, &request.path, size, mtime, &bytes, keep_alive).await?;
				drop(pin);
			},
			Ok(CacheOutcome::Stream { file, size, mtime }) => {
				response::write_stream(&mut socket, &request.path, size, mtime, file, keep_alive).await?;
			},
			Err(Error::NotFound(_)) => {
				tracing::debug!(path = %request.path, "not found");
				response::write_status(&mut socket, http::StatusCode::NOT_FOUND, keep_alive).await?;
			},
			Err(Error::EmptyFilename | Error::FilenameTooLong(..)) => {
				tracing::debug!(path = %request.path, "rejected filename");
				response::write_status(&mut socket, http::StatusCode::BAD_REQUEST, keep_alive).await?;
			},
			Err(err) => {
				tracing::warn!(path = %request.path, error = %err, "request failed");
				response::write_status(&mut socket, http::StatusCode::INTERNAL_SERVER_ERROR, keep_alive).await?;
			},
		}

		if !keep_alive {
			return Ok(());
		}
	}
}

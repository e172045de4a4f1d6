//! End-to-end coverage over a real TCP connection: bind the server to an
//! ephemeral port, drive it with hand-written HTTP/1.1 requests, and check
//! the bytes that come back.

use std::time::Duration;

use filecache::{CacheConfig, FileCache};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
};

async fn start_server(root: &std::path::Path) -> std::net::SocketAddr {
	let config = CacheConfig::new(root.canonicalize().unwrap());
	let (cache, _refresh) = FileCache::spawn(config).unwrap();

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		loop {
			let (socket, _) = listener.accept().await.unwrap();
			let cache = cache.clone();
			tokio::spawn(async move {
				let _ = filecache::server::serve_connection(socket, &cache).await;
			});
		}
	});

	addr
}

async fn send_request(addr: std::net::SocketAddr, request: &str) -> String {
	let mut socket = TcpStream::connect(addr).await.unwrap();
	socket.write_all(request.as_bytes()).await.unwrap();
	socket.shutdown().await.ok();

	let mut response = Vec::new();
	let _ = tokio::time::timeout(Duration::from_secs(2), socket.read_to_end(&mut response)).await;

	String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn serves_a_cached_file_over_http() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("hello.txt"), b"hello, world").unwrap();
	let addr = start_server(dir.path()).await;

	let response = send_request(addr, "GET /hello.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

	assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
	assert!(response.contains("Content-Length: 12"), "{response}");
	assert!(response.ends_with("hello, world"), "{response}");
}

#[tokio::test]
async fn missing_file_returns_404() {
	let dir = tempfile::tempdir().unwrap();
	let addr = start_server(dir.path()).await;

	let response = send_request(addr, "GET /nope.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

	assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
}

#[tokio::test]
async fn path_traversal_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let addr = start_server(dir.path()).await;

	let response = send_request(addr, "GET /../secrets.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

	assert!(response.starts_with("HTTP/1.1 400 Bad Request"), "{response}");
}

#[tokio::test]
async fn bare_slash_serves_index() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
	let addr = start_server(dir.path()).await;

	let response = send_request(addr, "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

	assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
	assert!(response.ends_with("<html></html>"), "{response}");
}

#[tokio::test]
async fn oversized_file_streams_instead_of_caching() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("big.bin"), vec![7u8; filecache::config::BUFFER_SIZE + 4096]).unwrap();
	let addr = start_server(dir.path()).await;

	let response = send_request(addr, "GET /big.bin HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

	assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
	assert!(response.contains(&format!("Content-Length: {}", filecache::config::BUFFER_SIZE + 4096)), "{response}");
}

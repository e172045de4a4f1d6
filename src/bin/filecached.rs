//! Standalone server binary: wires a [`FileCache`] to the HTTP glue in
//! [`filecache::server`] and the refresh controller spawned alongside it.
//!
//! Configuration is read from the environment rather than flags, since the
//! only required input is a root directory and a bind address.

use std::path::PathBuf;

use filecache::{CacheConfig, FileCache};

const ENV_ROOT: &str = "FILECACHE_ROOT";
const ENV_BIND: &str = "FILECACHE_BIND";
const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

	let root = std::env::var(ENV_ROOT).map(PathBuf::from).unwrap_or_else(|_| std::env::current_dir().expect("current directory"));
	let bind = std::env::var(ENV_BIND).unwrap_or_else(|_| DEFAULT_BIND.to_string());

	let config = CacheConfig::new(root.canonicalize()?);
	let (cache, _refresh) = FileCache::spawn(config)?;

	#[cfg(feature = "prometheus")]
	filecache::install_default_exporter()?;

	filecache::server::run(bind, cache).await?;

	Ok(())
}

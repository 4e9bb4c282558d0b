//! Run configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (~/.confsync/config.toml)
//! 3. Environment variables (CONFLUENCE_* prefix)
//! 4. CLI flags (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{env, fs};

use crate::error::SyncError;

/// Placeholder endpoint shipped in documentation; never a valid target
pub const DEFAULT_ENDPOINT: &str = "https://mydomain.atlassian.net/wiki";

/// Default number of concurrent upload workers
pub const DEFAULT_PARALLELISM: usize = 5;

/// Coordinator poll interval between dependency-readiness rounds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Unified configuration for one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Remote endpoint, e.g. https://company.atlassian.net/wiki
	pub endpoint: String,

	/// Space (container) key that receives the documents
	pub space: String,

	/// Username for basic auth
	pub username: String,

	/// Password or API token for basic auth
	pub password: String,

	/// Bearer token, used instead of basic auth when set
	pub access_token: String,

	/// Remote ID of an existing page to nest everything under
	pub parent: String,

	/// Explicit title override (single-file invocations only)
	pub title: String,

	/// Use the first level-1 heading as the title when available
	pub use_document_title: bool,

	/// Render newlines as hard breaks
	pub hard_wraps: bool,

	/// Upload regardless of whether content changed locally
	pub force: bool,

	/// Regular expressions excluding matching paths from the scan
	pub exclude_patterns: Vec<String>,

	/// Only include files modified within the last N minutes (0 = all)
	pub since_minutes: u64,

	/// Path of the embedded state database
	pub local_store: PathBuf,

	/// Number of concurrent upload workers
	pub parallelism: usize,

	/// Milliseconds between scheduler readiness rounds
	pub poll_interval_ms: u64,

	/// Plan only, mutate nothing remote
	pub dry_run: bool,

	/// Roots (directories or single files) to sync
	pub roots: Vec<String>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			endpoint: String::new(),
			space: String::new(),
			username: String::new(),
			password: String::new(),
			access_token: String::new(),
			parent: String::new(),
			title: String::new(),
			use_document_title: false,
			hard_wraps: false,
			force: false,
			exclude_patterns: Vec::new(),
			since_minutes: 0,
			local_store: PathBuf::from("confsync.db"),
			parallelism: DEFAULT_PARALLELISM,
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			dry_run: false,
			roots: Vec::new(),
		}
	}
}

impl Config {
	/// Defaults merged with the config file (when present) and environment
	pub fn load() -> Self {
		let mut config = Self::load_file().unwrap_or_default();
		config.source_environment();
		config
	}

	fn load_file() -> Option<Self> {
		let home = env::var("HOME").ok()?;
		let path = PathBuf::from(home).join(".confsync").join("config.toml");
		let text = fs::read_to_string(path).ok()?;
		match toml::from_str(&text) {
			Ok(config) => Some(config),
			Err(err) => {
				eprintln!("Ignoring malformed config file: {}", err);
				None
			}
		}
	}

	/// Override credentials/endpoint from CONFLUENCE_* environment variables
	pub fn source_environment(&mut self) {
		if let Ok(s) = env::var("CONFLUENCE_ENDPOINT") {
			if !s.is_empty() {
				self.endpoint = s;
			}
		}
		if let Ok(s) = env::var("CONFLUENCE_SPACE") {
			if !s.is_empty() {
				self.space = s;
			}
		}
		if let Ok(s) = env::var("CONFLUENCE_USERNAME") {
			if !s.is_empty() {
				self.username = s;
			}
		}
		if let Ok(s) = env::var("CONFLUENCE_PASSWORD") {
			if !s.is_empty() {
				self.password = s;
			}
		}
		if let Ok(s) = env::var("CONFLUENCE_ACCESS_TOKEN") {
			if !s.is_empty() {
				self.access_token = s;
			}
		}
	}

	/// Validate required settings. Configuration errors are fatal before
	/// any work begins.
	pub fn validate(&self) -> Result<(), SyncError> {
		let fail = |message: &str| {
			Err(SyncError::InvalidConfig { message: message.to_string() })
		};

		if self.space.is_empty() {
			return fail("--space is not defined");
		}
		if self.endpoint.is_empty() || self.endpoint == DEFAULT_ENDPOINT {
			return fail("--endpoint is not defined");
		}
		if self.access_token.is_empty() {
			if self.username.is_empty() {
				return fail("--username is not defined");
			}
			if self.password.is_empty() {
				return fail("--password is not defined");
			}
		}
		if self.roots.is_empty() {
			return fail("please pass a markdown file or directory of markdown files");
		}
		if !self.title.is_empty() {
			// A fixed title for a whole tree would upload everything under one name
			if self.roots.len() > 1 || self.roots.iter().any(|r| PathBuf::from(r).is_dir()) {
				return fail("--title is only supported for a single file");
			}
		}
		if self.parallelism == 0 {
			return fail("--parallelism must be at least 1");
		}
		Ok(())
	}
}


// vim: ts=4

//! Error types for sync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Invalid or incomplete configuration (fatal before any work)
	InvalidConfig { message: String },

	/// Discovery failure (unreadable root, walk error) - fatal for the run
	Discovery { root: String, source: Box<dyn Error + Send + Sync> },

	/// State store failure - fatal, losing ID->remote mapping breaks idempotence
	Store(StoreError),

	/// Remote gateway failure that is structural (e.g. container resolution)
	Gateway(GatewayError),

	/// Rendering failure
	Render(RenderError),

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Discovery { root, source } => {
				write!(f, "Failed to scan {}: {}", root, source)
			}
			SyncError::Store(e) => write!(f, "State store error: {}", e),
			SyncError::Gateway(e) => write!(f, "Gateway error: {}", e),
			SyncError::Render(e) => write!(f, "Render error: {}", e),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<StoreError> for SyncError {
	fn from(e: StoreError) -> Self {
		SyncError::Store(e)
	}
}

impl From<GatewayError> for SyncError {
	fn from(e: GatewayError) -> Self {
		SyncError::Gateway(e)
	}
}

impl From<RenderError> for SyncError {
	fn from(e: RenderError) -> Self {
		SyncError::Render(e)
	}
}

/// State store errors
#[derive(Debug)]
pub enum StoreError {
	/// Failed to open the database
	OpenFailed { path: String, source: Box<dyn Error + Send + Sync> },

	/// Read transaction failed
	ReadFailed { source: Box<dyn Error + Send + Sync> },

	/// Write transaction failed
	WriteFailed { source: Box<dyn Error + Send + Sync> },

	/// A stored record could not be decoded
	Corrupted { id: String, message: String },
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::OpenFailed { path, source } => {
				write!(f, "Failed to open state store {}: {}", path, source)
			}
			StoreError::ReadFailed { source } => write!(f, "Failed to read state: {}", source),
			StoreError::WriteFailed { source } => write!(f, "Failed to write state: {}", source),
			StoreError::Corrupted { id, message } => {
				write!(f, "Stored record {} is corrupted: {}", id, message)
			}
		}
	}
}

impl Error for StoreError {}

/// Remote gateway errors, classified by HTTP status semantics
#[derive(Debug)]
pub enum GatewayError {
	/// 400 - the request was rejected as malformed
	BadRequest { message: String },

	/// 401/403 - credentials missing or rejected
	Unauthorized { message: String },

	/// 404 - the remote document or container does not exist
	NotFound { message: String },

	/// 413 - the document body or attachment exceeds the remote limit
	PayloadTooLarge { message: String },

	/// Any other non-success status
	Api { status: u16, message: String },

	/// Transport-level failure (connect, TLS, timeout)
	Transport { message: String },

	/// The response body could not be decoded
	InvalidResponse { message: String },
}

impl GatewayError {
	/// Classify a non-success HTTP status with its response body
	pub fn from_status(status: u16, message: String) -> Self {
		match status {
			400 => GatewayError::BadRequest { message },
			401 | 403 => GatewayError::Unauthorized { message },
			404 => GatewayError::NotFound { message },
			413 => GatewayError::PayloadTooLarge { message },
			_ => GatewayError::Api { status, message },
		}
	}
}

impl fmt::Display for GatewayError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GatewayError::BadRequest { message } => write!(f, "Bad request: {}", message),
			GatewayError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			GatewayError::NotFound { message } => write!(f, "Not found: {}", message),
			GatewayError::PayloadTooLarge { message } => {
				write!(f, "Payload too large: {}", message)
			}
			GatewayError::Api { status, message } => {
				write!(f, "Remote API error ({}): {}", status, message)
			}
			GatewayError::Transport { message } => write!(f, "Transport error: {}", message),
			GatewayError::InvalidResponse { message } => {
				write!(f, "Invalid response: {}", message)
			}
		}
	}
}

impl Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
	fn from(e: reqwest::Error) -> Self {
		GatewayError::Transport { message: e.to_string() }
	}
}

/// Rendering errors
#[derive(Debug)]
pub enum RenderError {
	/// Source file could not be read
	ReadFailed { path: String, source: io::Error },
}

impl fmt::Display for RenderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RenderError::ReadFailed { path, source } => {
				write!(f, "Could not read {}: {}", path, source)
			}
		}
	}
}

impl Error for RenderError {}

// vim: ts=4

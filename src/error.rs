//! Error types for driftsync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for sync operations.
///
/// Unified error type encompassing all sync-related failures. Domain-specific
/// errors (`TransportError`, `ScanError`, ...) are produced deep in the call
/// stack and converted into this type at module boundaries via `From`.
#[derive(Debug)]
pub enum SyncError {
	/// Configuration is invalid or internally inconsistent.
	Config(ConfigError),

	/// Remote transport failed (connection, exec, transfer).
	Transport(TransportError),

	/// A remote scan did not finish within the configured poll timeout.
	ScanTimeout { elapsed_secs: u64 },

	/// The remote side reported an application-level error.
	Remote { message: String },

	/// A local filesystem operation failed.
	Local { path: String, source: io::Error },

	/// The on-disk state or progress file could not be parsed.
	StateCorruption { path: String, message: String },

	/// Lock acquisition failed (another sync session holds the lock).
	LockFailed { message: String },

	/// Operation aborted by cancellation.
	Aborted,

	/// Generic error message, used sparingly for conditions with no richer variant.
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config(e) => write!(f, "configuration error: {}", e),
			SyncError::Transport(e) => write!(f, "transport error: {}", e),
			SyncError::ScanTimeout { elapsed_secs } => {
				write!(f, "remote scan did not complete within {}s", elapsed_secs)
			}
			SyncError::Remote { message } => write!(f, "remote error: {}", message),
			SyncError::Local { path, source } => write!(f, "local error at {}: {}", path, source),
			SyncError::StateCorruption { path, message } => {
				write!(f, "state file {} is corrupted: {}", path, message)
			}
			SyncError::LockFailed { message } => write!(f, "lock failed: {}", message),
			SyncError::Aborted => write!(f, "sync aborted"),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<TransportError> for SyncError {
	fn from(e: TransportError) -> Self {
		SyncError::Transport(e)
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Local { path: String::new(), source: e }
	}
}

/// Configuration validation errors.
#[derive(Debug)]
pub enum ConfigError {
	/// Both push-only and pull-only were requested.
	ConflictingDirection,

	/// A numeric field was outside its valid range.
	OutOfRange { field: &'static str, message: String },

	/// A required path does not exist or is not a directory.
	InvalidPath { field: &'static str, path: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::ConflictingDirection => {
				write!(f, "push_only and pull_only cannot both be set")
			}
			ConfigError::OutOfRange { field, message } => {
				write!(f, "field '{}' out of range: {}", field, message)
			}
			ConfigError::InvalidPath { field, path } => {
				write!(f, "field '{}' is not a valid directory: {}", field, path)
			}
		}
	}
}

impl Error for ConfigError {}

/// Transport-layer errors, distinguishing retryable failures from fatal ones.
#[derive(Debug)]
pub enum TransportError {
	/// Failed to spawn or connect to the remote session.
	ConnectFailed { target: String, source: Box<dyn Error + Send + Sync> },

	/// A remote command failed to execute or exited non-zero unexpectedly.
	ExecFailed { command: String, message: String },

	/// The session disconnected unexpectedly (should trigger reconnect/backoff).
	Disconnected,

	/// Upload/download of a bundle failed part-way through.
	TransferFailed { path: String, message: String },

	/// An I/O error talking to the remote process's stdio.
	Io(io::Error),
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::ConnectFailed { target, source } => {
				write!(f, "failed to connect to {}: {}", target, source)
			}
			TransportError::ExecFailed { command, message } => {
				write!(f, "remote command '{}' failed: {}", command, message)
			}
			TransportError::Disconnected => write!(f, "remote session disconnected"),
			TransportError::TransferFailed { path, message } => {
				write!(f, "transfer of {} failed: {}", path, message)
			}
			TransportError::Io(e) => write!(f, "transport I/O error: {}", e),
		}
	}
}

impl Error for TransportError {}

impl From<io::Error> for TransportError {
	fn from(e: io::Error) -> Self {
		TransportError::Io(e)
	}
}

impl TransportError {
	/// Whether the orchestrator should attempt a reconnect+retry for this error,
	/// as opposed to surfacing it as fatal.
	pub fn is_retryable(&self) -> bool {
		matches!(self, TransportError::Disconnected | TransportError::Io(_))
	}
}

// vim: ts=4

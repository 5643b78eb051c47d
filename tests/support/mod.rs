//! Shared test support: an in-memory-backed `RemoteSession` double.
//!
//! Rather than re-implement the shell protocol the executor/scanner speak,
//! `FakeRemoteSession` runs the exact same commands through a real `sh -c`
//! against a scratch directory standing in for the remote host. This
//! exercises the real shell snippets `scan::scan_remote`, `executor` and
//! `orchestrator` build, the same boundary-faking approach the teacher's own
//! protocol integration tests use against a fake `SyncProtocol`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use driftsync::error::TransportError;
use driftsync::transport::{ExecOutput, RemoteSession};

pub struct FakeRemoteSession {
	/// When set, the next `heartbeat()` call fails once and then clears itself,
	/// simulating a single dropped connection for reconnect-path tests.
	pub fail_next_heartbeat: AtomicBool,
	/// How many times `reconnect()` has been called, so a test can assert a
	/// reconnect actually happened rather than the retried operation just
	/// succeeding on its own.
	pub reconnect_calls: AtomicU32,
}

impl FakeRemoteSession {
	pub fn new() -> Self {
		FakeRemoteSession { fail_next_heartbeat: AtomicBool::new(false), reconnect_calls: AtomicU32::new(0) }
	}
}

impl Default for FakeRemoteSession {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl RemoteSession for FakeRemoteSession {
	async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError> {
		let output =
			tokio::process::Command::new("sh").arg("-c").arg(command).output().await.map_err(TransportError::Io)?;
		Ok(ExecOutput { stdout: output.stdout, stderr: output.stderr, success: output.status.success() })
	}

	async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
		tokio::fs::copy(local_path, remote_path).await.map_err(TransportError::Io)?;
		Ok(())
	}

	async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), TransportError> {
		tokio::fs::copy(remote_path, local_path).await.map_err(TransportError::Io)?;
		Ok(())
	}

	async fn heartbeat(&self) -> Result<(), TransportError> {
		if self.fail_next_heartbeat.swap(false, Ordering::SeqCst) {
			return Err(TransportError::Disconnected);
		}
		Ok(())
	}

	async fn reconnect(&self) -> Result<(), TransportError> {
		self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Build a `SyncConfig` pointed at `local` / `remote`, with fast poll/heartbeat
/// settings suited to tests (no reason to wait multiple seconds per test).
pub fn test_config(local: &Path, remote: &Path) -> driftsync::SyncConfig {
	driftsync::SyncConfig {
		local_root: local.to_path_buf(),
		server: "test-host".to_string(),
		remote_root: remote.display().to_string(),
		poll_interval_secs: 1,
		poll_timeout_secs: 10,
		heartbeat_interval_secs: 3600,
		..driftsync::SyncConfig::default()
	}
}

// vim: ts=4

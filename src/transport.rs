//! Remote session abstraction and a concrete SSH-subprocess implementation.
//!
//! `RemoteSession` is the seam the core synchronization logic is built
//! against; it mirrors the shape of the teacher's own subprocess-based
//! `Node`/`connect` (one child process, piped stdin/stdout, serialized
//! access), generalized to the exec/upload/download/heartbeat operations the
//! decider-independent core actually needs.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::TransportError;

/// Result of executing a remote command: captured stdout/stderr and exit status.
pub struct ExecOutput {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	pub success: bool,
}

/// Abstract remote endpoint. All sync logic depends only on this trait, never
/// on a concrete transport, so tests can substitute an in-memory double.
#[async_trait]
pub trait RemoteSession: Send + Sync {
	/// Run a command on the remote host and collect its output.
	async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError>;

	/// Upload a local file to a path on the remote host.
	async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), TransportError>;

	/// Download a remote file to a local path.
	async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), TransportError>;

	/// Cheap no-op used to detect a dead connection between real operations.
	async fn heartbeat(&self) -> Result<(), TransportError>;

	/// Tear down and re-establish the underlying connection.
	async fn reconnect(&self) -> Result<(), TransportError>;
}

/// Spawns `ssh <host> <command>` per operation, the same subprocess-per-call
/// idiom the teacher's `connection::connect` uses for its long-lived pipe,
/// simplified here to one-shot commands since our protocol has no persistent
/// line protocol to multiplex over a single child.
pub struct SshRemoteSession {
	host: String,
	port: Option<u16>,
	username: Option<String>,
	command_timeout: Duration,
	inflight: Mutex<()>,
}

impl SshRemoteSession {
	pub fn new(host: String, port: Option<u16>, username: Option<String>, command_timeout: Duration) -> Self {
		SshRemoteSession { host, port, username, command_timeout, inflight: Mutex::new(()) }
	}

	fn target(&self) -> String {
		match &self.username {
			Some(user) => format!("{}@{}", user, self.host),
			None => self.host.clone(),
		}
	}

	fn base_command(&self) -> Command {
		let mut cmd = Command::new("ssh");
		if let Some(port) = self.port {
			cmd.arg("-p").arg(port.to_string());
		}
		cmd.arg(self.target());
		cmd
	}

	async fn wait_with_timeout(&self, mut child: Child) -> Result<ExecOutput, TransportError> {
		let mut stdout = Vec::new();
		let mut stderr = Vec::new();
		if let Some(mut out) = child.stdout.take() {
			let _ = out.read_to_end(&mut stdout).await;
		}
		if let Some(mut err) = child.stderr.take() {
			let _ = err.read_to_end(&mut stderr).await;
		}

		let status = tokio::time::timeout(self.command_timeout, child.wait())
			.await
			.map_err(|_| TransportError::Disconnected)?
			.map_err(TransportError::Io)?;

		Ok(ExecOutput { stdout, stderr, success: status.success() })
	}
}

#[async_trait]
impl RemoteSession for SshRemoteSession {
	async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError> {
		let _guard = self.inflight.lock().await;
		debug!(target = %self.target(), %command, "executing remote command");

		let child = self
			.base_command()
			.arg(command)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| TransportError::ConnectFailed {
				target: self.target(),
				source: Box::new(e),
			})?;

		self.wait_with_timeout(child).await
	}

	async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
		let _guard = self.inflight.lock().await;
		let mut data = Vec::new();
		tokio::fs::File::open(local_path)
			.await
			.map_err(TransportError::Io)?
			.read_to_end(&mut data)
			.await
			.map_err(TransportError::Io)?;

		let mut child = self
			.base_command()
			.arg(format!("cat > {}", shell_quote(remote_path)))
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| TransportError::ConnectFailed {
				target: self.target(),
				source: Box::new(e),
			})?;

		let mut stdin = child.stdin.take().ok_or(TransportError::Disconnected)?;
		stdin.write_all(&data).await.map_err(|e| TransportError::TransferFailed {
			path: remote_path.to_string(),
			message: e.to_string(),
		})?;
		drop(stdin);

		let output = self.wait_with_timeout(child).await?;
		if !output.success {
			return Err(TransportError::TransferFailed {
				path: remote_path.to_string(),
				message: String::from_utf8_lossy(&output.stderr).to_string(),
			});
		}
		Ok(())
	}

	async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), TransportError> {
		let output = self.exec(&format!("cat {}", shell_quote(remote_path))).await?;
		if !output.success {
			return Err(TransportError::TransferFailed {
				path: remote_path.to_string(),
				message: String::from_utf8_lossy(&output.stderr).to_string(),
			});
		}
		tokio::fs::write(local_path, &output.stdout).await.map_err(TransportError::Io)?;
		Ok(())
	}

	async fn heartbeat(&self) -> Result<(), TransportError> {
		let output = self.exec("true").await?;
		if output.success {
			Ok(())
		} else {
			Err(TransportError::Disconnected)
		}
	}

	async fn reconnect(&self) -> Result<(), TransportError> {
		// Stateless per-call subprocess model: nothing to tear down, the next
		// `exec` simply spawns a fresh `ssh` invocation. Probe liveness so the
		// caller gets a clear signal before resuming real work.
		warn!(target = %self.target(), "reconnecting");
		self.heartbeat().await
	}
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', "'\\''"))
}

/// Retry a fallible remote operation with exponential backoff, the "retry
/// decorator" called for in the design notes: wraps any `RemoteSession` call
/// with (max_attempts, base_delay, max_delay), retrying only errors the
/// transport itself marks retryable.
pub async fn with_retry<T, F, Fut>(
	max_attempts: u32,
	base_delay: Duration,
	max_delay: Duration,
	mut f: F,
) -> Result<T, TransportError>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, TransportError>>,
{
	let mut attempt = 0;
	let mut delay = base_delay;
	loop {
		match f().await {
			Ok(v) => return Ok(v),
			Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
				attempt += 1;
				warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transport error: {}", e);
				tokio::time::sleep(delay).await;
				delay = std::cmp::min(delay * 2, max_delay);
			}
			Err(e) => return Err(e),
		}
	}
}

/// `with_retry` bound to one `SyncConfig`'s reconnect knobs — the shape every
/// remote call in the executor and scanner goes through, so a transient
/// `Disconnected`/`Io` fault is absorbed here rather than surfacing as fatal.
pub async fn retry_with_config<T, F, Fut>(config: &SyncConfig, f: F) -> Result<T, TransportError>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, TransportError>>,
{
	with_retry(
		config.reconnect_max_attempts,
		Duration::from_millis(config.reconnect_base_delay_ms),
		Duration::from_millis(config.reconnect_max_delay_ms),
		f,
	)
	.await
}


// vim: ts=4

//! Remote scanner: launches a detached, `nohup`'d listing process on the
//! remote host and polls for its completion sentinel.
//!
//! The contract (design notes: "Background `nohup` remote process") is
//! detachment — the remote listing must survive the invoking SSH channel
//! dying. The client never holds a handle to the remote process, only to the
//! session-unique temp file it writes to; `scan_remote` launches it and
//! returns immediately, and the orchestrator polls separately so it can run
//! concurrently with the local scan.

use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::ignore::IgnoreMatcher;
use crate::path::RelativePath;
use crate::transport::{self, RemoteSession};
use crate::types::PathFingerprint;

const SCAN_SENTINEL: &str = "SCAN_DONE";

/// A handle to an in-flight remote scan: just the session-unique file name
/// the background process is writing to.
pub struct RemoteScanHandle {
	pub remote_temp_path: String,
}

/// Launch the remote scan in the background. The shell command finds every
/// file under `remote_root` (pruning the ignore matcher's best-effort heavy
/// directories), emits `path\tmtime\tsize` lines gzip-compressed into
/// `remote_temp_path`, appends the sentinel line, and backgrounds itself so
/// it keeps running after the SSH command returns. `nohup` plus `&` is
/// enough for that — a `nohup`'d background job already survives the
/// invoking shell exiting; no `disown` is used since that's a bash builtin
/// and the remote's non-interactive command shell is not guaranteed to be bash.
pub async fn scan_remote(
	session: &dyn RemoteSession,
	remote_root: &str,
	remote_temp_path: &str,
	ignore: &IgnoreMatcher,
	config: &SyncConfig,
) -> Result<RemoteScanHandle, SyncError> {
	let prune = ignore.remote_prune_args();
	let command = format!(
		"nohup sh -c \"cd {root} && find . {prune} -type f -printf '%P\\t%T@\\t%s\\n' | gzip > {tmp} && echo {sentinel} | gzip >> {tmp}\" >/dev/null 2>&1 </dev/null &",
		root = shell_quote(remote_root),
		prune = prune,
		tmp = shell_quote(remote_temp_path),
		sentinel = SCAN_SENTINEL,
	);

	let output =
		transport::retry_with_config(config, || async { session.exec(&command).await }).await.map_err(SyncError::Transport)?;
	if !output.success {
		return Err(SyncError::Remote { message: String::from_utf8_lossy(&output.stderr).to_string() });
	}

	Ok(RemoteScanHandle { remote_temp_path: remote_temp_path.to_string() })
}

/// Poll the remote temp file until the `SCAN_DONE` sentinel is observed,
/// parsing the (gzip-compressed, tab-separated) listing once it is.
///
/// Returns `Err(SyncError::ScanTimeout)` if `poll_timeout` elapses first.
pub async fn poll_remote_scan(
	session: &dyn RemoteSession,
	handle: &RemoteScanHandle,
	poll_interval: Duration,
	poll_timeout: Duration,
	config: &SyncConfig,
) -> Result<Vec<PathFingerprint>, SyncError> {
	let deadline = tokio::time::Instant::now() + poll_timeout;
	let mut elapsed = Duration::ZERO;

	loop {
		let cmd = format!("zcat {} 2>/dev/null", shell_quote(&handle.remote_temp_path));
		let output = transport::retry_with_config(config, || {
			let cmd = cmd.clone();
			async move { session.exec(&cmd).await }
		})
		.await
		.map_err(SyncError::Transport)?;

		if output.success {
			let text = String::from_utf8_lossy(&output.stdout);
			if let Some(entries) = parse_if_complete(&text)? {
				return Ok(entries);
			}
		}

		if tokio::time::Instant::now() >= deadline {
			return Err(SyncError::ScanTimeout { elapsed_secs: elapsed.as_secs() });
		}
		tokio::time::sleep(poll_interval).await;
		elapsed += poll_interval;
	}
}

/// Parse the listing only if the sentinel line is present; otherwise the
/// scan is still running and the caller should poll again.
fn parse_if_complete(text: &str) -> Result<Option<Vec<PathFingerprint>>, SyncError> {
	if !text.lines().any(|l| l == SCAN_SENTINEL) {
		return Ok(None);
	}

	let mut entries = Vec::new();
	for line in text.lines() {
		if line.is_empty() || line == SCAN_SENTINEL {
			continue;
		}
		let mut fields = line.split('\t');
		let (Some(path_str), Some(mtime_str), Some(size_str)) = (fields.next(), fields.next(), fields.next())
		else {
			return Err(SyncError::Remote { message: format!("malformed scan line: {:?}", line) });
		};
		let Ok(path) = RelativePath::new(path_str.to_string()) else { continue };
		let mtime: f64 = mtime_str
			.parse()
			.map_err(|_| SyncError::Remote { message: format!("bad mtime in scan line: {:?}", line) })?;
		let size: u64 = size_str
			.parse()
			.map_err(|_| SyncError::Remote { message: format!("bad size in scan line: {:?}", line) })?;
		entries.push(PathFingerprint { path, mtime, size });
	}
	Ok(Some(entries))
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_incomplete_listing_returns_none() {
		let text = "a.txt\t100.0\t5\n";
		assert!(parse_if_complete(text).unwrap().is_none());
	}

	#[test]
	fn parse_complete_listing_returns_entries() {
		let text = "a.txt\t100.5\t5\nb/c.txt\t200.0\t10\nSCAN_DONE\n";
		let entries = parse_if_complete(text).unwrap().unwrap();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].path.as_str(), "a.txt");
		assert_eq!(entries[0].size, 5);
		assert_eq!(entries[1].mtime, 200.0);
	}

	#[test]
	fn malformed_line_is_an_error() {
		let text = "a.txt\tbadfloat\t5\nSCAN_DONE\n";
		assert!(parse_if_complete(text).is_err());
	}
}

// vim: ts=4

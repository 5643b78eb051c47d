//! Orchestrator: drives one sync session end to end.
//!
//! Owns the only mutable handles to the state and progress stores (per the
//! concurrency model's "only the orchestrator writes them" rule) and is the
//! one place that sequences scanning, deciding and executing. A background
//! task sends a heartbeat to the remote session every `heartbeat_interval`
//! and reconnects with exponential backoff on failure, independent of
//! whatever phase the main sequence is in.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use crate::config::SyncConfig;
use crate::decider;
use crate::error::SyncError;
use crate::executor::{self, ExecutionSummary, ExecutorContext};
use crate::ignore::IgnoreMatcher;
use crate::path::RelativePath;
use crate::progress::ProgressStore;
use crate::reporter::Reporter;
use crate::scan;
use crate::state::StateStore;
use crate::transport::{self, RemoteSession};
use crate::types::{PathFingerprint, SyncSession};
use crate::utils::FileLock;

/// Where a session currently is. Tracked internally for diagnostics and to
/// decide whether a fatal error should still attempt to flush progress;
/// reporting to the user goes through `Reporter`'s fixed event set, not this
/// enum, so it is logged rather than exposed as its own event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
	Init,
	Scanning,
	Deciding,
	ExecutingConflicts,
	ExecutingPushPull,
	ExecutingDeletes,
	Finalizing,
	Done,
	Aborted,
}

/// Run one bidirectional sync session against `config`, over `session`,
/// reporting through `reporter`. Returns the summary of what was actually
/// moved, or the first fatal error encountered.
pub async fn run_sync(
	config: &SyncConfig,
	session: Arc<dyn RemoteSession>,
	reporter: Arc<dyn Reporter>,
) -> Result<ExecutionSummary, SyncError> {
	config.validate()?;

	let _lock = FileLock::acquire(&config.local_root)
		.map_err(|e| SyncError::LockFailed { message: e.to_string() })?;

	let (heartbeat_handle, heartbeat_stop) = spawn_heartbeat(session.clone(), config, reporter.clone());

	let result = run_session(config, &session, reporter.as_ref()).await;

	heartbeat_stop.notify_one();
	let _ = heartbeat_handle.await;

	match &result {
		Ok(_) => debug!(phase = ?SyncPhase::Done, "session finished"),
		Err(e) => {
			debug!(phase = ?SyncPhase::Aborted, error = %e, "session aborted");
			reporter.error(&e.to_string());
		}
	}

	result
}

async fn run_session(
	config: &SyncConfig,
	session: &Arc<dyn RemoteSession>,
	reporter: &dyn Reporter,
) -> Result<ExecutionSummary, SyncError> {
	debug!(phase = ?SyncPhase::Init, "session starting");
	let sync_session = SyncSession::new();
	let (mut state, state_warnings) = match StateStore::load(&config.local_root).await {
		Ok(loaded) => loaded,
		Err(SyncError::StateCorruption { path, message }) if config.force => {
			reporter.warn(&format!(
				"state file {} is corrupted ({}); proceeding with empty state because --force was given",
				path, message
			));
			(StateStore::new(), Vec::new())
		}
		Err(e) => return Err(e),
	};
	for warning in &state_warnings {
		reporter.warn(warning);
	}
	if config.force {
		// `--force` bypasses the progress checkpoint entirely rather than
		// merely ignoring entries it marks done.
		ProgressStore::discard(&config.local_root).await?;
	}
	let mut progress = ProgressStore::load(&config.local_root, &sync_session).await;
	let (ignore, ignore_warnings) = IgnoreMatcher::load(&config.local_root, &config.ignore_file)?;
	for warning in &ignore_warnings {
		reporter.warn(warning);
	}

	sweep_orphaned_remote_temp_files(session.as_ref(), &config.remote_root).await;

	debug!(phase = ?SyncPhase::Scanning, "scanning");
	reporter.scan_started("remote");
	let remote_handle =
		scan::scan_remote(session.as_ref(), &config.remote_root, &sync_session.remote_temp.scan, &ignore, config).await?;

	reporter.scan_started("local");
	let (local_result, remote_result) = tokio::join!(
		scan::scan_local(&config.local_root, &ignore),
		poll_remote_scan_with_reconnect(session, &remote_handle, config, reporter),
	);
	let local_entries = local_result?;
	reporter.scan_done("local", local_entries.len());
	let remote_entries = remote_result?;
	reporter.scan_done("remote", remote_entries.len());

	debug!(phase = ?SyncPhase::Deciding, "deciding");
	let actions = decide_all(local_entries, remote_entries, &state, config, reporter);

	if config.dry_run {
		return Ok(ExecutionSummary { pushed: 0, pulled: 0, deleted_local: 0, deleted_remote: 0, conflicts: 0 });
	}

	debug!(phase = ?SyncPhase::ExecutingConflicts, "executing");
	let mut exec_ctx = ExecutorContext {
		local_root: &config.local_root,
		remote_root: &config.remote_root,
		session: session.as_ref(),
		remote_temp: &sync_session.remote_temp,
		state: &mut state,
		progress: &mut progress,
		reporter,
		config,
	};
	let summary = executor::execute(actions, &mut exec_ctx).await?;

	debug!(phase = ?SyncPhase::Finalizing, "finalizing");
	state.save(&config.local_root).await?;
	progress.clear().await?;
	let _ = session.exec(&format!("rm -f {}", shell_quote(&sync_session.remote_temp.scan))).await;

	reporter.session_done(
		summary.pushed,
		summary.pulled,
		summary.deleted_local + summary.deleted_remote,
		summary.conflicts,
	);

	Ok(summary)
}

fn decide_all(
	local_entries: Vec<PathFingerprint>,
	remote_entries: Vec<PathFingerprint>,
	state: &StateStore,
	config: &SyncConfig,
	reporter: &dyn Reporter,
) -> Vec<crate::types::Action> {
	let mut local_map: BTreeMap<RelativePath, PathFingerprint> = BTreeMap::new();
	for fp in local_entries {
		local_map.insert(fp.path.clone(), fp);
	}
	let mut remote_map: BTreeMap<RelativePath, PathFingerprint> = BTreeMap::new();
	for fp in remote_entries {
		remote_map.insert(fp.path.clone(), fp);
	}

	let mut keys: BTreeSet<RelativePath> = BTreeSet::new();
	keys.extend(local_map.keys().cloned());
	keys.extend(remote_map.keys().cloned());
	keys.extend(state.iter().map(|e| e.path.clone()));

	let mut actions = Vec::with_capacity(keys.len());
	for key in keys {
		let local = local_map.get(&key);
		let remote = remote_map.get(&key);
		let state_entry = state.get(&key);
		let action = decider::decide(&key, local, remote, state_entry, config);
		reporter.action_decided(&key, action.kind);
		actions.push(action);
	}
	actions
}

/// Poll the remote scan, reconnecting and resuming the same poll on
/// `ScanTimeout` instead of letting it abort the session. The background
/// `nohup` process on the remote is never re-launched here — only
/// `scan_remote` does that — so a reconnect just resumes reading the same
/// session-unique temp file.
async fn poll_remote_scan_with_reconnect(
	session: &Arc<dyn RemoteSession>,
	handle: &scan::RemoteScanHandle,
	config: &SyncConfig,
	reporter: &dyn Reporter,
) -> Result<Vec<PathFingerprint>, SyncError> {
	let mut attempt = 0;
	loop {
		let result = scan::poll_remote_scan(
			session.as_ref(),
			handle,
			Duration::from_secs(config.poll_interval_secs),
			Duration::from_secs(config.poll_timeout_secs),
			config,
		)
		.await;

		match result {
			Ok(entries) => return Ok(entries),
			Err(SyncError::ScanTimeout { elapsed_secs }) if attempt + 1 < config.reconnect_max_attempts => {
				attempt += 1;
				reporter.warn(&format!(
					"remote scan poll timed out after {}s, reconnecting to resume it (attempt {}/{})",
					elapsed_secs, attempt, config.reconnect_max_attempts
				));
				let base_delay = Duration::from_millis(config.reconnect_base_delay_ms);
				let max_delay = Duration::from_millis(config.reconnect_max_delay_ms);
				let session_for_retry = session.clone();
				transport::with_retry(config.reconnect_max_attempts, base_delay, max_delay, move || {
					let session_for_retry = session_for_retry.clone();
					async move { session_for_retry.reconnect().await }
				})
				.await
				.map_err(SyncError::Transport)?;
			}
			Err(e) => return Err(e),
		}
	}
}

/// Periodically probe the remote session and reconnect with exponential
/// backoff on failure, independent of whatever phase the main sequence is
/// running. Scans running under `nohup` on the remote are unaffected by a
/// transport blip; `poll_remote_scan` simply resumes polling the same
/// session-unique file once this task restores the connection.
fn spawn_heartbeat(
	session: Arc<dyn RemoteSession>,
	config: &SyncConfig,
	reporter: Arc<dyn Reporter>,
) -> (tokio::task::JoinHandle<()>, Arc<Notify>) {
	let stop = Arc::new(Notify::new());
	let stop_signal = stop.clone();
	let interval = Duration::from_secs(config.heartbeat_interval_secs);
	let base_delay = Duration::from_millis(config.reconnect_base_delay_ms);
	let max_delay = Duration::from_millis(config.reconnect_max_delay_ms);
	let max_attempts = config.reconnect_max_attempts;

	let handle = tokio::spawn(async move {
		loop {
			tokio::select! {
				_ = tokio::time::sleep(interval) => {
					if session.heartbeat().await.is_err() {
						reporter.warn("remote heartbeat failed, reconnecting");
						let session_for_retry = session.clone();
						let outcome = transport::with_retry(max_attempts, base_delay, max_delay, move || {
							let session_for_retry = session_for_retry.clone();
							async move { session_for_retry.reconnect().await }
						})
						.await;
						if let Err(e) = outcome {
							reporter.error(&format!("reconnect failed after repeated attempts: {}", e));
						}
					}
				}
				_ = stop_signal.notified() => break,
			}
		}
	});

	(handle, stop)
}

/// Best-effort removal of temp files left behind by a prior aborted session.
/// Never fails the current session: a sweep failure just means a later
/// aborted-session cleanup is deferred further, not that this session can't run.
async fn sweep_orphaned_remote_temp_files(session: &dyn RemoteSession, _remote_root: &str) {
	let cmd = "find /tmp -maxdepth 1 \\( -name 'sync_scan_*.tsv.gz' -o -name 'sync_push_*.tar.gz*' -o -name 'sync_pull_*.tar.gz*' \\) -mmin +60 -delete";
	let _ = session.exec(cmd).await;
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Action, ActionKind, StateEntry};

	fn fp(path: &str, mtime: f64, size: u64) -> PathFingerprint {
		PathFingerprint { path: RelativePath::new(path.to_string()).unwrap(), mtime, size }
	}

	#[test]
	fn decide_all_covers_union_of_local_remote_and_state() {
		let mut state = StateStore::new();
		state.insert(StateEntry { path: RelativePath::new("gone.txt".to_string()).unwrap(), mtime: 1.0, size: 1 });

		let local = vec![fp("new_local.txt", 10.0, 5)];
		let remote = vec![fp("new_remote.txt", 20.0, 7)];
		let config = SyncConfig::default();
		let reporter = crate::reporter::TracingReporter;

		let actions = decide_all(local, remote, &state, &config, &reporter);
		let kinds: Vec<ActionKind> = actions.iter().map(|a: &Action| a.kind).collect();

		assert!(kinds.contains(&ActionKind::Push));
		assert!(kinds.contains(&ActionKind::Pull));
		assert!(kinds.contains(&ActionKind::DeleteLocal));
	}

	#[test]
	fn decide_all_still_consults_state_when_force_is_set() {
		// `--force` bypasses the progress checkpoint (tested at the
		// `ProgressStore`/session level), not the state store: an unchanged,
		// already-synced file must still decide as `Skip`.
		let mut state = StateStore::new();
		state.insert(StateEntry { path: RelativePath::new("f.txt".to_string()).unwrap(), mtime: 1.0, size: 1 });

		let local = vec![fp("f.txt", 1.0, 1)];
		let remote = vec![fp("f.txt", 1.0, 1)];
		let mut config = SyncConfig::default();
		config.force = true;
		let reporter = crate::reporter::TracingReporter;

		let actions = decide_all(local, remote, &state, &config, &reporter);
		assert_eq!(actions.len(), 1);
		assert_eq!(actions[0].kind, ActionKind::Skip);
	}

	/// Minimal `RemoteSession` double for exercising `spawn_heartbeat` in
	/// isolation: `exec`/`upload`/`download` are never called, `heartbeat`
	/// fails exactly once, and `reconnect` counts its invocations.
	struct HeartbeatProbe {
		fail_next: std::sync::atomic::AtomicBool,
		reconnects: std::sync::atomic::AtomicU32,
	}

	#[async_trait::async_trait]
	impl RemoteSession for HeartbeatProbe {
		async fn exec(&self, _command: &str) -> Result<crate::transport::ExecOutput, crate::error::TransportError> {
			unreachable!("heartbeat test never execs")
		}
		async fn upload(&self, _local_path: &std::path::Path, _remote_path: &str) -> Result<(), crate::error::TransportError> {
			unreachable!("heartbeat test never uploads")
		}
		async fn download(&self, _remote_path: &str, _local_path: &std::path::Path) -> Result<(), crate::error::TransportError> {
			unreachable!("heartbeat test never downloads")
		}
		async fn heartbeat(&self) -> Result<(), crate::error::TransportError> {
			if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
				Err(crate::error::TransportError::Disconnected)
			} else {
				Ok(())
			}
		}
		async fn reconnect(&self) -> Result<(), crate::error::TransportError> {
			self.reconnects.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			Ok(())
		}
	}

	#[tokio::test]
	async fn spawn_heartbeat_reconnects_after_a_failed_probe() {
		let probe = Arc::new(HeartbeatProbe {
			fail_next: std::sync::atomic::AtomicBool::new(true),
			reconnects: std::sync::atomic::AtomicU32::new(0),
		});
		let dyn_session: Arc<dyn RemoteSession> = probe.clone();
		let mut config = SyncConfig::default();
		config.heartbeat_interval_secs = 0;
		config.reconnect_base_delay_ms = 1;
		config.reconnect_max_delay_ms = 2;
		let reporter: Arc<dyn Reporter> = Arc::new(crate::reporter::TracingReporter);

		let (handle, stop) = spawn_heartbeat(dyn_session, &config, reporter);
		tokio::time::sleep(Duration::from_millis(50)).await;
		stop.notify_one();
		let _ = handle.await;

		assert!(probe.reconnects.load(std::sync::atomic::Ordering::SeqCst) >= 1);
	}

	#[tokio::test]
	async fn force_discards_an_existing_progress_checkpoint() {
		let dir = tempfile::TempDir::new().unwrap();
		let session = SyncSession::new();
		let mut progress = ProgressStore::load(dir.path(), &session).await;
		let path = RelativePath::new("a.txt".to_string()).unwrap();
		progress.record(&path, ActionKind::Push, crate::types::ProgressStatus::Done).await.unwrap();
		assert!(dir.path().join(".sync_progress.json").exists());

		ProgressStore::discard(dir.path()).await.unwrap();
		assert!(!dir.path().join(".sync_progress.json").exists());

		let reloaded = ProgressStore::load(dir.path(), &SyncSession::new()).await;
		assert!(!reloaded.is_done(&path, ActionKind::Push));
	}
}

// vim: ts=4

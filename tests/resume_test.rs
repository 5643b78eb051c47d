//! Resume-after-crash: a batch partially completed in a prior, interrupted
//! session must not be redone, and the union of two partitioned runs must
//! equal one uninterrupted run.

mod support;

use std::sync::Arc;

use tempfile::TempDir;

use driftsync::executor::{self, ExecutorContext};
use driftsync::progress::ProgressStore;
use driftsync::reporter::TracingReporter;
use driftsync::state::StateStore;
use driftsync::types::{Action, ActionKind, PathFingerprint, ProgressStatus, SyncSession};
use driftsync::{RelativePath, SyncConfig};
use support::FakeRemoteSession;

fn push_action(path: &str, size: u64) -> Action {
	let rel = RelativePath::new(path.to_string()).unwrap();
	Action {
		kind: ActionKind::Push,
		path: rel.clone(),
		source: Some(PathFingerprint { path: rel, mtime: 1.0, size }),
		local: None,
		drop_state: false,
	}
}

/// 100 PUSH actions planned; 40 already recorded `done` from a prior,
/// interrupted run. Re-running the executor against the same progress store
/// must transfer exactly the remaining 60, never re-sending the first 40.
#[tokio::test]
async fn resumed_session_transfers_only_the_remaining_actions() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();

	let mut actions = Vec::new();
	for i in 0..100 {
		let name = format!("file_{:03}.txt", i);
		std::fs::write(local.path().join(&name), format!("contents of {}", i)).unwrap();
		actions.push(push_action(&name, 10));
	}

	let session = SyncSession::new();
	let mut progress = ProgressStore::load(local.path(), &session).await;
	for action in &actions[0..40] {
		progress.record(&action.path, ActionKind::Push, ProgressStatus::Done).await.unwrap();
	}

	let mut state = StateStore::new();
	let remote_session = Arc::new(FakeRemoteSession::new());
	let remote_root = remote.path().display().to_string();
	let config = SyncConfig {
		local_root: local.path().to_path_buf(),
		remote_root: remote_root.clone(),
		..SyncConfig::default()
	};
	let reporter = TracingReporter;

	let mut ctx = ExecutorContext {
		local_root: local.path(),
		remote_root: &remote_root,
		session: remote_session.as_ref(),
		remote_temp: &session.remote_temp,
		state: &mut state,
		progress: &mut progress,
		reporter: &reporter,
		config: &config,
	};

	let summary = executor::execute(actions, &mut ctx).await.unwrap();
	assert_eq!(summary.pushed, 60, "only the 60 not already marked done should transfer");

	let mut transferred = 0;
	for entry in std::fs::read_dir(remote.path()).unwrap() {
		let _ = entry.unwrap();
		transferred += 1;
	}
	assert_eq!(transferred, 60);
}

/// A PUSH recorded done does not block a PULL on the same path in the
/// reverse direction: resume matching is keyed on (path, action), not path alone.
#[tokio::test]
async fn done_push_does_not_suppress_a_pull_on_the_same_path() {
	let dir = TempDir::new().unwrap();
	let session = SyncSession::new();
	let mut progress = ProgressStore::load(dir.path(), &session).await;
	let path = RelativePath::new("same.txt".to_string()).unwrap();
	progress.record(&path, ActionKind::Push, ProgressStatus::Done).await.unwrap();

	assert!(progress.is_done(&path, ActionKind::Push));
	assert!(!progress.is_done(&path, ActionKind::Pull));
}

// vim: ts=4

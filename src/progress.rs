//! Progress/checkpoint store: durable record of which actions have already
//! been applied in the current session, so a restarted sync can resume
//! instead of redoing completed work.
//!
//! Persisted as a JSON document at `.sync_progress.json`, rewritten
//! atomically (temp file + rename) after every recorded entry. If a progress
//! file from an interrupted session already exists, its `session`/`started`
//! identity is preserved across the resuming run rather than replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::SyncError;
use crate::path::RelativePath;
use crate::types::{ActionKind, ProgressStatus, SyncSession};

const PROGRESS_FILE_NAME: &str = ".sync_progress.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressRecord {
	action: ActionKind,
	status: ProgressStatus,
	ts: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProgressDocument {
	session: Uuid,
	started: DateTime<Utc>,
	entries: HashMap<String, ProgressRecord>,
}

pub struct ProgressStore {
	path: PathBuf,
	doc: ProgressDocument,
}

impl ProgressStore {
	fn progress_path(local_root: &Path) -> PathBuf {
		local_root.join(PROGRESS_FILE_NAME)
	}

	/// Remove any existing checkpoint without loading it. Used by `--force`,
	/// which bypasses the progress file entirely and removes it before
	/// scanning rather than merely ignoring its contents.
	pub async fn discard(local_root: &Path) -> Result<(), SyncError> {
		let path = Self::progress_path(local_root);
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(SyncError::Local { path: path.display().to_string(), source: e }),
		}
	}

	/// Load the progress store for `local_root`. If no checkpoint exists, one
	/// is started fresh carrying `session`'s identity; if a checkpoint from an
	/// interrupted run is found, its original session/started fields are kept.
	pub async fn load(local_root: &Path, session: &SyncSession) -> Self {
		let path = Self::progress_path(local_root);
		let doc = match tokio::fs::read_to_string(&path).await {
			Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|_| {
				ProgressDocument { session: session.id, started: session.started_at, entries: HashMap::new() }
			}),
			Err(_) => {
				ProgressDocument { session: session.id, started: session.started_at, entries: HashMap::new() }
			}
		};
		ProgressStore { path, doc }
	}

	pub fn session(&self) -> Uuid {
		self.doc.session
	}

	/// Whether this `(path, action)` already completed earlier in the session
	/// (or a prior, interrupted run) and can be skipped.
	pub fn is_done(&self, path: &RelativePath, action: ActionKind) -> bool {
		matches!(
			self.doc.entries.get(path.as_str()),
			Some(ProgressRecord { action: a, status: ProgressStatus::Done, .. }) if *a == action
		)
	}

	/// Record an action's outcome and persist immediately.
	pub async fn record(
		&mut self,
		path: &RelativePath,
		action: ActionKind,
		status: ProgressStatus,
	) -> Result<(), SyncError> {
		self.doc.entries.insert(path.as_str().to_string(), ProgressRecord { action, status, ts: Utc::now() });
		self.flush().await
	}

	/// Clear the progress log, called once the session finishes successfully.
	pub async fn clear(&mut self) -> Result<(), SyncError> {
		self.doc.entries.clear();
		if self.path.exists() {
			tokio::fs::remove_file(&self.path).await.map_err(|e| SyncError::Local {
				path: self.path.display().to_string(),
				source: e,
			})?;
		}
		Ok(())
	}

	async fn flush(&self) -> Result<(), SyncError> {
		let tmp_path = self.path.with_extension("json.tmp");
		let json = serde_json::to_string_pretty(&self.doc).map_err(|e| SyncError::Other {
			message: format!("failed to serialize progress store: {}", e),
		})?;
		tokio::fs::write(&tmp_path, json).await.map_err(|e| SyncError::Local {
			path: tmp_path.display().to_string(),
			source: e,
		})?;
		tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| SyncError::Local {
			path: self.path.display().to_string(),
			source: e,
		})?;
		Ok(())
	}
}


// vim: ts=4

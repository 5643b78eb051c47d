//! Core data model shared across the scanners, decider, executor and orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::path::RelativePath;

/// A single observation of a file's identity: its path, modification time and size.
///
/// Produced fresh by both the local and the remote scanner; also the shape
/// persisted (as `StateEntry`) in the state store after a successful sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathFingerprint {
	pub path: RelativePath,
	/// Unix timestamp with sub-second precision.
	pub mtime: f64,
	pub size: u64,
}

/// A fingerprint as recorded in the state store after the last successful sync.
pub type StateEntry = PathFingerprint;

/// Outcome of applying one action, recorded in the progress store as the
/// executor works through a batch, and consulted on resume after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
	Done,
	Failed,
}

/// The kind of action the decider produced for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
	Push,
	Pull,
	DeleteLocal,
	DeleteRemote,
	Conflict,
	Skip,
}

/// One decided unit of work for a single path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
	pub kind: ActionKind,
	pub path: RelativePath,
	/// The fingerprint to copy from, for `Push`/`Pull`; the remote fingerprint
	/// to download for `Conflict`. `None` for deletes/skip.
	pub source: Option<PathFingerprint>,
	/// For `Conflict` only: the local fingerprint at decide time, so the
	/// conflict-info sidecar can describe both sides. `None` otherwise.
	pub local: Option<PathFingerprint>,
	/// For `Skip` only: whether a stale `StateEntry` for this path should be
	/// removed. Set when the decider saw the path missing on both local and
	/// remote (spec.md §4.5: "missing | missing | any -> SKIP (and drop state
	/// entry)"); left `false` for every other `Skip` (first-sight-adopt, or a
	/// demoted action, both of which must leave any existing state alone).
	pub drop_state: bool,
}

impl Action {
	pub fn skip(path: RelativePath) -> Self {
		Action { kind: ActionKind::Skip, path, source: None, local: None, drop_state: false }
	}

	/// A `Skip` that also clears any stored fingerprint for `path`, for the
	/// "absent on both sides" decider row.
	pub fn skip_dropping_state(path: RelativePath) -> Self {
		Action { kind: ActionKind::Skip, path, source: None, local: None, drop_state: true }
	}
}

/// Identifies one run of the orchestrator end to end: the session id seeds
/// every remote temp-file name so concurrent or retried sessions never collide.
#[derive(Debug, Clone)]
pub struct SyncSession {
	pub id: Uuid,
	pub remote_temp: RemoteTempPaths,
	pub started_at: DateTime<Utc>,
}

impl SyncSession {
	pub fn new() -> Self {
		let id = Uuid::new_v4();
		SyncSession { remote_temp: RemoteTempPaths::for_session(id), id, started_at: Utc::now() }
	}
}

impl Default for SyncSession {
	fn default() -> Self {
		Self::new()
	}
}

/// Remote temp file names for this session, namespaced by session UUID so
/// that two sessions against the same remote root never collide.
#[derive(Debug, Clone)]
pub struct RemoteTempPaths {
	pub scan: String,
	pub push_bundle: String,
	pub pull_bundle: String,
}

impl RemoteTempPaths {
	fn for_session(id: Uuid) -> Self {
		RemoteTempPaths {
			scan: format!("/tmp/sync_scan_{}.tsv.gz", id),
			push_bundle: format!("/tmp/sync_push_{}.tar.gz", id),
			pull_bundle: format!("/tmp/sync_pull_{}.tar.gz", id),
		}
	}
}

/// Where the executor parked the two conflicting copies of a file, plus a
/// sidecar describing why. `original_path` keeps the local winner in place;
/// the loser is renamed alongside it with `token` distinguishing repeated
/// conflicts on the same path within one session.
#[derive(Debug, Clone)]
pub struct ConflictArtifact {
	pub original_path: RelativePath,
	pub remote_copy_path: PathBuf,
	pub info_path: PathBuf,
	pub token: String,
}


// vim: ts=4

//! The decider: a pure function from `(local, remote, state)` to one `Action`.
//!
//! Generalizes the two-way `diff_actions` comparison found in SFTP-sync-style
//! tools (a `FileIndex` diff keyed purely on local-vs-remote mtime) to a
//! three-way comparison against a stored last-known-synced fingerprint, which
//! is what lets the engine tell "remote deleted this" apart from "local
//! deleted this" instead of only ever seeing one side's absence.

use crate::config::SyncConfig;
use crate::path::RelativePath;
use crate::types::{Action, ActionKind, PathFingerprint, StateEntry};

/// Which directions of action the decider is permitted to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionGate {
	Bidirectional,
	PushOnly,
	PullOnly,
}

impl DirectionGate {
	fn demote(self, action: Action) -> Action {
		let demote_pull = matches!(self, DirectionGate::PushOnly)
			&& matches!(action.kind, ActionKind::Pull | ActionKind::DeleteLocal);
		let demote_push = matches!(self, DirectionGate::PullOnly)
			&& matches!(action.kind, ActionKind::Push | ActionKind::DeleteRemote);
		if demote_pull || demote_push {
			Action::skip(action.path)
		} else {
			action
		}
	}
}

/// Two fingerprints are "unchanged" relative to each other if their sizes
/// match and their mtimes are within `threshold_secs` of one another.
fn unchanged(a: &PathFingerprint, b: &PathFingerprint, threshold_secs: f64) -> bool {
	a.size == b.size && (a.mtime - b.mtime).abs() <= threshold_secs
}

/// Decide the action for a single path given its observed local fingerprint,
/// observed remote fingerprint, and last-synced state entry (all optional).
///
/// Pure and total: every combination of presence/absence produces exactly
/// one `Action`, per the table this implements.
pub fn decide(
	path: &RelativePath,
	local: Option<&PathFingerprint>,
	remote: Option<&PathFingerprint>,
	state: Option<&StateEntry>,
	config: &SyncConfig,
) -> Action {
	let gate = config.direction_gate();
	let threshold = config.change_threshold_secs;

	let action = match (local, remote, state) {
		(Some(l), None, None) => push(path, l),
		(Some(_), None, Some(_)) => {
			Action { kind: ActionKind::DeleteLocal, path: path.clone(), source: None, local: None, drop_state: false }
		}
		(None, Some(r), None) => pull(path, r),
		(None, Some(_), Some(_)) => {
			Action { kind: ActionKind::DeleteRemote, path: path.clone(), source: None, local: None, drop_state: false }
		}
		// Absent on both sides: nothing to transfer. Only a *stored*
		// fingerprint is stale and needs dropping; with no prior state there's
		// nothing to drop.
		(None, None, Some(_)) => Action::skip_dropping_state(path.clone()),
		(None, None, None) => Action::skip(path.clone()),
		(Some(l), Some(r), Some(s)) => {
			let local_changed = !unchanged(l, s, threshold);
			let remote_changed = !unchanged(r, s, threshold);
			match (local_changed, remote_changed) {
				(true, false) => push(path, l),
				(false, true) => pull(path, r),
				(true, true) => conflict(path, l, r),
				(false, false) => Action::skip(path.clone()),
			}
		}
		(Some(l), Some(r), None) => {
			if unchanged(l, r, threshold) {
				// First sight and already identical: adopt both as synced.
				Action { kind: ActionKind::Skip, path: path.clone(), source: Some(l.clone()), local: None, drop_state: false }
			} else {
				conflict(path, l, r)
			}
		}
	};

	gate.demote(action)
}

fn push(path: &RelativePath, local: &PathFingerprint) -> Action {
	Action { kind: ActionKind::Push, path: path.clone(), source: Some(local.clone()), local: None, drop_state: false }
}

fn pull(path: &RelativePath, remote: &PathFingerprint) -> Action {
	Action { kind: ActionKind::Pull, path: path.clone(), source: Some(remote.clone()), local: None, drop_state: false }
}

/// `source` carries the remote fingerprint (what the executor downloads for
/// the `.remote.<token>.conflict` copy); `local` carries the local fingerprint
/// purely for the conflict-info sidecar.
fn conflict(path: &RelativePath, local: &PathFingerprint, remote: &PathFingerprint) -> Action {
	Action {
		kind: ActionKind::Conflict,
		path: path.clone(),
		source: Some(remote.clone()),
		local: Some(local.clone()),
		drop_state: false,
	}
}


// vim: ts=4

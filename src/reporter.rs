//! Structured progress reporting.
//!
//! The core never prints to a terminal or drives a UI directly; it emits
//! events to an abstract `Reporter`, the same seam the teacher drew between
//! its sync engine and its TUI/plain-output frontends. `TracingReporter` is
//! the one implementation shipped here, logging each event through `tracing`
//! at a level appropriate to its severity.

use crate::path::RelativePath;
use crate::types::ActionKind;
use tracing::{error, info, warn};

/// Why a batch failed, surfaced to the reporter without forcing it to know
/// about `SyncError`'s internals.
pub struct BatchFailure {
	pub message: String,
}

/// Structured events the orchestrator and executor emit over the course of
/// one session. Each method is a notification, not a question: a `Reporter`
/// never influences control flow, only observes it.
pub trait Reporter: Send + Sync {
	fn scan_started(&self, side: &str);
	fn scan_done(&self, side: &str, file_count: usize);
	fn action_decided(&self, path: &RelativePath, kind: ActionKind);
	fn batch_started(&self, kind: ActionKind, count: usize);
	fn batch_done(&self, kind: ActionKind, count: usize, failure: Option<&BatchFailure>);
	fn conflict(&self, path: &RelativePath, token: &str);
	fn warn(&self, message: &str);
	fn error(&self, message: &str);
	fn session_done(&self, pushed: usize, pulled: usize, deleted: usize, conflicts: usize);
}

/// Default `Reporter`: every event becomes one `tracing` call. Verbose mode
/// (`SyncConfig::verbose`) is handled by the caller choosing whether to emit
/// `action_decided` for `Skip` actions, not by this reporter itself.
pub struct TracingReporter;

impl Reporter for TracingReporter {
	fn scan_started(&self, side: &str) {
		info!(side, "scan started");
	}

	fn scan_done(&self, side: &str, file_count: usize) {
		info!(side, file_count, "scan done");
	}

	fn action_decided(&self, path: &RelativePath, kind: ActionKind) {
		info!(path = path.as_str(), ?kind, "action decided");
	}

	fn batch_started(&self, kind: ActionKind, count: usize) {
		info!(?kind, count, "batch started");
	}

	fn batch_done(&self, kind: ActionKind, count: usize, failure: Option<&BatchFailure>) {
		match failure {
			Some(f) => error!(?kind, count, message = %f.message, "batch failed"),
			None => info!(?kind, count, "batch done"),
		}
	}

	fn conflict(&self, path: &RelativePath, token: &str) {
		warn!(path = path.as_str(), token, "conflict recorded");
	}

	fn warn(&self, message: &str) {
		warn!("{}", message);
	}

	fn error(&self, message: &str) {
		error!("{}", message);
	}

	fn session_done(&self, pushed: usize, pulled: usize, deleted: usize, conflicts: usize) {
		info!(pushed, pulled, deleted, conflicts, "session done");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tracing_reporter_does_not_panic_on_any_event() {
		let reporter = TracingReporter;
		let path = RelativePath::new("a.txt".to_string()).unwrap();
		reporter.scan_started("local");
		reporter.scan_done("remote", 3);
		reporter.action_decided(&path, ActionKind::Push);
		reporter.batch_started(ActionKind::Push, 1);
		reporter.batch_done(ActionKind::Push, 1, None);
		reporter.batch_done(ActionKind::Pull, 0, Some(&BatchFailure { message: "boom".to_string() }));
		reporter.conflict(&path, "20260101T000000Z");
		reporter.warn("careful");
		reporter.error("oh no");
		reporter.session_done(1, 2, 0, 1);
	}
}

// vim: ts=4

//! Unified configuration for a driftsync session.
//!
//! Single source of truth, the way the teacher consolidated its own
//! historically fragmented config into one `Config` struct. Loading this
//! from a config file or CLI flags is outside this crate's scope; callers
//! build a `SyncConfig` however suits them and hand it to `orchestrator::run_sync`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Configuration for one bidirectional sync session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
	/// Local directory tree to sync.
	pub local_root: PathBuf,

	/// Remote host (bare hostname or `user@host`, resolved by the `ssh` client config).
	pub server: String,

	/// Remote directory tree to sync, absolute on the remote host.
	pub remote_root: String,

	/// SSH username, if not embedded in `server`.
	pub username: Option<String>,

	/// SSH port, if not the default.
	pub port: Option<u16>,

	/// Path (relative to `local_root`) of the gitignore-style ignore file to honor.
	pub ignore_file: PathBuf,

	/// Two fingerprints are considered equal in mtime if within this many seconds.
	pub change_threshold_secs: f64,

	/// How often to poll the remote for scan completion.
	pub poll_interval_secs: u64,

	/// Give up waiting for a remote scan after this many seconds.
	pub poll_timeout_secs: u64,

	/// Timeout for a single remote command invocation (not the background scan).
	pub remote_command_timeout_secs: u64,

	/// Keep-alive no-op sent to the remote session at this interval.
	pub heartbeat_interval_secs: u64,

	/// Base delay for exponential backoff on reconnect, in milliseconds.
	pub reconnect_base_delay_ms: u64,

	/// Cap on the exponential backoff delay, in milliseconds.
	pub reconnect_max_delay_ms: u64,

	/// Give up after this many consecutive reconnect failures.
	pub reconnect_max_attempts: u32,

	/// Re-batch PUSH/PULL actions once accumulated bundle size reaches this many bytes.
	pub batch_high_water_mark: u64,

	/// Bypass the progress (resume) checkpoint entirely and remove it before
	/// scanning, instead of treating paths it marks `done` as already handled.
	pub force: bool,

	/// Only ever push local changes to the remote; never pull.
	pub push_only: bool,

	/// Only ever pull remote changes to local; never push.
	pub pull_only: bool,

	/// Plan the sync and report it, but apply no filesystem changes.
	pub dry_run: bool,

	/// Emit verbose per-file logging in addition to summary events.
	pub verbose: bool,

	/// Deletion safety limits (see `delete::check_allowed`).
	pub delete_protection: DeleteProtectionConfig,
}

impl Default for SyncConfig {
	fn default() -> Self {
		SyncConfig {
			local_root: PathBuf::from("."),
			server: String::new(),
			remote_root: String::new(),
			username: None,
			port: None,
			ignore_file: PathBuf::from(".syncignore"),
			change_threshold_secs: 2.0,
			poll_interval_secs: 2,
			poll_timeout_secs: 180,
			remote_command_timeout_secs: 30,
			heartbeat_interval_secs: 30,
			reconnect_base_delay_ms: 500,
			reconnect_max_delay_ms: 30_000,
			reconnect_max_attempts: 8,
			batch_high_water_mark: 64 * 1024 * 1024,
			force: false,
			push_only: false,
			pull_only: false,
			dry_run: false,
			verbose: false,
			delete_protection: DeleteProtectionConfig::default(),
		}
	}
}

impl SyncConfig {
	/// Validate field combinations and ranges, the way `validation::config`
	/// checks the teacher's settings before a sync begins.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.push_only && self.pull_only {
			return Err(ConfigError::ConflictingDirection);
		}
		if self.change_threshold_secs < 0.0 {
			return Err(ConfigError::OutOfRange {
				field: "change_threshold_secs",
				message: "must be non-negative".to_string(),
			});
		}
		if self.poll_interval_secs == 0 {
			return Err(ConfigError::OutOfRange {
				field: "poll_interval_secs",
				message: "must be at least 1".to_string(),
			});
		}
		if self.poll_timeout_secs == 0 || self.poll_timeout_secs < self.poll_interval_secs {
			return Err(ConfigError::OutOfRange {
				field: "poll_timeout_secs",
				message: "must be at least poll_interval_secs".to_string(),
			});
		}
		if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
			return Err(ConfigError::OutOfRange {
				field: "reconnect_max_delay_ms",
				message: "must be >= reconnect_base_delay_ms".to_string(),
			});
		}
		if !self.local_root.exists() {
			return Err(ConfigError::InvalidPath {
				field: "local_root",
				path: self.local_root.display().to_string(),
			});
		}
		Ok(())
	}

	pub fn direction_gate(&self) -> crate::decider::DirectionGate {
		if self.push_only {
			crate::decider::DirectionGate::PushOnly
		} else if self.pull_only {
			crate::decider::DirectionGate::PullOnly
		} else {
			crate::decider::DirectionGate::Bidirectional
		}
	}
}

/// Limits enforced by `delete::check_allowed` before a delete batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteProtectionConfig {
	pub enabled: bool,
	pub max_delete_count: Option<usize>,
	pub max_delete_percent: Option<u8>,
}

impl Default for DeleteProtectionConfig {
	fn default() -> Self {
		DeleteProtectionConfig { enabled: true, max_delete_count: Some(1000), max_delete_percent: Some(50) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_valid() {
		let cfg = SyncConfig::default();
		// local_root "." always exists, so only direction/range checks matter here.
		assert!(cfg.validate().is_ok());
	}

	#[test]
	fn rejects_conflicting_direction_flags() {
		let mut cfg = SyncConfig::default();
		cfg.push_only = true;
		cfg.pull_only = true;
		assert!(matches!(cfg.validate(), Err(ConfigError::ConflictingDirection)));
	}

	#[test]
	fn rejects_zero_poll_interval() {
		let mut cfg = SyncConfig::default();
		cfg.poll_interval_secs = 0;
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn config_round_trips_through_json() {
		let cfg = SyncConfig::default();
		let json = serde_json::to_string(&cfg).expect("serialize");
		let back: SyncConfig = serde_json::from_str(&json).expect("deserialize");
		assert_eq!(cfg.change_threshold_secs, back.change_threshold_secs);
	}
}

// vim: ts=4

//! Conflict artifact creation.
//!
//! When the decider reports a `Conflict` the executor never overwrites
//! either side silently: the remote copy is pulled down next to the local
//! file under a `.remote.<token>.conflict` name, and a sidecar
//! `.<token>.conflict-info` file records why, so the user can diff and
//! resolve by hand. `token` is a UTC timestamp, not the session UUID, so
//! repeated conflicts on the same path within one session still sort and
//! read chronologically.

use std::path::Path;

use chrono::Utc;

use crate::error::SyncError;
use crate::path::RelativePath;
use crate::types::{ConflictArtifact, PathFingerprint};

/// Build the `<local_root>`-relative artifact paths for a conflict on `path`,
/// minting a fresh UTC token (`YYYYMMDDTHHMMSSZ`).
pub fn artifact_for(path: &RelativePath) -> ConflictArtifact {
	let token = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
	artifact_with_token(path, token)
}

fn artifact_with_token(path: &RelativePath, token: String) -> ConflictArtifact {
	let remote_copy_path = Path::new(path.as_str()).with_file_name(format!(
		"{}.remote.{}.conflict",
		file_stem_with_ext(path.as_str()),
		token
	));
	let info_path = Path::new(path.as_str()).with_file_name(format!(
		"{}.{}.conflict-info",
		file_stem_with_ext(path.as_str()),
		token
	));
	ConflictArtifact { original_path: path.clone(), remote_copy_path, info_path, token }
}

fn file_stem_with_ext(path: &str) -> String {
	Path::new(path).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.to_string())
}

/// Write the remote copy and the sidecar info file under `local_root`,
/// downloading the remote content via the supplied closure. Both the local
/// winner and the conflict bookkeeping live entirely on the local side; the
/// remote root is left untouched.
pub async fn record_conflict(
	local_root: &Path,
	artifact: &ConflictArtifact,
	local: Option<&PathFingerprint>,
	remote: &PathFingerprint,
	remote_bytes: &[u8],
) -> Result<(), SyncError> {
	let remote_copy_abs = local_root.join(&artifact.remote_copy_path);
	if let Some(parent) = remote_copy_abs.parent() {
		tokio::fs::create_dir_all(parent)
			.await
			.map_err(|e| SyncError::Local { path: parent.display().to_string(), source: e })?;
	}
	tokio::fs::write(&remote_copy_abs, remote_bytes)
		.await
		.map_err(|e| SyncError::Local { path: remote_copy_abs.display().to_string(), source: e })?;

	let info_abs = local_root.join(&artifact.info_path);
	let local_summary = local
		.map(|l| format!("local_mtime: {}\nlocal_size: {}\n", l.mtime, l.size))
		.unwrap_or_default();
	let info = format!(
		"path: {}\ntoken: {}\n{}remote_mtime: {}\nremote_size: {}\nreason: both local and remote changed since last sync\n\
		 recommended merge steps:\n  1. diff {} against {}\n  2. merge the wanted changes into {}\n  3. re-run sync to push the merged result\n",
		artifact.original_path.as_str(),
		artifact.token,
		local_summary,
		remote.mtime,
		remote.size,
		artifact.original_path.as_str(),
		artifact.remote_copy_path.display(),
		artifact.original_path.as_str(),
	);
	tokio::fs::write(&info_abs, info)
		.await
		.map_err(|e| SyncError::Local { path: info_abs.display().to_string(), source: e })?;

	Ok(())
}


// vim: ts=4

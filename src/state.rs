//! Persistent state store: the fingerprints recorded as of the last successful sync.
//!
//! Stored as tab-separated `path\tmtime\tsize` at `.sync_state.csv`, one line
//! per path, sorted by path for deterministic diffs. A legacy all-JSON state
//! file is transparently read once and rewritten delimited on the next save,
//! the way the teacher's `StateManager` always trusted `serde_json` to read
//! what it had written, just generalized here to tolerate an older format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::path::RelativePath;
use crate::types::StateEntry;

const STATE_FILE_NAME: &str = ".sync_state.csv";

/// In-memory view of the state store, keyed by path for O(log n) lookup
/// during the decide phase.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
	entries: BTreeMap<RelativePath, StateEntry>,
}

/// Legacy on-disk shape, read once for backward compatibility.
#[derive(Debug, Deserialize)]
struct LegacyState {
	files: Vec<StateEntry>,
}

impl StateStore {
	pub fn new() -> Self {
		StateStore { entries: BTreeMap::new() }
	}

	pub fn get(&self, path: &RelativePath) -> Option<&StateEntry> {
		self.entries.get(path)
	}

	pub fn insert(&mut self, entry: StateEntry) {
		self.entries.insert(entry.path.clone(), entry);
	}

	pub fn remove(&mut self, path: &RelativePath) {
		self.entries.remove(path);
	}

	pub fn iter(&self) -> impl Iterator<Item = &StateEntry> {
		self.entries.values()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn state_path(local_root: &Path) -> PathBuf {
		local_root.join(STATE_FILE_NAME)
	}

	/// Load the state store for `local_root`, tolerating a missing file
	/// (fresh sync) or a legacy JSON-shaped one.
	///
	/// A single malformed CSV line is discarded with a warning rather than
	/// failing the whole load (spec §4.2): `StateCorruption` is reserved for
	/// the file as a whole being unparseable (the legacy-JSON branch), the
	/// condition `--force` exists to recover from. Returns the store alongside
	/// any per-line warnings so the caller can surface them through its `Reporter`.
	pub async fn load(local_root: &Path) -> Result<(Self, Vec<String>), SyncError> {
		let path = Self::state_path(local_root);
		if !path.exists() {
			return Ok((StateStore::new(), Vec::new()));
		}

		let contents = tokio::fs::read_to_string(&path).await.map_err(|e| SyncError::Local {
			path: path.display().to_string(),
			source: e,
		})?;

		if contents.trim_start().starts_with('{') {
			let legacy: LegacyState =
				serde_json::from_str(&contents).map_err(|e| SyncError::StateCorruption {
					path: path.display().to_string(),
					message: e.to_string(),
				})?;
			let mut store = StateStore::new();
			for entry in legacy.files {
				store.insert(entry);
			}
			return Ok((store, Vec::new()));
		}

		let mut store = StateStore::new();
		let mut warnings = Vec::new();
		for (lineno, line) in contents.lines().enumerate() {
			if line.is_empty() {
				continue;
			}
			match parse_line(line) {
				Ok(entry) => store.insert(entry),
				Err(message) => {
					warnings.push(format!("{}:{}: discarding malformed state entry: {}", path.display(), lineno + 1, message))
				}
			}
		}
		Ok((store, warnings))
	}

	/// Persist the state store atomically: write to a scoped temp file in the
	/// same directory, then rename over the target so a crash mid-write never
	/// leaves a truncated state file behind.
	pub async fn save(&self, local_root: &Path) -> Result<(), SyncError> {
		let path = Self::state_path(local_root);
		let tmp_path = local_root.join(format!(".sync_state.csv.tmp.{}", std::process::id()));

		let mut buf = String::new();
		for entry in self.entries.values() {
			buf.push_str(entry.path.as_str());
			buf.push('\t');
			buf.push_str(&entry.mtime.to_string());
			buf.push('\t');
			buf.push_str(&entry.size.to_string());
			buf.push('\n');
		}

		tokio::fs::write(&tmp_path, buf).await.map_err(|e| SyncError::Local {
			path: tmp_path.display().to_string(),
			source: e,
		})?;
		tokio::fs::rename(&tmp_path, &path).await.map_err(|e| SyncError::Local {
			path: path.display().to_string(),
			source: e,
		})?;
		Ok(())
	}
}

/// Parse one tab-separated `path\tmtime\tsize` line, or a description of why it failed.
fn parse_line(line: &str) -> Result<StateEntry, String> {
	let mut fields = line.split('\t');
	let (Some(path_str), Some(mtime_str), Some(size_str)) = (fields.next(), fields.next(), fields.next()) else {
		return Err(format!("wrong field count: {:?}", line));
	};
	let path = RelativePath::new(path_str.to_string()).map_err(|e| e.to_string())?;
	let mtime: f64 = mtime_str.parse().map_err(|_| format!("bad mtime {:?}", mtime_str))?;
	let size: u64 = size_str.parse().map_err(|_| format!("bad size {:?}", size_str))?;
	Ok(StateEntry { path, mtime, size })
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn entry(path: &str, mtime: f64, size: u64) -> StateEntry {
		StateEntry { path: RelativePath::new(path.to_string()).unwrap(), mtime, size }
	}

	#[tokio::test]
	async fn missing_state_file_yields_empty_store() {
		let dir = TempDir::new().unwrap();
		let (store, warnings) = StateStore::load(dir.path()).await.unwrap();
		assert!(store.is_empty());
		assert!(warnings.is_empty());
	}

	#[tokio::test]
	async fn save_then_load_round_trips() {
		let dir = TempDir::new().unwrap();
		let mut store = StateStore::new();
		store.insert(entry("a/b.txt", 1000.5, 42));
		store.insert(entry("c.txt", 999.0, 0));
		store.save(dir.path()).await.unwrap();

		let (loaded, warnings) = StateStore::load(dir.path()).await.unwrap();
		assert!(warnings.is_empty());
		assert_eq!(loaded.len(), 2);
		let got = loaded.get(&RelativePath::new("a/b.txt".to_string()).unwrap()).unwrap();
		assert_eq!(got.mtime, 1000.5);
		assert_eq!(got.size, 42);
	}

	#[tokio::test]
	async fn reads_legacy_json_state_file() {
		let dir = TempDir::new().unwrap();
		let legacy = serde_json::json!({
			"files": [
				{"path": "x.txt", "mtime": 5.0, "size": 10}
			]
		});
		tokio::fs::write(dir.path().join(".sync_state.csv"), legacy.to_string()).await.unwrap();

		let (store, warnings) = StateStore::load(dir.path()).await.unwrap();
		assert!(warnings.is_empty());
		assert_eq!(store.len(), 1);
		assert!(store.get(&RelativePath::new("x.txt".to_string()).unwrap()).is_some());
	}

	/// A single malformed CSV line is discarded with a warning; every other
	/// valid entry in the file still loads (spec §4.2).
	#[tokio::test]
	async fn malformed_line_is_discarded_without_losing_the_rest() {
		let dir = TempDir::new().unwrap();
		tokio::fs::write(
			dir.path().join(".sync_state.csv"),
			"a.txt\t1000.0\t10\nnot\\enough\\fields\nb.txt\t2000.0\t20\n",
		)
		.await
		.unwrap();

		let (store, warnings) = StateStore::load(dir.path()).await.unwrap();
		assert_eq!(warnings.len(), 1);
		assert_eq!(store.len(), 2);
		assert!(store.get(&RelativePath::new("a.txt".to_string()).unwrap()).is_some());
		assert!(store.get(&RelativePath::new("b.txt".to_string()).unwrap()).is_some());
	}

	#[tokio::test]
	async fn save_leaves_no_temp_file_behind() {
		let dir = TempDir::new().unwrap();
		let mut store = StateStore::new();
		store.insert(entry("a.txt", 1.0, 1));
		store.save(dir.path()).await.unwrap();

		let mut names = tokio::fs::read_dir(dir.path()).await.unwrap();
		let mut found_tmp = false;
		while let Some(e) = names.next_entry().await.unwrap() {
			if e.file_name().to_string_lossy().contains(".tmp.") {
				found_tmp = true;
			}
		}
		assert!(!found_tmp);
	}
}

// vim: ts=4

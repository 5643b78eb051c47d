//! Gitignore-style ignore matching, plus a best-effort remote `find` filter.
//!
//! Built on the `ignore` crate (the same gitignore-matching engine ripgrep
//! uses), exactly as the teacher's own exclusion module was, generalized to
//! a single configurable ignore file rather than a fixed list of well-known
//! ignore-file names.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

use crate::error::SyncError;
use crate::path::RelativePath;

/// A fixed set of heavy directories pruned from the remote `find` invocation
/// regardless of the user's ignore file, purely as a performance shortcut —
/// `matches` remains the single source of truth for what is actually excluded.
const REMOTE_PRUNE_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv", "dist", "build"];

/// Root-level bookkeeping files the engine itself writes (state store,
/// progress checkpoint, session lock, and their atomic-write temp siblings).
/// These are never sync candidates on either side — without this, the state
/// store written at the end of one session would be discovered as a new
/// local-only file by the very next scan and get pushed.
const RESERVED_EXACT: &[&str] = &[".sync_state.csv", ".sync_progress.json", ".sync_progress.json.tmp", ".driftsync.lock"];
const RESERVED_PREFIXES: &[&str] = &[".sync_state.csv.tmp."];

fn is_reserved(path: &str) -> bool {
	RESERVED_EXACT.contains(&path) || RESERVED_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub struct IgnoreMatcher {
	gitignore: Gitignore,
	/// Directory-only user patterns (lines ending in `/`, not negated, with no
	/// embedded `/`) pulled out of the ignore file, appended to the fixed
	/// `REMOTE_PRUNE_DIRS` allowlist so the remote scan also prunes them.
	extra_prune_dirs: Vec<String>,
}

impl IgnoreMatcher {
	/// Build a matcher from an ignore file at `ignore_file` (relative to
	/// `base_path`). A missing ignore file means nothing is excluded.
	///
	/// A malformed pattern line is warned and skipped, never fatal — only a
	/// failure to read the file itself (not one of its lines) is an error.
	/// Returns the matcher alongside any per-line warnings so the caller can
	/// surface them through its `Reporter`.
	pub fn load(base_path: &Path, ignore_file: &Path) -> Result<(Self, Vec<String>), SyncError> {
		let mut builder = GitignoreBuilder::new(base_path);
		let full_path = base_path.join(ignore_file);
		let mut warnings = Vec::new();
		let mut extra_prune_dirs = Vec::new();

		if full_path.exists() {
			let contents = std::fs::read_to_string(&full_path).map_err(|e| SyncError::Other {
				message: format!("failed to read {}: {}", full_path.display(), e),
			})?;
			for (lineno, line) in contents.lines().enumerate() {
				let trimmed = line.trim();
				if trimmed.is_empty() || trimmed.starts_with('#') {
					continue;
				}
				if let Err(err) = builder.add_line(None, line) {
					warnings.push(format!(
						"{}:{}: skipping malformed ignore pattern {:?}: {}",
						full_path.display(),
						lineno + 1,
						line,
						err
					));
					continue;
				}
				if !trimmed.starts_with('!') && trimmed.ends_with('/') && !trimmed[..trimmed.len() - 1].contains('/') {
					extra_prune_dirs.push(trimmed.trim_end_matches('/').to_string());
				}
			}
		}

		let gitignore = builder
			.build()
			.map_err(|e| SyncError::Other { message: format!("failed to build ignore matcher: {}", e) })?;
		Ok((IgnoreMatcher { gitignore, extra_prune_dirs }, warnings))
	}

	/// An empty matcher that excludes nothing, for tests and no-ignore-file sessions.
	pub fn empty(base_path: &Path) -> Self {
		IgnoreMatcher {
			gitignore: GitignoreBuilder::new(base_path).build().expect("empty builder"),
			extra_prune_dirs: Vec::new(),
		}
	}

	/// Whether `path` (relative to the sync root) is excluded.
	pub fn matches(&self, path: &RelativePath, is_dir: bool) -> bool {
		is_reserved(path.as_str()) || self.gitignore.matched(path.as_str(), is_dir).is_ignore()
	}

	/// Best-effort `find`-compatible prune expression for the remote scan
	/// command: skips the obvious heavy directories, plus any directory-only
	/// pattern the ignore file itself named, up front so the listing doesn't
	/// have to walk into them. This never replaces a `matches` check — it only
	/// keeps the remote scan fast.
	pub fn remote_prune_args(&self) -> String {
		REMOTE_PRUNE_DIRS
			.iter()
			.map(|d| (*d).to_string())
			.chain(self.extra_prune_dirs.iter().cloned())
			.map(|d| format!("-name {} -prune -o", shell_quote(&d)))
			.collect::<Vec<_>>()
			.join(" ")
	}
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn excludes_matching_glob() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join(".syncignore"), "*.log\nnode_modules/\n").unwrap();
		let (matcher, warnings) = IgnoreMatcher::load(dir.path(), Path::new(".syncignore")).unwrap();

		assert!(warnings.is_empty());
		assert!(matcher.matches(&RelativePath::new("app.log".to_string()).unwrap(), false));
		assert!(matcher.matches(&RelativePath::new("node_modules".to_string()).unwrap(), true));
		assert!(!matcher.matches(&RelativePath::new("app.rs".to_string()).unwrap(), false));
	}

	#[test]
	fn negation_overrides_earlier_exclusion() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join(".syncignore"), "*.log\n!keep.log\n").unwrap();
		let (matcher, _) = IgnoreMatcher::load(dir.path(), Path::new(".syncignore")).unwrap();

		assert!(matcher.matches(&RelativePath::new("app.log".to_string()).unwrap(), false));
		assert!(!matcher.matches(&RelativePath::new("keep.log".to_string()).unwrap(), false));
	}

	#[test]
	fn missing_ignore_file_excludes_nothing() {
		let dir = TempDir::new().unwrap();
		let (matcher, warnings) = IgnoreMatcher::load(dir.path(), Path::new(".syncignore")).unwrap();
		assert!(warnings.is_empty());
		assert!(!matcher.matches(&RelativePath::new("anything.txt".to_string()).unwrap(), false));
	}

	/// A malformed pattern line is warned and skipped, never fatal (spec §4.1):
	/// the rest of the file still loads and still excludes what it names.
	#[test]
	fn malformed_line_is_warned_and_skipped_not_fatal() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join(".syncignore"), "*.log\n[unterminated\nnode_modules/\n").unwrap();
		let (matcher, warnings) = IgnoreMatcher::load(dir.path(), Path::new(".syncignore")).unwrap();

		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].contains("line 2") || warnings[0].contains(":2:"));
		assert!(matcher.matches(&RelativePath::new("app.log".to_string()).unwrap(), false));
		assert!(matcher.matches(&RelativePath::new("node_modules".to_string()).unwrap(), true));
	}

	#[test]
	fn remote_prune_args_contains_heavy_dirs() {
		let dir = TempDir::new().unwrap();
		let matcher = IgnoreMatcher::empty(dir.path());
		let args = matcher.remote_prune_args();
		assert!(args.contains(".git"));
		assert!(args.contains("node_modules"));
	}

	/// `remote_prune_args` also emits directory-only user patterns from the
	/// ignore file, not just the fixed heavy-directory allowlist.
	#[test]
	fn remote_prune_args_includes_user_directory_patterns() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join(".syncignore"), "vendor/\n*.log\n!keep/\nnested/dir/\n").unwrap();
		let (matcher, _) = IgnoreMatcher::load(dir.path(), Path::new(".syncignore")).unwrap();
		let args = matcher.remote_prune_args();

		assert!(args.contains("-name 'vendor' -prune -o"));
		// a negated pattern and one with an embedded '/' are not directory-prune candidates.
		assert!(!args.contains("'keep'"));
		assert!(!args.contains("'nested/dir'"));
	}

	#[test]
	fn own_bookkeeping_files_are_always_excluded() {
		let dir = TempDir::new().unwrap();
		let matcher = IgnoreMatcher::empty(dir.path());
		assert!(matcher.matches(&RelativePath::new(".sync_state.csv".to_string()).unwrap(), false));
		assert!(matcher.matches(&RelativePath::new(".sync_state.csv.tmp.1234".to_string()).unwrap(), false));
		assert!(matcher.matches(&RelativePath::new(".sync_progress.json".to_string()).unwrap(), false));
		assert!(matcher.matches(&RelativePath::new(".driftsync.lock".to_string()).unwrap(), false));
		assert!(!matcher.matches(&RelativePath::new("regular.txt".to_string()).unwrap(), false));
	}
}

// vim: ts=4

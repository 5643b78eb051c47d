//! Local filesystem scanner.
//!
//! Walks `local_root` asynchronously with `tokio::fs`, consulting the ignore
//! matcher per entry so excluded directories are never even descended into —
//! the cheapest way to guarantee ignore soundness (an ignored path can never
//! reach the decider because it is never in the scan result at all).

use std::path::Path;

use crate::error::SyncError;
use crate::ignore::IgnoreMatcher;
use crate::path::RelativePath;
use crate::types::PathFingerprint;

/// Recursively scan `root`, returning a fingerprint for every regular file
/// not excluded by `ignore`. Symlinks are followed if they resolve to a
/// regular file, and silently skipped if broken or if they resolve to
/// anything else (directories, sockets, etc.) — one extra `metadata` call
/// per symlink, as opposed to the single `symlink_metadata` call paid by
/// every other entry.
pub async fn scan_local(root: &Path, ignore: &IgnoreMatcher) -> Result<Vec<PathFingerprint>, SyncError> {
	let mut out = Vec::new();
	let mut stack = vec![(root.to_path_buf(), RelativePathPrefix::root())];

	while let Some((dir, prefix)) = stack.pop() {
		let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| SyncError::Local {
			path: dir.display().to_string(),
			source: e,
		})?;

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| SyncError::Local { path: dir.display().to_string(), source: e })?
		{
			let file_name = entry.file_name();
			let Some(name) = file_name.to_str() else { continue };
			let rel_str = prefix.join(name);
			let Ok(rel) = RelativePath::new(rel_str.clone()) else { continue };

			let symlink_meta = match entry.metadata().await {
				Ok(m) => m,
				Err(_) => continue,
			};

			if symlink_meta.is_dir() {
				if ignore.matches(&rel, true) {
					continue;
				}
				stack.push((entry.path(), RelativePathPrefix(rel_str)));
				continue;
			}

			if ignore.matches(&rel, false) {
				continue;
			}

			let meta = if symlink_meta.file_type().is_symlink() {
				match tokio::fs::metadata(entry.path()).await {
					Ok(m) if m.is_file() => m,
					_ => continue,
				}
			} else if symlink_meta.is_file() {
				symlink_meta
			} else {
				continue;
			};

			let mtime = meta
				.modified()
				.ok()
				.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
				.map(|d| d.as_secs_f64())
				.unwrap_or(0.0);

			out.push(PathFingerprint { path: rel, mtime, size: meta.len() });
		}
	}

	Ok(out)
}

struct RelativePathPrefix(String);

impl RelativePathPrefix {
	fn root() -> Self {
		RelativePathPrefix(String::new())
	}

	fn join(&self, name: &str) -> String {
		if self.0.is_empty() {
			name.to_string()
		} else {
			format!("{}/{}", self.0, name)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::Path as StdPath;
	use tempfile::TempDir;

	async fn write(dir: &StdPath, rel: &str, contents: &str) {
		let path = dir.join(rel);
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await.unwrap();
		}
		tokio::fs::write(path, contents).await.unwrap();
	}

	#[tokio::test]
	async fn finds_nested_files() {
		let dir = TempDir::new().unwrap();
		write(dir.path(), "a.txt", "hi").await;
		write(dir.path(), "sub/b.txt", "there").await;

		let ignore = IgnoreMatcher::empty(dir.path());
		let mut found = scan_local(dir.path(), &ignore).await.unwrap();
		found.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));

		assert_eq!(found.len(), 2);
		assert_eq!(found[0].path.as_str(), "a.txt");
		assert_eq!(found[1].path.as_str(), "sub/b.txt");
		assert_eq!(found[0].size, 2);
	}

	#[tokio::test]
	async fn ignored_subtree_is_never_descended() {
		let dir = TempDir::new().unwrap();
		write(dir.path(), "keep.txt", "k").await;
		write(dir.path(), "node_modules/pkg/index.js", "x").await;
		tokio::fs::write(dir.path().join(".syncignore"), "node_modules/\n").await.unwrap();

		let (ignore, _) = IgnoreMatcher::load(dir.path(), StdPath::new(".syncignore")).unwrap();
		let found = scan_local(dir.path(), &ignore).await.unwrap();

		assert!(found.iter().any(|f| f.path.as_str() == "keep.txt"));
		assert!(!found.iter().any(|f| f.path.as_str().starts_with("node_modules")));
	}

	#[tokio::test]
	async fn broken_symlink_is_skipped() {
		let dir = TempDir::new().unwrap();
		write(dir.path(), "real.txt", "r").await;
		#[cfg(unix)]
		{
			std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();
		}

		let ignore = IgnoreMatcher::empty(dir.path());
		let found = scan_local(dir.path(), &ignore).await.unwrap();

		assert!(found.iter().any(|f| f.path.as_str() == "real.txt"));
		assert!(!found.iter().any(|f| f.path.as_str() == "dangling"));
	}
}

// vim: ts=4

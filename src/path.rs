//! Validated relative path type shared by the state store, decider and executor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Error returned when a string or path cannot be used as a sync-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
	Empty,
	Absolute,
	DotComponent,
	BackslashSeparator,
}

impl fmt::Display for PathError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathError::Empty => write!(f, "path is empty"),
			PathError::Absolute => write!(f, "path must be relative, not start with '/'"),
			PathError::DotComponent => write!(f, "path contains a '.' or '..' component"),
			PathError::BackslashSeparator => write!(f, "path must use '/' separators"),
		}
	}
}

impl std::error::Error for PathError {}

/// A path relative to a sync root, using POSIX `/` separators.
///
/// Construction is fallible and rejects anything that could escape the sync
/// root or be ambiguous between local and remote representations: absolute
/// paths, `.`/`..` components, and backslash separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
	pub fn new(s: impl Into<String>) -> Result<Self, PathError> {
		let s = s.into();
		if s.is_empty() {
			return Err(PathError::Empty);
		}
		if s.starts_with('/') {
			return Err(PathError::Absolute);
		}
		if s.contains('\\') {
			return Err(PathError::BackslashSeparator);
		}
		if s.split('/').any(|part| part == "." || part == "..") {
			return Err(PathError::DotComponent);
		}
		Ok(RelativePath(s))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Join this relative path onto a local filesystem root.
	pub fn to_local(&self, root: &Path) -> PathBuf {
		root.join(&self.0)
	}

	/// Parent directory as a `RelativePath`, or `None` at the root.
	pub fn parent(&self) -> Option<RelativePath> {
		match self.0.rsplit_once('/') {
			Some((parent, _)) if !parent.is_empty() => Some(RelativePath(parent.to_string())),
			_ => None,
		}
	}

	pub fn file_name(&self) -> &str {
		self.0.rsplit('/').next().unwrap_or(&self.0)
	}
}

impl fmt::Display for RelativePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl TryFrom<String> for RelativePath {
	type Error = PathError;
	fn try_from(s: String) -> Result<Self, PathError> {
		RelativePath::new(s)
	}
}

impl From<RelativePath> for String {
	fn from(p: RelativePath) -> String {
		p.0
	}
}


// vim: ts=4

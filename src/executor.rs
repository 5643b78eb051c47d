//! Executor: turns decided actions into the minimum number of batched
//! network operations.
//!
//! PUSH and PULL move data as one tar+gzip bundle per batch, the "tar,
//! gzip-compressed" format called for in the design notes; deletes are a
//! single `rm -f` (remote) or a local removal loop. Phases run strictly in
//! the order the orchestrator requires: conflicts, push, pull, delete-remote,
//! delete-local, so that conflict artifacts land on disk before anything
//! else in the same run can touch the paths next to them.

use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::conflict;
use crate::delete;
use crate::error::SyncError;
use crate::path::RelativePath;
use crate::progress::ProgressStore;
use crate::reporter::{BatchFailure, Reporter};
use crate::state::StateStore;
use crate::transport::{self, RemoteSession};
use crate::types::{Action, ActionKind, ProgressStatus, RemoteTempPaths};

use crate::config::SyncConfig;

pub struct ExecutionSummary {
	pub pushed: usize,
	pub pulled: usize,
	pub deleted_local: usize,
	pub deleted_remote: usize,
	pub conflicts: usize,
}

/// Everything a batch needs to do its work. Borrowed for the duration of one
/// `execute` call; the orchestrator owns the state/progress stores and
/// flushes them itself around phase boundaries.
pub struct ExecutorContext<'a> {
	pub local_root: &'a Path,
	pub remote_root: &'a str,
	pub session: &'a dyn RemoteSession,
	pub remote_temp: &'a RemoteTempPaths,
	pub state: &'a mut StateStore,
	pub progress: &'a mut ProgressStore,
	pub reporter: &'a dyn Reporter,
	pub config: &'a SyncConfig,
}

/// Run every action in the fixed phase order and return a summary.
///
/// Actions already recorded `done` in the progress store for the same
/// `(path, direction)` are dropped before batching (resume integration).
/// A batch failure returns immediately as an error; phases that already
/// completed remain committed, since state and progress are flushed
/// per-path as each batch finishes.
pub async fn execute(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<ExecutionSummary, SyncError> {
	let actions = drop_resumed(actions, ctx.progress);

	let mut conflicts = Vec::new();
	let mut pushes = Vec::new();
	let mut pulls = Vec::new();
	let mut delete_remote = Vec::new();
	let mut delete_local = Vec::new();

	for action in actions {
		match action.kind {
			ActionKind::Conflict => conflicts.push(action),
			ActionKind::Push => pushes.push(action),
			ActionKind::Pull => pulls.push(action),
			ActionKind::DeleteRemote => delete_remote.push(action),
			ActionKind::DeleteLocal => delete_local.push(action),
			// A `Skip` either adopts a fingerprint (first-sight, both sides
			// already identical, no stored state), drops one (absent on both
			// sides: spec.md §4.5's "SKIP (and drop state entry)" row), or
			// does neither (already unchanged vs. a valid state entry).
			ActionKind::Skip => {
				if action.drop_state {
					ctx.state.remove(&action.path);
				} else if let Some(fingerprint) = action.source {
					ctx.state.insert(fingerprint);
				}
			}
		}
	}

	// `total_files` must describe the population the deletes are being measured
	// against, not include the deletes themselves — otherwise a delete-only run
	// (state.len() == delete_count, pushes/pulls empty) always computes 100%.
	let delete_count = delete_remote.len() + delete_local.len();
	let surviving = ctx.state.len().saturating_sub(delete_count) + pushes.len() + pulls.len();
	delete::check_allowed(&ctx.config.delete_protection, delete_count, surviving)
		.map_err(|e| SyncError::Other { message: e.to_string() })?;

	let conflict_count = run_conflicts(conflicts, ctx).await?;
	let pushed = run_push_batch(pushes, ctx).await?;
	let pulled = run_pull_batch(pulls, ctx).await?;
	let deleted_remote = run_delete_remote(delete_remote, ctx).await?;
	let deleted_local = run_delete_local(delete_local, ctx).await?;

	Ok(ExecutionSummary { pushed, pulled, deleted_local, deleted_remote, conflicts: conflict_count })
}

fn drop_resumed(actions: Vec<Action>, progress: &ProgressStore) -> Vec<Action> {
	actions.into_iter().filter(|a| !progress.is_done(&a.path, a.kind)).collect()
}

async fn run_conflicts(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}
	ctx.reporter.batch_started(ActionKind::Conflict, actions.len());
	let mut recorded = 0;

	for action in &actions {
		let remote = action.source.clone().ok_or_else(|| SyncError::Other {
			message: format!("conflict action for {} missing remote fingerprint", action.path.as_str()),
		})?;
		let remote_path = format!("{}/{}", ctx.remote_root, action.path.as_str());
		let cmd = format!("cat {}", shell_quote(&remote_path));
		let session = ctx.session;
		let output = match transport::retry_with_config(ctx.config, move || {
			let cmd = cmd.clone();
			async move { session.exec(&cmd).await }
		})
		.await
		{
			Ok(o) => o,
			Err(e) => {
				ctx.progress.record(&action.path, ActionKind::Conflict, ProgressStatus::Failed).await?;
				let failure = BatchFailure { message: e.to_string() };
				ctx.reporter.batch_done(ActionKind::Conflict, actions.len(), Some(&failure));
				return Err(SyncError::Transport(e));
			}
		};
		if !output.success {
			ctx.progress.record(&action.path, ActionKind::Conflict, ProgressStatus::Failed).await?;
			let failure = BatchFailure { message: String::from_utf8_lossy(&output.stderr).to_string() };
			ctx.reporter.batch_done(ActionKind::Conflict, actions.len(), Some(&failure));
			return Err(SyncError::Remote { message: failure.message });
		}

		// Writing the conflict artifact is local I/O touching only this one
		// path (spec.md §7: "LocalError ... fatal unless isolated to one
		// artifact (conflict write), which degrades to a warning"). A
		// disk-full/permission failure here must not abort batches that
		// haven't run yet, so it is warned and the loop continues rather
		// than `?`-propagated.
		let artifact = conflict::artifact_for(&action.path);
		match conflict::record_conflict(ctx.local_root, &artifact, action.local.as_ref(), &remote, &output.stdout).await {
			Ok(()) => {
				ctx.reporter.conflict(&action.path, &artifact.token);
				ctx.progress.record(&action.path, ActionKind::Conflict, ProgressStatus::Done).await?;
				recorded += 1;
			}
			Err(e) => {
				ctx.reporter.warn(&format!(
					"failed to write conflict artifact for {}: {} (continuing)",
					action.path.as_str(),
					e
				));
				ctx.progress.record(&action.path, ActionKind::Conflict, ProgressStatus::Failed).await?;
			}
		}
	}

	ctx.reporter.batch_done(ActionKind::Conflict, actions.len(), None);
	Ok(recorded)
}

async fn run_push_batch(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}
	let mut sorted = actions;
	sorted.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
	let batches = split_by_size(sorted, ctx.config.batch_high_water_mark);

	let total: usize = batches.iter().map(|b| b.len()).sum();
	ctx.reporter.batch_started(ActionKind::Push, total);

	for (i, batch) in batches.into_iter().enumerate() {
		let bundle_path = build_local_bundle(ctx.local_root, &batch)?;
		let remote_bundle = format!("{}.{}", ctx.remote_temp.push_bundle, i);

		let session = ctx.session;
		let bundle_path_for_upload = bundle_path.clone();
		let remote_bundle_for_upload = remote_bundle.clone();
		let upload = transport::retry_with_config(ctx.config, move || {
			let bundle_path = bundle_path_for_upload.clone();
			let remote_bundle = remote_bundle_for_upload.clone();
			async move { session.upload(&bundle_path, &remote_bundle).await }
		})
		.await;
		let _ = tokio::fs::remove_file(&bundle_path).await;
		if let Err(e) = upload {
			mark_batch_failed(&batch, ctx.progress, ActionKind::Push, &e.to_string()).await?;
			ctx.reporter.batch_done(ActionKind::Push, total, Some(&BatchFailure { message: e.to_string() }));
			return Err(SyncError::Transport(e));
		}

		let extract_cmd = format!(
			"cd {} && tar -xzf {} && rm -f {}",
			shell_quote(ctx.remote_root),
			shell_quote(&remote_bundle),
			shell_quote(&remote_bundle)
		);
		let output = transport::retry_with_config(ctx.config, move || {
			let cmd = extract_cmd.clone();
			async move { session.exec(&cmd).await }
		})
		.await
		.map_err(SyncError::Transport)?;
		if !output.success {
			let message = String::from_utf8_lossy(&output.stderr).to_string();
			mark_batch_failed(&batch, ctx.progress, ActionKind::Push, &message).await?;
			ctx.reporter.batch_done(ActionKind::Push, total, Some(&BatchFailure { message: message.clone() }));
			return Err(SyncError::Remote { message });
		}

		for action in &batch {
			if let Some(fingerprint) = &action.source {
				ctx.state.insert(fingerprint.clone());
			}
			ctx.progress.record(&action.path, ActionKind::Push, ProgressStatus::Done).await?;
		}
	}

	ctx.reporter.batch_done(ActionKind::Push, total, None);
	Ok(total)
}

async fn run_pull_batch(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}
	let mut sorted = actions;
	sorted.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
	let batches = split_by_size(sorted, ctx.config.batch_high_water_mark);

	let total: usize = batches.iter().map(|b| b.len()).sum();
	ctx.reporter.batch_started(ActionKind::Pull, total);

	for (i, batch) in batches.into_iter().enumerate() {
		let remote_bundle = format!("{}.{}", ctx.remote_temp.pull_bundle, i);
		let quoted_paths: Vec<String> = batch.iter().map(|a| shell_quote(a.path.as_str())).collect();
		let pack_cmd = format!(
			"cd {} && tar -czf {} {}",
			shell_quote(ctx.remote_root),
			shell_quote(&remote_bundle),
			quoted_paths.join(" ")
		);
		let session = ctx.session;
		let output = transport::retry_with_config(ctx.config, move || {
			let cmd = pack_cmd.clone();
			async move { session.exec(&cmd).await }
		})
		.await
		.map_err(SyncError::Transport)?;
		if !output.success {
			let message = String::from_utf8_lossy(&output.stderr).to_string();
			mark_batch_failed(&batch, ctx.progress, ActionKind::Pull, &message).await?;
			ctx.reporter.batch_done(ActionKind::Pull, total, Some(&BatchFailure { message: message.clone() }));
			return Err(SyncError::Remote { message });
		}

		let local_bundle = std::env::temp_dir().join(format!("driftsync_pull_{}_{}.tar.gz", std::process::id(), i));
		let remote_bundle_for_download = remote_bundle.clone();
		let local_bundle_for_download = local_bundle.clone();
		let download = transport::retry_with_config(ctx.config, move || {
			let remote_bundle = remote_bundle_for_download.clone();
			let local_bundle = local_bundle_for_download.clone();
			async move { session.download(&remote_bundle, &local_bundle).await }
		})
		.await;
		if let Err(e) = download {
			mark_batch_failed(&batch, ctx.progress, ActionKind::Pull, &e.to_string()).await?;
			ctx.reporter.batch_done(ActionKind::Pull, total, Some(&BatchFailure { message: e.to_string() }));
			return Err(SyncError::Transport(e));
		}

		let extract_result = extract_bundle(&local_bundle, ctx.local_root);
		let _ = tokio::fs::remove_file(&local_bundle).await;
		let _ = session.exec(&format!("rm -f {}", shell_quote(&remote_bundle))).await;
		extract_result?;

		for action in &batch {
			if let Some(fingerprint) = &action.source {
				ctx.state.insert(fingerprint.clone());
			}
			ctx.progress.record(&action.path, ActionKind::Pull, ProgressStatus::Done).await?;
		}
	}

	ctx.reporter.batch_done(ActionKind::Pull, total, None);
	Ok(total)
}

async fn run_delete_remote(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}
	ctx.reporter.batch_started(ActionKind::DeleteRemote, actions.len());

	let quoted: Vec<String> =
		actions.iter().map(|a| shell_quote(&format!("{}/{}", ctx.remote_root, a.path.as_str()))).collect();
	let cmd = format!("rm -f {}", quoted.join(" "));
	let session = ctx.session;
	let output = transport::retry_with_config(ctx.config, move || {
		let cmd = cmd.clone();
		async move { session.exec(&cmd).await }
	})
	.await
	.map_err(SyncError::Transport)?;
	if !output.success {
		let message = String::from_utf8_lossy(&output.stderr).to_string();
		mark_batch_failed(&actions, ctx.progress, ActionKind::DeleteRemote, &message).await?;
		ctx.reporter.batch_done(ActionKind::DeleteRemote, actions.len(), Some(&BatchFailure { message: message.clone() }));
		return Err(SyncError::Remote { message });
	}

	for action in &actions {
		ctx.state.remove(&action.path);
		ctx.progress.record(&action.path, ActionKind::DeleteRemote, ProgressStatus::Done).await?;
	}

	ctx.reporter.batch_done(ActionKind::DeleteRemote, actions.len(), None);
	Ok(actions.len())
}

async fn run_delete_local(actions: Vec<Action>, ctx: &mut ExecutorContext<'_>) -> Result<usize, SyncError> {
	if actions.is_empty() {
		return Ok(0);
	}
	ctx.reporter.batch_started(ActionKind::DeleteLocal, actions.len());

	for action in &actions {
		let abs = action.path.to_local(ctx.local_root);
		if let Err(e) = tokio::fs::remove_file(&abs).await {
			if e.kind() != std::io::ErrorKind::NotFound {
				let message = e.to_string();
				ctx.progress.record(&action.path, ActionKind::DeleteLocal, ProgressStatus::Failed).await?;
				ctx.reporter.batch_done(ActionKind::DeleteLocal, actions.len(), Some(&BatchFailure { message: message.clone() }));
				return Err(SyncError::Local { path: abs.display().to_string(), source: e });
			}
		}
		ctx.state.remove(&action.path);
		ctx.progress.record(&action.path, ActionKind::DeleteLocal, ProgressStatus::Done).await?;
	}

	ctx.reporter.batch_done(ActionKind::DeleteLocal, actions.len(), None);
	Ok(actions.len())
}

async fn mark_batch_failed(
	batch: &[Action],
	progress: &mut ProgressStore,
	kind: ActionKind,
	_message: &str,
) -> Result<(), SyncError> {
	for action in batch {
		progress.record(&action.path, kind, ProgressStatus::Failed).await?;
	}
	Ok(())
}

/// Split a sorted batch of actions into chunks whose cumulative source size
/// stays under `high_water_mark`, so no single archive (or the memory to
/// build it) grows unbounded.
fn split_by_size(actions: Vec<Action>, high_water_mark: u64) -> Vec<Vec<Action>> {
	let mut batches = Vec::new();
	let mut current = Vec::new();
	let mut current_size: u64 = 0;

	for action in actions {
		let size = action.source.as_ref().map(|f| f.size).unwrap_or(0);
		if !current.is_empty() && current_size.saturating_add(size) > high_water_mark {
			batches.push(std::mem::take(&mut current));
			current_size = 0;
		}
		current_size += size;
		current.push(action);
	}
	if !current.is_empty() {
		batches.push(current);
	}
	batches
}

/// Build a local tar+gzip bundle containing every path in `batch`, entries
/// written in the already-sorted order so the archive is byte-deterministic.
fn build_local_bundle(local_root: &Path, batch: &[Action]) -> Result<PathBuf, SyncError> {
	let bundle_path =
		std::env::temp_dir().join(format!("driftsync_push_{}_{}.tar.gz", std::process::id(), uuid::Uuid::new_v4()));
	let file = std::fs::File::create(&bundle_path).map_err(|e| SyncError::Local {
		path: bundle_path.display().to_string(),
		source: e,
	})?;
	let encoder = GzEncoder::new(file, Compression::default());
	let mut builder = tar::Builder::new(encoder);

	for action in batch {
		let abs = action.path.to_local(local_root);
		builder.append_path_with_name(&abs, action.path.as_str()).map_err(|e| SyncError::Local {
			path: abs.display().to_string(),
			source: e,
		})?;
	}

	builder.into_inner().and_then(|enc| enc.finish()).map_err(|e| SyncError::Local {
		path: bundle_path.display().to_string(),
		source: e,
	})?;

	Ok(bundle_path)
}

/// Extract a downloaded tar+gzip bundle into `local_root`.
fn extract_bundle(bundle_path: &Path, local_root: &Path) -> Result<(), SyncError> {
	let file = std::fs::File::open(bundle_path).map_err(|e| SyncError::Local {
		path: bundle_path.display().to_string(),
		source: e,
	})?;
	let decoder = GzDecoder::new(file);
	let mut archive = tar::Archive::new(decoder);
	archive.unpack(local_root).map_err(|e| SyncError::Local { path: local_root.display().to_string(), source: e })
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', "'\\''"))
}


// vim: ts=4

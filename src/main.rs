use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};

use driftsync::{run_sync, Reporter, SshRemoteSession, SyncConfig, TracingReporter};

fn build_cli() -> Command {
	Command::new("driftsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Bidirectional directory synchronizer over SSH")
		.subcommand_required(true)
		.subcommand(
			Command::new("sync")
				.about("Sync a local directory with a remote one")
				.arg(Arg::new("local").required(true).help("Local directory to sync"))
				.arg(Arg::new("server").required(true).help("Remote host (user@host or host)"))
				.arg(Arg::new("remote").required(true).help("Remote directory to sync"))
				.arg(Arg::new("port").long("port").short('p').value_name("PORT"))
				.arg(Arg::new("ignore-file").long("ignore-file").value_name("PATH").default_value(".syncignore"))
				.arg(Arg::new("push-only").long("push-only").action(ArgAction::SetTrue))
				.arg(Arg::new("pull-only").long("pull-only").action(ArgAction::SetTrue))
				.arg(Arg::new("force").long("force").action(ArgAction::SetTrue))
				.arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue))
				.arg(Arg::new("verbose").long("verbose").short('v').action(ArgAction::SetTrue)),
		)
}

fn parse_server(raw: &str) -> (String, Option<String>) {
	match raw.split_once('@') {
		Some((user, host)) => (host.to_string(), Some(user.to_string())),
		None => (raw.to_string(), None),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	driftsync::logging::init_tracing();
	driftsync::utils::setup_signal_handlers();

	let matches = build_cli().get_matches();
	let Some(matches) = matches.subcommand_matches("sync") else {
		return Ok(());
	};

	let local_root = PathBuf::from(matches.get_one::<String>("local").expect("required"));
	let remote_root = matches.get_one::<String>("remote").expect("required").clone();
	let (server, username) = parse_server(matches.get_one::<String>("server").expect("required"));
	let port = matches.get_one::<String>("port").and_then(|p| p.parse().ok());

	let config = SyncConfig {
		local_root,
		server,
		remote_root,
		username,
		port,
		ignore_file: PathBuf::from(matches.get_one::<String>("ignore-file").expect("has default")),
		push_only: matches.get_flag("push-only"),
		pull_only: matches.get_flag("pull-only"),
		force: matches.get_flag("force"),
		dry_run: matches.get_flag("dry-run"),
		verbose: matches.get_flag("verbose"),
		..SyncConfig::default()
	};

	let session = Arc::new(SshRemoteSession::new(
		config.server.clone(),
		config.port,
		config.username.clone(),
		Duration::from_secs(config.remote_command_timeout_secs),
	));
	let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);

	match run_sync(&config, session, reporter).await {
		Ok(summary) => {
			println!(
				"pushed {} pulled {} deleted {} conflicts {}",
				summary.pushed,
				summary.pulled,
				summary.deleted_local + summary.deleted_remote,
				summary.conflicts
			);
			Ok(())
		}
		Err(e) => {
			eprintln!("driftsync: {}", e);
			std::process::exit(1);
		}
	}
}

// vim: ts=4

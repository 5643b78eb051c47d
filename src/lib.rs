//! # driftsync - bidirectional directory synchronizer over SSH
//!
//! driftsync keeps a local directory tree and a remote directory tree (over
//! plain `ssh`) in sync by comparing file fingerprints against the last
//! successfully synced state, in both directions at once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use driftsync::{run_sync, Reporter, SyncConfig, TracingReporter, SshRemoteSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig {
//!         local_root: "./project".into(),
//!         server: "build-host".into(),
//!         remote_root: "/srv/project".into(),
//!         ..Default::default()
//!     };
//!     let session = Arc::new(SshRemoteSession::new(
//!         config.server.clone(),
//!         config.port,
//!         config.username.clone(),
//!         std::time::Duration::from_secs(config.remote_command_timeout_secs),
//!     ));
//!     let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);
//!     let summary = run_sync(&config, session, reporter).await?;
//!     println!("pushed {} pulled {}", summary.pushed, summary.pulled);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod config;
pub mod conflict;
pub mod decider;
pub mod delete;
pub mod error;
pub mod executor;
pub mod ignore;
pub mod logging;
pub mod orchestrator;
pub mod path;
pub mod progress;
pub mod reporter;
pub mod scan;
pub mod state;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export the commonly used top-level entry points.
pub use config::SyncConfig;
pub use error::SyncError;
pub use executor::ExecutionSummary;
pub use orchestrator::run_sync;
pub use path::RelativePath;
pub use reporter::{Reporter, TracingReporter};
pub use transport::{RemoteSession, SshRemoteSession};

// vim: ts=4

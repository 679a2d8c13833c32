use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use statesync_engine::{EngineConfig, UserMigration};

/// Configuration for the statesync command-line driver.
#[derive(Parser, Debug, Clone)]
#[command(name = "statesync")]
#[command(about = "Keep a local JSON state file in sync with a remote project file", version)]
pub struct Config {
    /// Root URL of the project-file service
    #[arg(long, env = "STATESYNC_BASE_URL")]
    pub base_url: String,

    /// Bearer token for the project-file service
    #[arg(long, env = "STATESYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Project holding the backing file
    #[arg(long, env = "STATESYNC_PROJECT_ID")]
    pub project_id: String,

    /// Logical key of the synchronized state
    #[arg(long, default_value = "state", env = "STATESYNC_STORAGE_KEY")]
    pub storage_key: String,

    /// Prefix of provisioned file names
    #[arg(long, default_value = "data", env = "STATESYNC_FILE_PREFIX")]
    pub file_prefix: String,

    /// Keep one backing file per user
    #[arg(long, env = "STATESYNC_PER_USER")]
    pub per_user: bool,

    /// Seed a new per-user file from the shared one
    #[arg(long, env = "STATESYNC_COPY_SHARED", requires = "per_user")]
    pub copy_shared: bool,

    /// Autosave interval (seconds, 0 disables)
    #[arg(long, default_value = "30", env = "STATESYNC_AUTOSAVE_SECS")]
    pub autosave_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write the remote state to a local file
    Pull { path: PathBuf },
    /// Replace the remote state with a local file
    Push { path: PathBuf },
    /// Show the backing file's metadata
    Metadata,
    /// Mirror a local file to the remote state until interrupted
    Watch {
        path: PathBuf,
        /// Polling interval for local changes (seconds)
        #[arg(long, default_value = "2")]
        poll_secs: u64,
    },
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        let migration = if self.copy_shared {
            UserMigration::CopyShared
        } else {
            UserMigration::StartFresh
        };
        EngineConfig::new(&self.project_id, &self.storage_key)
            .with_file_prefix(&self.file_prefix)
            .with_per_user(self.per_user)
            .with_user_migration(migration)
            .with_autosave_interval(Duration::from_secs(self.autosave_secs))
    }
}

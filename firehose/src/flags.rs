//! Command line flags a host node flattens into its own parser.
//!
//! Flags are optional overrides on top of the JSON settings given by `--firehose-config`,
//! settings untouched by a flag keep the file (or default) value.

use clap::Args;
use std::path::PathBuf;

use crate::config::Settings;

/// Firehose command line flags
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Firehose")]
pub struct FirehoseArgs {
    /// Enable the Firehose instrumentation
    #[arg(
        long = "firehose-enabled",
        env = "FIREHOSE_ENABLED",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub enabled: Option<bool>,

    /// Print the trace of synced blocks, turn off on miner nodes doing speculative execution only
    #[arg(
        long = "firehose-sync-instrumentation",
        env = "FIREHOSE_SYNC_INSTRUMENTATION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub sync_instrumentation: Option<bool>,

    /// Keep mining enabled while Firehose is active (local development only)
    #[arg(
        long = "firehose-mining-enabled",
        env = "FIREHOSE_MINING_ENABLED",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub mining_enabled: Option<bool>,

    /// Print only the FINALIZE_BLOCK line, takes effect when Firehose itself is disabled
    #[arg(
        long = "firehose-block-progress",
        env = "FIREHOSE_BLOCK_PROGRESS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub block_progress: Option<bool>,

    /// Genesis JSON file, for chains the node has no built-in genesis for
    #[arg(long = "firehose-genesis-file", env = "FIREHOSE_GENESIS_FILE", value_name = "FILE")]
    pub genesis_file: Option<PathBuf>,

    /// Trace output file, stdout when absent
    #[arg(long = "firehose-output", env = "FIREHOSE_OUTPUT", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// JSON settings file the other flags override
    #[arg(long = "firehose-config", env = "FIREHOSE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl FirehoseArgs {
    /// Resolves the flags into [`Settings`], starting from the `--firehose-config` file when
    /// given
    pub fn into_settings(self) -> eyre::Result<Settings> {
        let mut settings = Settings::load_or_default(self.config.as_ref())?;

        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(enabled) = self.sync_instrumentation {
            settings.sync_instrumentation_enabled = enabled;
        }
        if let Some(enabled) = self.mining_enabled {
            settings.mining_enabled = enabled;
        }
        if let Some(enabled) = self.block_progress {
            settings.block_progress_enabled = enabled;
        }
        if self.genesis_file.is_some() {
            settings.genesis_file = self.genesis_file;
        }
        if self.output.is_some() {
            settings.output_path = self.output;
        }

        Ok(settings)
    }
}

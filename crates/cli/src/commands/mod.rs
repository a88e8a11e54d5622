//! CLI command definitions and execution
//!
//! Every store-backed command opens a [`Store`] from the saved configuration,
//! with the global `--bucket`, `--prefix` and `--endpoint` flags layered on top.

use bk_core::{Config, ConfigManager, Error, Store};
use bk_s3::S3Backend;
use clap::{Args, Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod config;
mod exists;
mod get;
mod load;
mod ls;
mod put;
mod rm;
mod tree;

/// bk - bucketkit command-line client
///
/// Lists, loads and uploads objects in S3-compatible storage, decoding
/// JSON, CSV, Parquet and spreadsheet payloads by key extension.
#[derive(Parser, Debug)]
#[command(name = "bk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the saved configuration
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Bucket to operate on
    #[arg(long, global = true, env = "BK_BUCKET")]
    pub bucket: Option<String>,

    /// Key prefix prepended to every relative key
    #[arg(long, global = true, env = "BK_PREFIX")]
    pub prefix: Option<String>,

    /// Custom S3-compatible endpoint URL
    #[arg(long, global = true, env = "BK_ENDPOINT")]
    pub endpoint: Option<String>,
}

impl StoreArgs {
    /// Layer these overrides onto a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(bucket) = &self.bucket {
            config.store.bucket = Some(bucket.clone());
        }
        if let Some(prefix) = &self.prefix {
            config.store.key_prefix = prefix.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.connection.endpoint = Some(endpoint.clone());
            config.connection.path_style = true;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List objects under a prefix
    Ls(ls::LsArgs),

    /// Display objects under a prefix as a size-annotated tree
    Tree(tree::TreeArgs),

    /// Check whether an object exists
    Exists(exists::ExistsArgs),

    /// Remove objects
    Rm(rm::RmArgs),

    /// Download objects to local files
    Get(get::GetArgs),

    /// Upload local files
    Put(put::PutArgs),

    /// Fetch an object and decode it by extension
    Load(load::LoadArgs),

    /// Show or initialize the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Config(cmd) => config::execute(cmd, &cli.store, output_config),
        command => run(command, &cli.store, output_config).await,
    }
}

async fn run(command: Commands, overrides: &StoreArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let mut store = match open_store(overrides) {
        Ok(store) => store,
        Err(e) => return fail(&formatter, &e),
    };

    match command {
        Commands::Ls(args) => ls::execute(args, &store, &formatter).await,
        Commands::Tree(args) => tree::execute(args, &store, &formatter).await,
        Commands::Exists(args) => exists::execute(args, &store, &formatter).await,
        Commands::Rm(args) => rm::execute(args, &store, &formatter).await,
        Commands::Get(args) => get::execute(args, &mut store, &formatter).await,
        Commands::Put(args) => put::execute(args, &store, &formatter).await,
        Commands::Load(args) => load::execute(args, &store, &formatter).await,
        Commands::Config(_) => ExitCode::UsageError,
    }
}

/// Build a lazily connected store from the saved configuration
fn open_store(overrides: &StoreArgs) -> Result<Store<S3Backend>, Error> {
    let manager = ConfigManager::new()?;
    let mut config = manager.load()?;
    overrides.apply(&mut config);
    tracing::debug!(path = %manager.config_path().display(), "Loaded configuration");
    bk_s3::store(config.connection, config.store)
}

/// Report a library error and pick the matching exit code
pub(crate) fn fail(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "bk", "--bucket", "bkt", "--prefix", "raw", "ls", "2024/", "--recursive",
        ])
        .unwrap();
        assert_eq!(cli.store.bucket.as_deref(), Some("bkt"));
        assert_eq!(cli.store.prefix.as_deref(), Some("raw"));
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        let overrides = StoreArgs {
            bucket: Some("bkt".into()),
            prefix: None,
            endpoint: Some("http://localhost:9000".into()),
        };
        overrides.apply(&mut config);

        assert_eq!(config.store.bucket.as_deref(), Some("bkt"));
        assert_eq!(config.store.key_prefix, "");
        assert_eq!(config.connection.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.connection.path_style);
    }

    #[test]
    fn test_fail_maps_exit_code() {
        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        assert_eq!(fail(&formatter, &Error::BucketNotConfigured), ExitCode::UsageError);
    }
}

//! Configuration commands
//!
//! `config show` prints the effective configuration with secrets masked.
//! `config init` writes a configuration file seeded from the global flags.

use anyhow::{Context, bail};
use bk_core::{Config, ConfigManager};
use clap::Subcommand;
use serde::Serialize;

use super::StoreArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

const MASK: &str = "********";

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a new configuration file
    Init(InitArgs),
}

/// Arguments for the `config init` command
#[derive(clap::Args, Debug, Default)]
pub struct InitArgs {
    /// Access key ID
    #[arg(long)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Region
    #[arg(long)]
    pub region: Option<String>,

    /// Replace an existing configuration file
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct ShowOutput {
    path: String,
    config: Config,
}

/// Execute a config subcommand
pub fn execute(cmd: ConfigCommands, overrides: &StoreArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => return super::fail(&formatter, &e),
    };

    let result = match cmd {
        ConfigCommands::Show => show(&manager, overrides, &formatter),
        ConfigCommands::Init(args) => init(&manager, overrides, args, &formatter),
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            e.downcast_ref::<bk_core::Error>()
                .map(ExitCode::from_error)
                .unwrap_or(ExitCode::GeneralError)
        }
    }
}

fn show(manager: &ConfigManager, overrides: &StoreArgs, formatter: &Formatter) -> anyhow::Result<()> {
    let mut config = manager.load().context("Failed to load configuration")?;
    overrides.apply(&mut config);
    let config = masked(config);
    let path = manager.config_path().display().to_string();

    if formatter.is_json() {
        formatter.json(&ShowOutput { path, config });
    } else {
        let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        formatter.println(&formatter.dim(&format!("# {path}")));
        formatter.println(text.trim_end());
    }
    Ok(())
}

fn init(
    manager: &ConfigManager,
    overrides: &StoreArgs,
    args: InitArgs,
    formatter: &Formatter,
) -> anyhow::Result<()> {
    let path = manager.config_path();
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }

    let mut config = Config::default();
    overrides.apply(&mut config);
    config.connection.access_key = args.access_key;
    config.connection.secret_key = args.secret_key;
    config.connection.region = args.region;
    config.connection.validate()?;
    config.store.validate()?;

    manager
        .save(&config)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if formatter.is_json() {
        formatter.json(&serde_json::json!({
            "status": "success",
            "path": path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote {}", path.display()));
    }
    Ok(())
}

/// Copy of `config` with credentials replaced by a mask
fn masked(mut config: Config) -> Config {
    if config.connection.access_key.is_some() {
        config.connection.access_key = Some(MASK.to_string());
    }
    if config.connection.secret_key.is_some() {
        config.connection.secret_key = Some(MASK.to_string());
    }
    config
}

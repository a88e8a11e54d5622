//! rm command - Remove objects
//!
//! Removes one or more objects. With `--recursive` each argument is treated
//! as a prefix and everything below it is removed.

use bk_core::{Backend, Store};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object keys to remove, relative to the configured key prefix
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Remove every object under each given folder prefix
    #[arg(short, long)]
    pub recursive: bool,

    /// Only show what would be deleted (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    total: usize,
    dry_run: bool,
}

/// Execute the rm command
pub async fn execute<B: Backend>(args: RmArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let targets = if args.recursive {
        let mut all = Vec::new();
        for prefix in &args.keys {
            match store.list_under(prefix, None).await {
                Ok(objects) => all.extend(objects.into_iter().map(|o| o.key)),
                Err(e) => return fail(formatter, &e),
            }
        }
        all
    } else {
        args.keys.iter().map(|k| store.resolve(k)).collect()
    };

    if targets.is_empty() {
        formatter.warning("Nothing to remove");
        return ExitCode::Success;
    }

    if !args.dry_run {
        if let Err(e) = store.delete(targets.clone(), None).await {
            return fail(formatter, &e);
        }
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: "success",
            total: targets.len(),
            deleted: targets,
            dry_run: args.dry_run,
        });
    } else {
        let verb = if args.dry_run { "Would remove" } else { "Removed" };
        for key in &targets {
            formatter.success(&format!("{verb} {key}"));
        }
    }

    ExitCode::Success
}

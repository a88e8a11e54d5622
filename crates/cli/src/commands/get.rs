//! get command - Download objects
//!
//! Downloads one or more objects to local files. A single key may target a
//! file path; several keys need a directory.

use std::path::PathBuf;

use bk_core::{Backend, Store};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Download objects to local files
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object keys, relative to the configured key prefix
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Destination file or directory (default: current directory)
    #[arg(short, long)]
    pub to: Option<PathBuf>,

    /// Keep local files that already exist
    #[arg(long)]
    pub no_overwrite: bool,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    status: &'static str,
    files: Vec<PathBuf>,
}

/// Execute the get command
pub async fn execute<B: Backend>(
    args: GetArgs,
    store: &mut Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    if args.no_overwrite {
        let mut config = store.config().clone();
        config.overwrite = false;
        if let Err(e) = store.configure(config) {
            return fail(formatter, &e);
        }
    }

    let spinner = ProgressBar::spinner(
        formatter.config(),
        &format!("Downloading {} object(s)", args.keys.len()),
    );
    let result = store.download(args.keys, args.to.as_deref(), None).await;
    spinner.finish_and_clear();

    let files = match result {
        Ok(files) => files.into_vec(),
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            status: "success",
            files,
        });
    } else {
        for file in &files {
            formatter.success(&format!("Saved {}", file.display()));
        }
    }

    ExitCode::Success
}

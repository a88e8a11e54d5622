//! put command - Upload local files
//!
//! Each file is paired with a key. Without `--key`, a file is stored under
//! its own name below the configured key prefix.

use std::path::PathBuf;

use bk_core::{Backend, Payload, Store};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Upload local files
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Destination key for each file, in order (repeatable)
    #[arg(short, long = "key")]
    pub keys: Vec<String>,

    /// Fail instead of replacing objects that already exist
    #[arg(long)]
    pub no_overwrite: bool,
}

impl PutArgs {
    /// Destination keys, defaulting to each file's name
    fn destination_keys(&self) -> Vec<String> {
        if !self.keys.is_empty() {
            return self.keys.clone();
        }
        self.files
            .iter()
            .map(|f| {
                f.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct PutOutput {
    status: &'static str,
    keys: Vec<String>,
}

/// Execute the put command
pub async fn execute<B: Backend>(args: PutArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let keys = args.destination_keys();
    let payloads: Vec<Payload> = args.files.iter().cloned().map(Payload::file).collect();
    let overwrite = args.no_overwrite.then_some(false);

    let spinner = ProgressBar::spinner(
        formatter.config(),
        &format!("Uploading {} file(s)", payloads.len()),
    );
    let result = store.upload(payloads, keys, None, overwrite).await;
    spinner.finish_and_clear();

    let keys = match result {
        Ok(keys) => keys.into_vec(),
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&PutOutput {
            status: "success",
            keys,
        });
    } else {
        let bucket = store.config().bucket.as_deref().unwrap_or_default();
        for key in &keys {
            formatter.success(&format!("Uploaded s3://{bucket}/{key}"));
        }
    }

    ExitCode::Success
}

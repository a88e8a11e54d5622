//! exists command - Check for an object
//!
//! Exits with `NotFound` when the key is absent, so scripts can branch on
//! the status alone.

use bk_core::{Backend, Store};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Check whether an object exists
#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Object key, relative to the configured key prefix
    pub key: String,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    key: String,
    exists: bool,
}

/// Execute the exists command
pub async fn execute<B: Backend>(args: ExistsArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let key = store.resolve(&args.key);
    let exists = match store.exists(&args.key, None).await {
        Ok(exists) => exists,
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&ExistsOutput { key, exists });
    } else if exists {
        formatter.success(&format!("{key} exists"));
    } else {
        formatter.println(&format!("{key} not found"));
    }

    if exists {
        ExitCode::Success
    } else {
        ExitCode::NotFound
    }
}

//! load command - Fetch and decode an object
//!
//! The key extension picks the decoder: tables are previewed, JSON records
//! are pretty-printed and anything else is reported by size.

use bk_core::tree::human_bytes;
use bk_core::{Backend, Loaded, Store, TabularEngine};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar, frame_table};

/// Fetch an object and decode it by extension
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Object key, relative to the configured key prefix
    pub key: String,

    /// Frame flavour for tabular data (pandas-like or polars-like)
    #[arg(short, long)]
    pub engine: Option<TabularEngine>,

    /// Number of table rows to preview
    #[arg(short = 'n', long, default_value = "10")]
    pub rows: usize,
}

/// Output structure for load command (JSON format)
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum LoadOutput {
    Frame {
        key: String,
        engine: TabularEngine,
        rows: usize,
        columns: Vec<String>,
        preview: Vec<Vec<String>>,
    },
    Record {
        key: String,
        value: Value,
    },
    Raw {
        key: String,
        size_bytes: usize,
    },
}

/// Execute the load command
pub async fn execute<B: Backend>(args: LoadArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let key = store.resolve(&args.key);

    let spinner = ProgressBar::spinner(formatter.config(), &format!("Loading {key}"));
    let result = store.load(args.key.as_str(), None, args.engine).await;
    spinner.finish_and_clear();

    let loaded = match result.map(|l| l.into_single()) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => {
            formatter.error(&format!("Nothing loaded for {key}"));
            return ExitCode::GeneralError;
        }
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        let output = match loaded {
            Loaded::Frame(frame) => match frame.head_rows(args.rows) {
                Ok(preview) => LoadOutput::Frame {
                    key,
                    engine: frame.engine(),
                    rows: frame.num_rows(),
                    columns: frame.column_names(),
                    preview,
                },
                Err(e) => return fail(formatter, &e),
            },
            Loaded::Record(value) => LoadOutput::Record { key, value },
            Loaded::Raw(bytes) => LoadOutput::Raw {
                key,
                size_bytes: bytes.len(),
            },
        };
        formatter.json(&output);
        return ExitCode::Success;
    }

    match loaded {
        Loaded::Frame(frame) => {
            let table = match frame_table(&frame, args.rows) {
                Ok(table) => table,
                Err(e) => return fail(formatter, &e),
            };
            let (rows, cols) = frame.shape();
            formatter.println(&table);
            formatter.println(&formatter.dim(&format!(
                "{rows} rows x {cols} columns ({})",
                frame.engine()
            )));
        }
        Loaded::Record(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => formatter.println(&text),
            Err(e) => {
                formatter.error(&format!("Failed to render record: {e}"));
                return ExitCode::GeneralError;
            }
        },
        Loaded::Raw(bytes) => {
            formatter.println(&format!(
                "{key}: {} of undecoded data",
                human_bytes(bytes.len() as u64)
            ));
        }
    }

    ExitCode::Success
}

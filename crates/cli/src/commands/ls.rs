//! ls command - List objects
//!
//! Lists objects under a prefix, one level deep or recursively, optionally
//! narrowed by a glob pattern and a set of extensions.

use bk_core::tree::human_bytes;
use bk_core::{Backend, ListOptions, ObjectInfo, Store};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, object_table};

/// List objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Prefix to list, relative to the configured key prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Stop after this many entries
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Glob matched against whole keys (`*` also matches `/`)
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Keep only keys with this extension (repeatable)
    #[arg(short, long = "ext")]
    pub extensions: Vec<String>,

    /// Show a table with size, modification time and storage class
    #[arg(short, long)]
    pub meta: bool,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

impl LsArgs {
    fn options(&self) -> ListOptions {
        ListOptions {
            limit: self.limit,
            recursive: self.recursive || self.pattern.is_some(),
            pattern: self.pattern.clone(),
            extensions: (!self.extensions.is_empty()).then(|| self.extensions.clone()),
            ..Default::default()
        }
    }
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<ObjectInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Summary {
    total_objects: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn of(items: &[ObjectInfo]) -> Self {
        let files = items.iter().filter(|i| !i.is_dir);
        let total_size_bytes = files.clone().map(|i| i.size).sum();
        Self {
            total_objects: files.count(),
            total_size_bytes,
            total_size_human: human_bytes(total_size_bytes),
        }
    }
}

/// Execute the ls command
pub async fn execute<B: Backend>(args: LsArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let items = match store.list(&args.prefix, &args.options()).await {
        Ok(items) => items,
        Err(e) => return fail(formatter, &e),
    };
    let summary = Summary::of(&items);

    if formatter.is_json() {
        formatter.json(&LsOutput {
            items,
            summary: args.summarize.then_some(summary),
        });
        return ExitCode::Success;
    }

    if args.meta {
        formatter.println(&object_table(&items));
    } else if !args.summarize {
        for item in &items {
            if item.is_dir {
                formatter.println(&formatter.bold(&item.key));
            } else {
                formatter.println(&item.key);
            }
        }
    }

    if args.summarize {
        formatter.println(&format!(
            "Total: {} objects, {}",
            summary.total_objects, summary.total_size_human
        ));
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: LsArgs,
    }

    fn parse(argv: &[&str]) -> LsArgs {
        let mut full = vec!["ls"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn test_default_options() {
        let options = parse(&[]).options();
        assert!(!options.recursive);
        assert_eq!(options.limit, None);
        assert_eq!(options.extensions, None);
    }

    #[test]
    fn test_pattern_implies_recursive() {
        let options = parse(&["--pattern", "raw/*.csv", "--ext", "csv", "--ext", "json"]).options();
        assert!(options.recursive);
        assert_eq!(options.pattern.as_deref(), Some("raw/*.csv"));
        assert_eq!(
            options.extensions,
            Some(vec!["csv".to_string(), "json".to_string()])
        );
    }

    #[test]
    fn test_summary_skips_dirs() {
        let items = vec![
            ObjectInfo::dir("a/"),
            ObjectInfo::file("b.csv", 1024),
            ObjectInfo::file("c.csv", 1024),
        ];
        assert_eq!(
            Summary::of(&items),
            Summary {
                total_objects: 2,
                total_size_bytes: 2048,
                total_size_human: "2.00 KiB".to_string(),
            }
        );
    }
}

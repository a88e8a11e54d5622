//! tree command - Display objects as a tree
//!
//! Renders a recursive listing with box-drawing guides and rolled-up folder
//! sizes. JSON mode emits the same hierarchy as nested objects.

use bk_core::tree::human_bytes;
use bk_core::{Backend, RenderOptions, Store, TreeNode};
use clap::Args;
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Display objects in tree format
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Prefix to start from, relative to the configured key prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// Maximum depth to display
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,

    /// Show at most this many entries per folder
    #[arg(short = 'c', long)]
    pub max_children: Option<usize>,

    /// Label entries with their own name instead of the full path
    #[arg(short, long)]
    pub basename: bool,

    /// Keep files and folders interleaved by size
    #[arg(long)]
    pub files_first: bool,
}

impl TreeArgs {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            show_full_path: !self.basename,
            max_depth: self.max_depth,
            max_children: self.max_children,
            folders_first: !self.files_first,
        }
    }
}

/// JSON shape of one tree node
#[derive(Debug, Serialize)]
struct TreeJson {
    name: String,
    path: String,
    #[serde(rename = "type")]
    node_type: &'static str,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeEntry>,
}

/// A child node, or the summary of children cut by `--max-children`
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TreeEntry {
    Node(TreeJson),
    More {
        more: usize,
        size_bytes: u64,
        size_human: String,
    },
}

impl TreeJson {
    fn from_node(node: &TreeNode, options: &RenderOptions, depth: usize) -> Self {
        let descend = options.max_depth.is_none_or(|max| depth < max);
        let mut children = Vec::new();
        if descend {
            let kids = node.sorted_children(options.folders_first);
            let shown = options.max_children.unwrap_or(usize::MAX).min(kids.len());
            let (kept, hidden) = kids.split_at(shown);

            children.extend(
                kept.iter()
                    .map(|child| TreeEntry::Node(Self::from_node(child, options, depth + 1))),
            );
            if !hidden.is_empty() {
                let size_bytes = hidden.iter().map(|n| n.size).sum();
                children.push(TreeEntry::More {
                    more: hidden.len(),
                    size_bytes,
                    size_human: human_bytes(size_bytes),
                });
            }
        }

        Self {
            name: node.name.clone(),
            path: node.full_path.clone(),
            node_type: if node.is_file { "file" } else { "folder" },
            size_bytes: node.size,
            size_human: human_bytes(node.size),
            children,
        }
    }
}

/// Execute the tree command
pub async fn execute<B: Backend>(args: TreeArgs, store: &Store<B>, formatter: &Formatter) -> ExitCode {
    let root = match store.tree(&args.prefix, None).await {
        Ok(root) => root,
        Err(e) => return fail(formatter, &e),
    };
    let options = args.render_options();

    if formatter.is_json() {
        formatter.json(&TreeJson::from_node(&root, &options, 0));
    } else {
        formatter.println(&root.render(&options));
        formatter.println(&formatter.dim(&format!("{} files", root.file_count())));
    }

    ExitCode::Success
}

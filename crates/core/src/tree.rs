//! Hierarchical view of a flat key listing
//!
//! Keys are split on `/` into a node tree, folder sizes are rolled up from
//! their files, and the result is rendered as an indented text tree with
//! box-drawing guides.

use std::cmp::Ordering;
use std::collections::HashMap;

use humansize::{BINARY, FormatSizeOptions, format_size};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const GUIDE: &str = "│   ";
const SPACE: &str = "    ";

/// One file or folder of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    /// Slash-joined path from the root (the root holds its label)
    pub full_path: String,
    pub is_file: bool,
    /// File size, or aggregated folder size once [`TreeNode::aggregate_sizes`] ran
    pub size: u64,
    pub children: HashMap<String, TreeNode>,
}

impl TreeNode {
    fn folder(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            is_file: false,
            size: 0,
            children: HashMap::new(),
        }
    }

    /// Build a tree from `(key, size)` pairs
    ///
    /// Empty segments are ignored, so `a//b` and `/a/b` both land on `a/b`.
    /// Keys ending in `/` are folder markers and create folders only.
    pub fn build<'a, I>(objects: I, root_label: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let label = if root_label.is_empty() { "/" } else { root_label };
        let mut root = Self::folder(label, label);

        for (key, size) in objects {
            let marker = key.ends_with('/');
            let parts: Vec<&str> = key.split('/').filter(|p| !p.is_empty()).collect();
            let last = parts.len().saturating_sub(1);

            let mut node = &mut root;
            let mut path = String::new();
            for (i, part) in parts.into_iter().enumerate() {
                if !path.is_empty() {
                    path.push('/');
                }
                path.push_str(part);

                node = node
                    .children
                    .entry(part.to_string())
                    .or_insert_with(|| Self::folder(part, path.clone()));

                if i == last && !marker {
                    node.is_file = true;
                    node.size = size;
                }
            }
        }

        root
    }

    /// Roll file sizes up into folders; returns the size of `self`
    pub fn aggregate_sizes(&mut self) -> u64 {
        if self.is_file {
            return self.size;
        }
        self.size = self.children.values_mut().map(TreeNode::aggregate_sizes).sum();
        self.size
    }

    /// Number of file nodes below (or at) this node
    pub fn file_count(&self) -> usize {
        if self.is_file {
            return 1;
        }
        self.children.values().map(TreeNode::file_count).sum()
    }

    /// Children in display order
    pub fn sorted_children(&self, folders_first: bool) -> Vec<&TreeNode> {
        let mut kids: Vec<&TreeNode> = self.children.values().collect();
        kids.sort_by(|a, b| {
            let kind = if folders_first {
                a.is_file.cmp(&b.is_file)
            } else {
                Ordering::Equal
            };
            kind.then_with(|| b.size.cmp(&a.size))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        kids
    }

    /// Render as text, one node per line, without a trailing newline
    pub fn render(&self, options: &RenderOptions) -> String {
        let label = if options.show_full_path {
            &self.full_path
        } else {
            &self.name
        };
        let mut lines = vec![format!("{label}  ({})", human_bytes(self.size))];
        let mut indent = String::new();
        self.render_children(options, 0, &mut indent, &mut lines);
        lines.join("\n")
    }

    fn render_children(
        &self,
        options: &RenderOptions,
        depth: usize,
        indent: &mut String,
        lines: &mut Vec<String>,
    ) {
        if options.max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let kids = self.sorted_children(options.folders_first);
        let (shown, hidden) = match options.max_children {
            Some(max) if kids.len() > max => kids.split_at(max),
            _ => (&kids[..], &[][..]),
        };

        for (i, child) in shown.iter().enumerate() {
            let last = i + 1 == shown.len() && hidden.is_empty();
            lines.push(format!(
                "{indent}{}{}  ({})",
                if last { LAST_BRANCH } else { BRANCH },
                child.label(options.show_full_path),
                human_bytes(child.size)
            ));

            if !child.is_file {
                let len = indent.len();
                indent.push_str(if last { SPACE } else { GUIDE });
                child.render_children(options, depth + 1, indent, lines);
                indent.truncate(len);
            }
        }

        if !hidden.is_empty() {
            let hidden_size: u64 = hidden.iter().map(|n| n.size).sum();
            lines.push(format!(
                "{indent}{LAST_BRANCH}+{} more  ({})",
                hidden.len(),
                human_bytes(hidden_size)
            ));
        }
    }

    fn label(&self, show_full_path: bool) -> &str {
        if show_full_path {
            &self.full_path
        } else {
            &self.name
        }
    }
}

/// Options for [`TreeNode::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Label nodes with their path from the root instead of their name
    pub show_full_path: bool,
    /// Stop descending below this many levels
    pub max_depth: Option<usize>,
    /// Show at most this many children per folder
    pub max_children: Option<usize>,
    /// List folders before files
    pub folders_first: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_full_path: true,
            max_depth: None,
            max_children: None,
            folders_first: true,
        }
    }
}

/// Format a byte count with binary prefixes: `512 B`, `1.50 KiB`
pub fn human_bytes(n: u64) -> String {
    if n < 1024 {
        return format!("{n} B");
    }
    format_size(n, FormatSizeOptions::from(BINARY).decimal_zeroes(2))
}

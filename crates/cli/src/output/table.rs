//! Table rendering for listings and frame previews

use bk_core::tree::human_bytes;
use bk_core::{Frame, ObjectInfo, Result};
use comfy_table::presets::UTF8_HORIZONTAL_ONLY;
use comfy_table::{CellAlignment, ContentArrangement, Table};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Listing with size, modification time and storage class
pub fn object_table(items: &[ObjectInfo]) -> String {
    let mut table = base_table();
    table.set_header(vec!["Key", "Size", "Last modified", "Class"]);

    for item in items {
        let size = if item.is_dir {
            "DIR".to_string()
        } else {
            human_bytes(item.size)
        };
        let modified = item
            .last_modified
            .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            item.key.clone(),
            size,
            modified,
            item.storage_class.clone().unwrap_or_default(),
        ]);
    }

    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table.to_string()
}

/// First `rows` rows of a frame under its column names
pub fn frame_table(frame: &Frame, rows: usize) -> Result<String> {
    let mut table = base_table();
    table.set_header(frame.column_names());
    for row in frame.head_rows(rows)? {
        table.add_row(row);
    }
    Ok(table.to_string())
}

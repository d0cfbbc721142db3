use std::borrow::Cow;

use comfy_table::{ContentArrangement, Table, presets::NOTHING};

use super::QueryResult;

/// Maximum width for free-form columns
const MAX_COLUMN_WIDTH: usize = 60;

/// Columns that should have width limits in table mode
const WIDE_COLUMNS: &[&str] = &["NAME", "STATUS"];

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(result: &QueryResult, no_headers: bool) -> String {
        if result.rows.is_empty() {
            return format!("No {} found", result.kind);
        }

        let mut table = Table::new();
        // Borderless, like kubectl
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Disabled);

        let wide: Vec<bool> = result
            .columns
            .iter()
            .map(|col| WIDE_COLUMNS.contains(&col.as_str()))
            .collect();

        if !no_headers {
            table.set_header(&result.columns);
        }

        for row in &result.rows {
            let cells: Vec<Cow<'_, str>> = row
                .iter()
                .zip(&wide)
                .map(|(val, &wide)| {
                    if wide {
                        truncate_value(val, MAX_COLUMN_WIDTH)
                    } else {
                        Cow::Borrowed(val.as_str())
                    }
                })
                .collect();
            table.add_row(cells);
        }

        table
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

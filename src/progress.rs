// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for long-running deletions

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner counting deleted objects
pub struct DeleteProgress {
    bar: ProgressBar,
    kind: String,
}

impl DeleteProgress {
    /// Visible spinner on a terminal, silent otherwise
    pub fn new(kind: &str, interactive: bool) -> Self {
        let bar = if interactive {
            create_spinner(&format!("Deleting {}...", kind))
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            kind: kind.to_string(),
        }
    }

    pub fn deleted(&self, count: usize) {
        self.bar.set_message(Self::message(&self.kind, count));
    }

    fn message(kind: &str, count: usize) -> String {
        format!("Deleting {}... {} deleted", kind, count)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Final summary line of a delete command
pub fn deleted_summary(count: usize) -> String {
    format!("{} resource(s) deleted.", count)
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use console::Term;

use super::Session;
use crate::progress::{DeleteProgress, deleted_summary};
use resultsctl::results::resources::ResourceSchema;
use resultsctl::results::{Selector, delete_matching};

pub async fn run(session: &Session, schema: &ResourceSchema, mut selector: Selector) -> Result<()> {
    let progress = DeleteProgress::new(&schema.kind, Term::stderr().is_term());
    let result = delete_matching(session.client.as_ref(), &mut selector, |count| {
        progress.deleted(count)
    })
    .await;
    progress.finish();

    let count = result.with_context(|| {
        format!("Failed to delete {} in context '{}'", schema.name, session.context)
    })?;
    println!("{}", deleted_summary(count));
    Ok(())
}

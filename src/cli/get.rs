// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use chrono::Utc;
use console::{Key, Term};

use super::{OutputFormat, Session, single_object};
use crate::output::{QueryResult, format_object};
use resultsctl::results::resources::{ResourceSchema, with_namespace_column};
use resultsctl::results::{Selector, list};

const PAGER_PROMPT: &str = "press any key to continue, ESC to exit";

/// Wait for a key; false when the user asked to stop
fn prompt_next(term: &Term) -> Result<bool> {
    term.write_str(PAGER_PROMPT)?;
    let key = term.read_key()?;
    term.clear_line()?;
    Ok(key != Key::Escape)
}

pub async fn run(
    session: &Session,
    schema: &ResourceSchema,
    mut selector: Selector,
    output: Option<OutputFormat>,
) -> Result<()> {
    let client = session.client.as_ref();

    if let Some(format) = output.filter(|f| *f != OutputFormat::Table) {
        let page = list(client, &mut selector)
            .await
            .with_context(|| format!("Failed to list {}", schema.name))?;
        let obj = single_object(&schema.kind, page.items)?;
        println!("{}", format_object(&obj, format));
        return Ok(());
    }

    let schema = if session.all_namespaces() {
        with_namespace_column(schema.clone())
    } else {
        schema.clone()
    };

    let term = Term::stdout();
    let interactive = term.is_term();
    let mut first = true;
    loop {
        let page = list(client, &mut selector)
            .await
            .with_context(|| format!("Failed to list {}", schema.name))?;
        let result = QueryResult::from_objects(&schema, &page.items, Utc::now());
        if first || !result.is_empty() {
            println!("{}", result.format(!first));
        }
        first = false;

        if page.is_last() || (interactive && !prompt_next(&term)?) {
            return Ok(());
        }
        selector.advance(&page.next_page_token);
    }
}

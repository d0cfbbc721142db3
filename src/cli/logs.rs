// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use tracing::debug;

use super::{Session, single_object};
use resultsctl::results::log::{log_reference, write_log};
use resultsctl::results::resources::ResourceSchema;
use resultsctl::results::{Selector, list};

const NO_LOGS: &str = "No logs found";

pub async fn run(session: &Session, schema: &ResourceSchema, mut selector: Selector) -> Result<()> {
    let client = session.client.as_ref();
    let page = list(client, &mut selector)
        .await
        .with_context(|| format!("Failed to list {}", schema.name))?;
    let obj = single_object(&schema.kind, page.items)?;

    let Some(name) = log_reference(&obj) else {
        println!("{}", NO_LOGS);
        return Ok(());
    };

    let mut stdout = tokio::io::stdout();
    match write_log(client, &name, &mut stdout).await {
        Ok(bytes) => {
            debug!(log = %name, bytes, "Printed log");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!("{}", NO_LOGS);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to fetch log {}", name)),
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Log lookup and streaming

use futures::StreamExt;
use kube::api::DynamicObject;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::cascade::{LOG_ANNOTATION, RECORD_ANNOTATION};
use super::client::ResultsClient;
use super::error::Result;
use super::proto::GetLogRequest;

/// Name of the log attached to a run
///
/// Falls back to the record reference with its `records` collection
/// replaced by `logs`.
pub fn log_reference(obj: &DynamicObject) -> Option<String> {
    let annotations = obj.metadata.annotations.as_ref()?;
    if let Some(log) = annotations.get(LOG_ANNOTATION).filter(|l| !l.is_empty()) {
        return Some(log.clone());
    }
    annotations
        .get(RECORD_ANNOTATION)
        .filter(|r| !r.is_empty())
        .map(|r| r.replacen("/records/", "/logs/", 1))
}

/// Stream a log into `out`, returning the number of bytes written
pub async fn write_log<W>(client: &dyn ResultsClient, name: &str, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    debug!(log = %name, "Fetching log");
    let mut chunks = client
        .get_log(GetLogRequest {
            name: name.to_string(),
        })
        .await?;

    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    debug!(log = %name, bytes = written, "Log written");
    Ok(written)
}

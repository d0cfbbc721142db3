// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cascading deletion of runs and everything they own
//!
//! A run is deleted depth first: every record owned by it (matched through
//! `ownerReferences`) is deleted recursively, then the run's log and record,
//! and finally its Result if no records are left under it. Missing objects
//! are skipped so a second pass over the same run is a no-op. Any other
//! failure stops the walk.
//!
//! The emptiness check and the Result deletion are two separate calls. A
//! record created in between is not seen; the server then refuses to delete
//! a non-empty Result or, if it does not, that record goes with it.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use tracing::{debug, info};

use super::client::ResultsClient;
use super::error::{Result, ignore_not_found};
use super::proto::{
    DeleteLogRequest, DeleteRecordRequest, DeleteResultRequest, ListRecordsRequest, Record,
};
use super::query::{self, decode_record};
use super::selector::Selector;

/// Annotation holding the name of the run's Result
pub const RESULT_ANNOTATION: &str = "results.tekton.dev/result";

/// Annotation holding the name of the run's Record
pub const RECORD_ANNOTATION: &str = "results.tekton.dev/record";

/// Annotation holding the name of the run's Log
pub const LOG_ANNOTATION: &str = "results.tekton.dev/log";

/// A deletable run and its backend references
///
/// Unset references are skipped. An empty `uid` selects every record in
/// the Result as a child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceNode {
    pub uid: String,
    pub result: Option<String>,
    pub record: Option<String>,
    pub log: Option<String>,
}

fn annotation(annotations: Option<&BTreeMap<String, String>>, key: &str) -> Option<String> {
    annotations
        .and_then(|a| a.get(key))
        .filter(|v| !v.is_empty())
        .cloned()
}

impl ResourceNode {
    pub fn from_metadata(meta: &ObjectMeta) -> Self {
        let annotations = meta.annotations.as_ref();
        Self {
            uid: meta.uid.clone().unwrap_or_default(),
            result: annotation(annotations, RESULT_ANNOTATION),
            record: annotation(annotations, RECORD_ANNOTATION),
            log: annotation(annotations, LOG_ANNOTATION),
        }
    }

    pub fn from_object(obj: &DynamicObject) -> Self {
        Self::from_metadata(&obj.metadata)
    }

    /// Node for a stored record, filling references the payload lacks
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut node = Self::from_object(&decode_record(record)?);
        if node.record.is_none() {
            node.record = Some(record.name.clone());
        }
        if node.result.is_none() {
            node.result = record.parent().map(String::from);
        }
        Ok(node)
    }
}

/// Every record under `parent` matching `filter`, across all pages
///
/// A missing parent yields no records.
async fn list_records(client: &dyn ResultsClient, parent: &str, filter: String) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut page_token = String::new();
    loop {
        let request = ListRecordsRequest {
            parent: parent.to_string(),
            filter: filter.clone(),
            page_token,
            ..Default::default()
        };
        let Some(response) = ignore_not_found(client.list_records(request).await)? else {
            return Ok(records);
        };
        records.extend(response.records);
        if response.next_page_token.is_empty() {
            return Ok(records);
        }
        page_token = response.next_page_token;
    }
}

/// Whether any record is left under `result`
///
/// Stops at the first non-empty page.
async fn has_records(client: &dyn ResultsClient, result: &str) -> Result<bool> {
    let mut page_token = String::new();
    loop {
        let request = ListRecordsRequest {
            parent: result.to_string(),
            page_size: 1,
            page_token,
            ..Default::default()
        };
        let Some(response) = ignore_not_found(client.list_records(request).await)? else {
            return Ok(false);
        };
        if !response.records.is_empty() {
            return Ok(true);
        }
        if response.next_page_token.is_empty() {
            return Ok(false);
        }
        page_token = response.next_page_token;
    }
}

/// Delete a run and everything it owns
pub fn delete<'a>(client: &'a dyn ResultsClient, node: &'a ResourceNode) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        // A record without a uid cannot be referenced as an owner
        let has_children = !node.uid.is_empty() || node.record.is_none();
        if let Some(result) = node.result.as_ref().filter(|_| has_children) {
            let filter = if node.uid.is_empty() {
                String::new()
            } else {
                Selector::owned_by(&node.uid).encode()
            };
            let children = list_records(client, result, filter).await?;
            debug!(uid = %node.uid, result = %result, children = children.len(), "Deleting children");
            for child in &children {
                let child = ResourceNode::from_record(child)?;
                if child == *node || (!node.uid.is_empty() && child.uid == node.uid) {
                    continue;
                }
                delete(client, &child).await?;
            }
        }

        if let Some(log) = &node.log {
            debug!(log = %log, "Deleting log");
            ignore_not_found(client.delete_log(DeleteLogRequest { name: log.clone() }).await)?;
        }

        if let Some(record) = &node.record {
            debug!(record = %record, "Deleting record");
            ignore_not_found(
                client
                    .delete_record(DeleteRecordRequest { name: record.clone() })
                    .await,
            )?;
        }

        if let Some(result) = &node.result {
            if has_records(client, result).await? {
                debug!(result = %result, "Result still has records, keeping it");
                return Ok(());
            }
            debug!(result = %result, "Deleting result");
            ignore_not_found(
                client
                    .delete_result(DeleteResultRequest { name: result.clone() })
                    .await,
            )?;
        }

        Ok(())
    })
}

/// Delete every object matching the selector, returning how many were deleted
///
/// Matches are collected first so deletions do not shift later pages.
/// References missing from a payload are taken from its record.
/// `on_deleted` receives the running count after each object.
pub async fn delete_matching(
    client: &dyn ResultsClient,
    selector: &mut Selector,
    mut on_deleted: impl FnMut(usize),
) -> Result<usize> {
    let records = query::list_all_records(client, selector).await?;
    let nodes = records
        .iter()
        .map(ResourceNode::from_record)
        .collect::<Result<Vec<_>>>()?;
    info!(count = nodes.len(), kind = %selector.kind, "Deleting matching objects");

    let mut deleted = 0;
    for (record, node) in records.iter().zip(&nodes) {
        debug!(record = %record.name, uid = %node.uid, "Cascading delete");
        delete(client, node).await?;
        deleted += 1;
        on_deleted(deleted);
    }
    Ok(deleted)
}

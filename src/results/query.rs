// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Paginated record listing
//!
//! [`list`] issues exactly one `ListRecords` call and decodes every record
//! payload into a generic Kubernetes object. Callers drive pagination by
//! feeding `next_page_token` back through [`Selector::advance`];
//! [`list_all_records`] does that itself and keeps the records undecoded.

use kube::api::DynamicObject;
use tracing::debug;

use super::client::ResultsClient;
use super::error::{Result, ResultsError};
use super::proto::{ListRecordsRequest, ListRecordsResponse, Record};
use super::selector::{ALL_NAMESPACES, Selector};

/// Records are returned newest first
pub const ORDER_BY: &str = "update_time desc";

/// One page of decoded records
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub kind: String,
    pub api_version: String,
    pub items: Vec<DynamicObject>,
    /// Empty on the last page
    pub next_page_token: String,
}

impl RecordPage {
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

/// Decode the object stored in a record
pub fn decode_record(record: &Record) -> Result<DynamicObject> {
    serde_json::from_slice(record.payload()).map_err(|source| ResultsError::Decode {
        what: format!("record {}", record.name),
        source,
    })
}

/// Build the `ListRecords` request for the selector's current page
pub fn list_request(selector: &Selector) -> ListRecordsRequest {
    ListRecordsRequest {
        parent: selector.parent(),
        filter: selector.encode(),
        page_size: selector.limit,
        page_token: selector.continue_token.clone(),
        order_by: ORDER_BY.to_string(),
    }
}

/// One raw `ListRecords` call for the selector's current page
async fn fetch(client: &dyn ResultsClient, selector: &mut Selector) -> Result<ListRecordsResponse> {
    selector.validate()?;
    if selector.namespace.is_empty() {
        selector.namespace = ALL_NAMESPACES.to_string();
    }

    let request = list_request(selector);
    debug!(
        parent = %request.parent,
        filter = %request.filter,
        page_size = request.page_size,
        page_token = %request.page_token,
        "Listing records"
    );
    let response = client.list_records(request).await?;
    debug!(
        count = response.records.len(),
        next_page_token = %response.next_page_token,
        "Listed records"
    );
    Ok(response)
}

/// Fetch one page of records matching the selector
///
/// An empty namespace is normalised to the all-namespaces wildcard. Any
/// undecodable payload fails the whole page.
pub async fn list(client: &dyn ResultsClient, selector: &mut Selector) -> Result<RecordPage> {
    let response = fetch(client, selector).await?;
    let items = response
        .records
        .iter()
        .map(decode_record)
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordPage {
        kind: selector.kind.clone(),
        api_version: selector.api_version.clone(),
        items,
        next_page_token: response.next_page_token,
    })
}

/// Every matching record across all pages, undecoded
pub async fn list_all_records(client: &dyn ResultsClient, selector: &mut Selector) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    loop {
        let response = fetch(client, selector).await?;
        records.extend(response.records);
        if !selector.advance(&response.next_page_token) {
            return Ok(records);
        }
    }
}

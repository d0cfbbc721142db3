// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory results backend for engine tests
//!
//! Understands the filter clauses the engine emits for names, namespaces,
//! owner references and data types; other clauses match everything.
//! Page tokens are plain offsets; pages can be capped to force paging.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::{Value, json};

use super::cascade::{LOG_ANNOTATION, RECORD_ANNOTATION, RESULT_ANNOTATION};
use super::client::{LogStream, ResultsClient};
use super::error::{Result, ResultsError};
use super::proto::{
    Any, DeleteLogRequest, DeleteRecordRequest, DeleteResultRequest, GetLogRequest,
    GetRecordRequest, GetResultRequest, ListRecordsRequest, ListRecordsResponse,
    ListResultsRequest, ListResultsResponse, Record, ResultEntry,
};

/// Payload of a Tekton run as stored in a record
pub fn run(kind: &str, name: &str, uid: &str, owner: Option<&str>) -> Value {
    let mut metadata = json!({
        "name": name,
        "namespace": "ns",
        "uid": uid,
        "creationTimestamp": "2024-03-01T10:00:00Z",
    });
    if let Some(owner) = owner {
        metadata["ownerReferences"] = json!([{
            "apiVersion": "tekton.dev/v1",
            "kind": "PipelineRun",
            "name": owner,
            "uid": owner,
        }]);
    }
    json!({
        "apiVersion": "tekton.dev/v1",
        "kind": kind,
        "metadata": metadata,
        "status": {
            "startTime": "2024-03-01T10:00:00Z",
            "completionTime": "2024-03-01T10:02:05Z",
            "conditions": [{"type": "Succeeded", "status": "True", "reason": "Succeeded"}],
        },
    })
}

fn not_found(what: &str) -> ResultsError {
    ResultsError::Http {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[derive(Default)]
struct State {
    results: BTreeSet<String>,
    records: Vec<Record>,
    logs: BTreeMap<String, Vec<u8>>,
    deleted: Vec<String>,
    list_requests: Vec<ListRecordsRequest>,
    inject: Option<(String, String, Value)>,
    fail: Option<(String, u16)>,
    page_cap: Option<usize>,
}

impl State {
    fn insert(&mut self, result: &str, mut payload: Value, with_log: bool) -> String {
        let uid = payload["metadata"]["uid"].as_str().unwrap_or_default().to_string();
        let record = format!("{result}/records/{uid}");
        let log = format!("{result}/logs/{uid}");

        let mut annotations = json!({
            RESULT_ANNOTATION: result,
            RECORD_ANNOTATION: record,
        });
        if with_log {
            annotations[LOG_ANNOTATION] = json!(log);
            self.logs.insert(log, format!("[{uid}] step-1\n[{uid}] done\n").into_bytes());
        }
        payload["metadata"]["annotations"] = annotations;

        let data_type = format!(
            "{}.{}",
            payload["apiVersion"].as_str().unwrap_or_default(),
            payload["kind"].as_str().unwrap_or_default()
        );
        self.push(result, &uid, data_type, payload.to_string().into_bytes());
        record
    }

    fn push(&mut self, result: &str, id: &str, data_type: String, value: Vec<u8>) {
        self.results.insert(result.to_string());
        self.records.push(Record {
            name: format!("{result}/records/{id}"),
            id: id.to_string(),
            uid: id.to_string(),
            data: Some(Any { type_: data_type, value }),
            ..Default::default()
        });
    }

    fn check_fail(&self, name: &str) -> Result<()> {
        match &self.fail {
            Some((target, status)) if target == name => Err(ResultsError::Http {
                status: *status,
                message: "injected failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// `<ns>/results/<id>` with `-` matching anything
fn parent_matches(parent: &str, record: &Record) -> bool {
    let Some((ns, id)) = parent.split_once("/results/") else {
        return false;
    };
    let Some((record_ns, record_id)) = record.parent().and_then(|p| p.split_once("/results/")) else {
        return false;
    };
    (ns == "-" || ns == record_ns) && (id == "-" || id == record_id)
}

fn quoted(clause: &str, prefix: &str, suffix: &str) -> Option<String> {
    clause
        .strip_prefix(prefix)?
        .strip_suffix(suffix)
        .map(String::from)
}

fn filter_matches(filter: &str, record: &Record) -> bool {
    if filter.is_empty() {
        return true;
    }
    let payload: Value = serde_json::from_slice(record.payload()).unwrap_or(Value::Null);
    let metadata = &payload["metadata"];
    filter.split(" && ").all(|clause| {
        if let Some(v) = quoted(clause, "data.metadata.ownerReferences.contains(\"", "\")") {
            metadata["ownerReferences"]
                .as_array()
                .is_some_and(|owners| {
                    owners.iter().any(|o| {
                        ["uid", "name", "kind", "apiVersion"]
                            .iter()
                            .any(|f| o[f].as_str() == Some(v.as_str()))
                    })
                })
        } else if let Some(v) = quoted(clause, "data.metadata.name.contains(\"", "\")") {
            metadata["name"].as_str().is_some_and(|n| n.contains(&v))
        } else if let Some(v) = quoted(clause, "data.metadata.namespace.contains(\"", "\")") {
            metadata["namespace"].as_str().is_some_and(|n| n.contains(&v))
        } else if let Some(v) = quoted(clause, "data.metadata.uid.contains(\"", "\")") {
            metadata["uid"].as_str().is_some_and(|n| n.contains(&v))
        } else if let Some(v) = quoted(clause, "data_type==\"", "\"") {
            record.data.as_ref().is_some_and(|d| d.type_ == v)
        } else {
            true
        }
    })
}

/// Mock [`ResultsClient`] backed by a mutex-protected store
#[derive(Default)]
pub struct MockResults {
    state: Mutex<State>,
}

impl MockResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store a run under `result`, annotating it with its references
    pub fn add_record(&self, result: &str, payload: Value) -> String {
        self.state().insert(result, payload, false)
    }

    /// Like [`add_record`](Self::add_record), also attaching a log
    pub fn add_record_with_log(&self, result: &str, payload: Value) -> String {
        self.state().insert(result, payload, true)
    }

    /// Store a record with an arbitrary payload
    pub fn add_raw_record(&self, result: &str, id: &str, value: Vec<u8>) {
        self.state()
            .push(result, id, "tekton.dev/v1.PipelineRun".to_string(), value);
    }

    /// After `trigger` is deleted, add `payload` under `result`
    pub fn inject_on_delete(&self, trigger: &str, result: &str, payload: Value) {
        self.state().inject = Some((trigger.to_string(), result.to_string(), payload));
    }

    /// Fail deletion of `name` with `status`
    pub fn fail_delete(&self, name: &str, status: u16) {
        self.state().fail = Some((name.to_string(), status));
    }

    /// Return at most `size` records per page, whatever was asked
    pub fn cap_page_size(&self, size: usize) {
        self.state().page_cap = Some(size);
    }

    /// Successful deletions, as `"<kind> <name>"`, in order
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn list_requests(&self) -> Vec<ListRecordsRequest> {
        self.state().list_requests.clone()
    }

    pub fn has_result(&self, name: &str) -> bool {
        self.state().results.contains(name)
    }

    pub fn record_names(&self) -> Vec<String> {
        self.state().records.iter().map(|r| r.name.clone()).collect()
    }
}

#[async_trait]
impl ResultsClient for MockResults {
    async fn get_result(&self, req: GetResultRequest) -> Result<ResultEntry> {
        let state = self.state();
        if !state.results.contains(&req.name) {
            return Err(not_found("result"));
        }
        Ok(ResultEntry {
            name: req.name,
            ..Default::default()
        })
    }

    async fn list_results(&self, req: ListResultsRequest) -> Result<ListResultsResponse> {
        let state = self.state();
        let prefix = format!("{}/results/", req.parent);
        let results = state
            .results
            .iter()
            .filter(|r| req.parent == "-" || r.starts_with(&prefix))
            .map(|r| ResultEntry {
                name: r.clone(),
                ..Default::default()
            })
            .collect();
        Ok(ListResultsResponse {
            results,
            next_page_token: String::new(),
        })
    }

    async fn delete_result(&self, req: DeleteResultRequest) -> Result<()> {
        let mut state = self.state();
        state.check_fail(&req.name)?;
        if !state.results.contains(&req.name) {
            return Err(not_found("result"));
        }
        if state.records.iter().any(|r| r.parent() == Some(req.name.as_str())) {
            return Err(ResultsError::Http {
                status: 409,
                message: "result has records".to_string(),
            });
        }
        state.results.remove(&req.name);
        state.deleted.push(format!("result {}", req.name));
        Ok(())
    }

    async fn get_record(&self, req: GetRecordRequest) -> Result<Record> {
        self.state()
            .records
            .iter()
            .find(|r| r.name == req.name)
            .cloned()
            .ok_or_else(|| not_found("record"))
    }

    async fn list_records(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        let mut state = self.state();
        state.list_requests.push(req.clone());

        if let Some((_, id)) = req.parent.split_once("/results/")
            && id != "-"
            && !state.results.contains(&req.parent)
        {
            return Err(not_found("result"));
        }

        let matching: Vec<Record> = state
            .records
            .iter()
            .filter(|r| parent_matches(&req.parent, r) && filter_matches(&req.filter, r))
            .cloned()
            .collect();

        let offset: usize = req.page_token.parse().unwrap_or(0);
        let size = if req.page_size > 0 {
            req.page_size as usize
        } else {
            matching.len().max(1)
        };
        let size = state.page_cap.map_or(size, |cap| size.min(cap));
        let end = (offset + size).min(matching.len());
        let records = matching.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = if end < matching.len() {
            end.to_string()
        } else {
            String::new()
        };
        Ok(ListRecordsResponse {
            records,
            next_page_token,
        })
    }

    async fn delete_record(&self, req: DeleteRecordRequest) -> Result<()> {
        let mut state = self.state();
        state.check_fail(&req.name)?;
        let Some(pos) = state.records.iter().position(|r| r.name == req.name) else {
            return Err(not_found("record"));
        };
        state.records.remove(pos);
        state.deleted.push(format!("record {}", req.name));

        if let Some((trigger, result, payload)) = state.inject.take() {
            if trigger == req.name {
                state.insert(&result, payload, false);
            } else {
                state.inject = Some((trigger, result, payload));
            }
        }
        Ok(())
    }

    async fn get_log(&self, req: GetLogRequest) -> Result<LogStream> {
        let data = self
            .state()
            .logs
            .get(&req.name)
            .cloned()
            .ok_or_else(|| not_found("log"))?;
        let mid = data.len() / 2;
        let data = Bytes::from(data);
        let chunks = vec![Ok(data.slice(..mid)), Ok(data.slice(mid..))];
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn list_logs(&self, _req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        Ok(ListRecordsResponse::default())
    }

    async fn delete_log(&self, req: DeleteLogRequest) -> Result<()> {
        let mut state = self.state();
        state.check_fail(&req.name)?;
        if state.logs.remove(&req.name).is_none() {
            return Err(not_found("log"));
        }
        state.deleted.push(format!("log {}", req.name));
        Ok(())
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Wire messages of the `tekton.results.v1alpha2` API
//!
//! Each message is both a protobuf message (for the gRPC transport) and a
//! serde type matching the protojson encoding used by the REST bridge:
//! lowerCamelCase field names, `bytes` as base64 and timestamps as RFC 3339.

use std::collections::HashMap;

use prost_types::Timestamp;
use serde::Deserialize;

/// Opaque typed payload of a record
#[derive(Clone, PartialEq, prost::Message, Deserialize)]
#[serde(default)]
pub struct Any {
    /// Declared data type, e.g. `tekton.dev/v1.PipelineRun`
    #[prost(string, tag = "1")]
    #[serde(rename = "type")]
    pub type_: String,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(deserialize_with = "base64_bytes::deserialize")]
    pub value: Vec<u8>,
}

/// Parent grouping entity owning records
#[derive(Clone, PartialEq, prost::Message, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "12")]
    pub uid: String,
    #[prost(map = "string, string", tag = "5")]
    pub annotations: HashMap<String, String>,
    #[prost(string, tag = "6")]
    pub etag: String,
    #[prost(message, optional, tag = "10")]
    #[serde(deserialize_with = "rfc3339::deserialize")]
    pub create_time: Option<Timestamp>,
    #[prost(message, optional, tag = "11")]
    #[serde(deserialize_with = "rfc3339::deserialize")]
    pub update_time: Option<Timestamp>,
}

/// One stored execution object
#[derive(Clone, PartialEq, prost::Message, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Record {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "8")]
    pub uid: String,
    #[prost(message, optional, tag = "3")]
    pub data: Option<Any>,
    #[prost(string, tag = "4")]
    pub etag: String,
    #[prost(message, optional, tag = "9")]
    #[serde(deserialize_with = "rfc3339::deserialize")]
    pub create_time: Option<Timestamp>,
    #[prost(message, optional, tag = "10")]
    #[serde(deserialize_with = "rfc3339::deserialize")]
    pub update_time: Option<Timestamp>,
}

impl Record {
    /// Result this record belongs to (`<ns>/results/<id>`)
    pub fn parent(&self) -> Option<&str> {
        self.name
            .rsplit_once("/records/")
            .map(|(parent, _)| parent)
    }

    /// Raw payload bytes, empty if the record carries no data
    pub fn payload(&self) -> &[u8] {
        self.data.as_ref().map(|d| d.value.as_slice()).unwrap_or_default()
    }
}

/// One chunk of a log stream (`google.api.HttpBody`)
#[derive(Clone, PartialEq, prost::Message)]
pub struct HttpBody {
    #[prost(string, tag = "1")]
    pub content_type: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: bytes::Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetResultRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteResultRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListResultsRequest {
    #[prost(string, tag = "1")]
    pub parent: String,
    #[prost(string, tag = "2")]
    pub filter: String,
    #[prost(int32, tag = "3")]
    pub page_size: i32,
    #[prost(string, tag = "4")]
    pub page_token: String,
    #[prost(string, tag = "5")]
    pub order_by: String,
}

#[derive(Clone, PartialEq, prost::Message, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListResultsResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<ResultEntry>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateResultRequest {
    #[prost(string, tag = "1")]
    pub parent: String,
    #[prost(message, optional, tag = "2")]
    pub result: Option<ResultEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateResultRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub result: Option<ResultEntry>,
    #[prost(string, tag = "3")]
    pub etag: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetRecordRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteRecordRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Shared by `ListRecords` and `ListLogs`
#[derive(Clone, PartialEq, prost::Message)]
pub struct ListRecordsRequest {
    #[prost(string, tag = "1")]
    pub parent: String,
    #[prost(string, tag = "2")]
    pub filter: String,
    #[prost(int32, tag = "3")]
    pub page_size: i32,
    #[prost(string, tag = "4")]
    pub page_token: String,
    #[prost(string, tag = "5")]
    pub order_by: String,
}

#[derive(Clone, PartialEq, prost::Message, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListRecordsResponse {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<Record>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateRecordRequest {
    #[prost(string, tag = "1")]
    pub parent: String,
    #[prost(message, optional, tag = "2")]
    pub record: Option<Record>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateRecordRequest {
    #[prost(message, optional, tag = "1")]
    pub record: Option<Record>,
    #[prost(string, tag = "2")]
    pub etag: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetLogRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteLogRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Empty reply of the delete calls
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Empty {}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod rfc3339 {
    use chrono::DateTime;
    use prost_types::Timestamp;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        Ok(Some(Timestamp {
            seconds: parsed.timestamp(),
            nanos: parsed.timestamp_subsec_nanos() as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_record_from_protojson() {
        let json = r#"{
            "name": "default/results/r1/records/p1",
            "id": "p1",
            "uid": "8c3e",
            "data": {"type": "tekton.dev/v1.PipelineRun", "value": "eyJhIjoxfQ=="},
            "etag": "p1-1",
            "createTime": "2024-03-01T10:00:00Z",
            "updateTime": "2024-03-01T10:05:30.250Z"
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "default/results/r1/records/p1");
        assert_eq!(record.payload(), br#"{"a":1}"#);
        assert_eq!(record.data.as_ref().unwrap().type_, "tekton.dev/v1.PipelineRun");
        let updated = record.update_time.unwrap();
        assert_eq!(updated.nanos, 250_000_000);
        assert_eq!(updated.seconds - record.create_time.unwrap().seconds, 330);
    }

    #[test]
    fn test_missing_fields_default() {
        let response: ListRecordsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.records.is_empty());
        assert!(response.next_page_token.is_empty());

        let record: Record = serde_json::from_str(r#"{"name": "ns/results/a/records/b"}"#).unwrap();
        assert!(record.data.is_none());
        assert!(record.payload().is_empty());
    }

    #[test]
    fn test_record_parent() {
        let record = Record {
            name: "default/results/r1/records/p1".to_string(),
            ..Default::default()
        };
        assert_eq!(record.parent(), Some("default/results/r1"));
        assert_eq!(Record::default().parent(), None);
    }

    #[test]
    fn test_protobuf_encoding_roundtrip_preserves_payload() {
        let record = Record {
            name: "ns/results/a/records/b".to_string(),
            data: Some(Any {
                type_: "tekton.dev/v1.TaskRun".to_string(),
                value: b"{}".to_vec(),
            }),
            ..Default::default()
        };
        let decoded = Record::decode(record.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let json = r#"{"data": {"type": "x", "value": "***"}}"#;
        assert!(serde_json::from_str::<Record>(json).is_err());
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Transport clients for the results API
//!
//! [`ResultsClient`] is the capability set the query and delete engine
//! needs. Two implementations exist: [`grpc::GrpcClient`] talks to the
//! native gRPC service and [`rest::RestClient`] to the HTTP/JSON bridge.
//! [`new_client`] picks one from a [`ClientConfig`].

pub mod grpc;
pub mod rest;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tracing::debug;
use url::Url;

use super::error::{Result, ResultsError};
use super::proto::{
    CreateRecordRequest, CreateResultRequest, DeleteLogRequest, DeleteRecordRequest,
    DeleteResultRequest, GetLogRequest, GetRecordRequest, GetResultRequest, ListRecordsRequest,
    ListRecordsResponse, ListResultsRequest, ListResultsResponse, Record, ResultEntry,
    UpdateRecordRequest, UpdateResultRequest,
};

/// Default API path of the REST bridge
pub const DEFAULT_API_PATH: &str = "/apis/results.tekton.dev/v1alpha2";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream of log chunks
pub type LogStream = BoxStream<'static, Result<Bytes>>;

/// Operations against the results API
///
/// Create and update calls are part of the API surface but this tool never
/// issues them; their default bodies fail with [`ResultsError::Unimplemented`].
#[async_trait]
pub trait ResultsClient: Send + Sync {
    async fn get_result(&self, req: GetResultRequest) -> Result<ResultEntry>;

    async fn list_results(&self, req: ListResultsRequest) -> Result<ListResultsResponse>;

    async fn delete_result(&self, req: DeleteResultRequest) -> Result<()>;

    async fn get_record(&self, req: GetRecordRequest) -> Result<Record>;

    async fn list_records(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse>;

    async fn delete_record(&self, req: DeleteRecordRequest) -> Result<()>;

    async fn get_log(&self, req: GetLogRequest) -> Result<LogStream>;

    /// Log entries share the record shape
    async fn list_logs(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse>;

    async fn delete_log(&self, req: DeleteLogRequest) -> Result<()>;

    async fn create_result(&self, _req: CreateResultRequest) -> Result<ResultEntry> {
        Err(ResultsError::Unimplemented("CreateResult"))
    }

    async fn update_result(&self, _req: UpdateResultRequest) -> Result<ResultEntry> {
        Err(ResultsError::Unimplemented("UpdateResult"))
    }

    async fn create_record(&self, _req: CreateRecordRequest) -> Result<Record> {
        Err(ResultsError::Unimplemented("CreateRecord"))
    }

    async fn update_record(&self, _req: UpdateRecordRequest) -> Result<Record> {
        Err(ResultsError::Unimplemented("UpdateRecord"))
    }

    async fn update_log(&self, _name: &str, _data: Bytes) -> Result<()> {
        Err(ResultsError::Unimplemented("UpdateLog"))
    }
}

/// Wire protocol used to reach the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientType {
    Grpc,
    #[default]
    Rest,
}

impl FromStr for ClientType {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GRPC" => Ok(ClientType::Grpc),
            "REST" => Ok(ClientType::Rest),
            _ => Err(ResultsError::Config(format!(
                "unknown client type '{}', expected GRPC or REST",
                s
            ))),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Grpc => f.write_str("GRPC"),
            ClientType::Rest => f.write_str("REST"),
        }
    }
}

/// Identity to act as on the API server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Impersonation {
    pub user: String,
    pub uid: String,
    pub groups: Vec<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

impl Impersonation {
    /// Header name/value pairs, in a stable order
    ///
    /// Returns nothing unless a user is set.
    pub fn headers(&self) -> Vec<(String, String)> {
        if self.user.is_empty() {
            return Vec::new();
        }
        let mut headers = vec![("impersonate-user".to_string(), self.user.clone())];
        if !self.uid.is_empty() {
            headers.push(("impersonate-uid".to_string(), self.uid.clone()));
        }
        for group in &self.groups {
            headers.push(("impersonate-group".to_string(), group.clone()));
        }
        for (key, values) in &self.extra {
            for value in values {
                headers.push((format!("impersonate-extra-{}", key.to_ascii_lowercase()), value.clone()));
            }
        }
        headers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub insecure_skip_verify: bool,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub server_name: Option<String>,
}

impl TlsOptions {
    /// Read the PEM client identity, if both halves are configured
    pub(crate) fn identity_pem(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Ok(Some((std::fs::read(cert)?, std::fs::read(key)?))),
            (None, None) => Ok(None),
            _ => Err(ResultsError::Config(
                "client-certificate and client-key must be set together".to_string(),
            )),
        }
    }

    pub(crate) fn ca_pem(&self) -> Result<Option<Vec<u8>>> {
        self.ca_file
            .as_ref()
            .map(std::fs::read)
            .transpose()
            .map_err(ResultsError::from)
    }
}

/// Everything needed to build a transport
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_type: ClientType,
    pub host: Url,
    /// Path prefix of the REST bridge; ignored by gRPC
    pub api_path: String,
    pub timeout: Duration,
    pub token: Option<String>,
    pub impersonation: Impersonation,
    pub tls: TlsOptions,
}

impl ClientConfig {
    pub fn new(client_type: ClientType, host: Url) -> Self {
        Self {
            client_type,
            host,
            api_path: DEFAULT_API_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
            impersonation: Impersonation::default(),
            tls: TlsOptions::default(),
        }
    }
}

/// Build the transport selected by `config.client_type`
pub async fn new_client(config: &ClientConfig) -> Result<Box<dyn ResultsClient>> {
    debug!(
        client_type = %config.client_type,
        host = %config.host,
        "Creating results client"
    );
    match config.client_type {
        ClientType::Grpc => Ok(Box::new(grpc::GrpcClient::connect(config).await?)),
        ClientType::Rest => Ok(Box::new(rest::RestClient::new(config)?)),
    }
}

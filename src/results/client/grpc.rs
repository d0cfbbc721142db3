// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! gRPC transport
//!
//! Calls go through a generic `tonic::client::Grpc` over one channel, so
//! no generated stubs are needed. Credentials and impersonation headers are
//! attached to every call by the [`Credentials`] interceptor.

use async_trait::async_trait;
use futures::StreamExt;
use http::uri::PathAndQuery;
use tonic::Request;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::{debug, trace, warn};
use url::Url;

use super::{ClientConfig, LogStream, ResultsClient};
use crate::results::error::{Result, ResultsError};
use crate::results::proto::{
    DeleteLogRequest, DeleteRecordRequest, DeleteResultRequest, Empty, GetLogRequest,
    GetRecordRequest, GetResultRequest, HttpBody, ListRecordsRequest, ListRecordsResponse,
    ListResultsRequest, ListResultsResponse, Record, ResultEntry,
};

mod method {
    macro_rules! results {
        ($name:literal) => {
            concat!("/tekton.results.v1alpha2.Results/", $name)
        };
    }
    macro_rules! logs {
        ($name:literal) => {
            concat!("/tekton.results.v1alpha2.Logs/", $name)
        };
    }

    pub const GET_RESULT: &str = results!("GetResult");
    pub const LIST_RESULTS: &str = results!("ListResults");
    pub const DELETE_RESULT: &str = results!("DeleteResult");
    pub const GET_RECORD: &str = results!("GetRecord");
    pub const LIST_RECORDS: &str = results!("ListRecords");
    pub const DELETE_RECORD: &str = results!("DeleteRecord");
    pub const GET_LOG: &str = logs!("GetLog");
    pub const LIST_LOGS: &str = logs!("ListLogs");
    pub const DELETE_LOG: &str = logs!("DeleteLog");
}

/// Adds bearer token and impersonation metadata to outgoing calls
#[derive(Clone, Default)]
pub struct Credentials {
    metadata: Vec<(AsciiMetadataKey, AsciiMetadataValue)>,
}

impl Credentials {
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut pairs = Vec::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("authorization".to_string(), format!("Bearer {}", token)));
        }
        pairs.extend(config.impersonation.headers());

        let metadata = pairs
            .into_iter()
            .map(|(key, value)| {
                let k = AsciiMetadataKey::from_bytes(key.as_bytes())
                    .map_err(|e| ResultsError::Config(format!("invalid metadata key '{}': {}", key, e)))?;
                let v = value
                    .parse::<AsciiMetadataValue>()
                    .map_err(|e| ResultsError::Config(format!("invalid value for '{}': {}", key, e)))?;
                Ok((k, v))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { metadata })
    }
}

impl Interceptor for Credentials {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, tonic::Status> {
        let metadata = request.metadata_mut();
        for (key, value) in &self.metadata {
            metadata.append(key.clone(), value.clone());
        }
        Ok(request)
    }
}

/// Host URI with an explicit port, defaulting by scheme
pub fn endpoint_uri(host: &Url, tls: bool) -> Result<String> {
    let name = host
        .host_str()
        .ok_or_else(|| ResultsError::Config(format!("host missing in '{}'", host)))?;
    let port = match (host.port(), host.scheme()) {
        (Some(port), _) => port,
        (None, "https") => 443,
        (None, "http") => 80,
        _ => {
            return Err(ResultsError::Config(
                "port or scheme missing in host".to_string(),
            ));
        }
    };
    let scheme = if tls { "https" } else { "http" };
    Ok(format!("{}://{}:{}", scheme, name, port))
}

/// Client for the native gRPC services
pub struct GrpcClient {
    inner: Grpc<InterceptedService<Channel, Credentials>>,
}

impl GrpcClient {
    /// Connect eagerly, failing if the server cannot be reached
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let endpoint = endpoint(config)?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ResultsError::Connect(format!("{}: {}", config.host, e)))?;
        Self::with_channel(channel, config)
    }

    /// Build a client whose channel connects on first use
    pub fn connect_lazy(config: &ClientConfig) -> Result<Self> {
        let channel = endpoint(config)?.connect_lazy();
        Self::with_channel(channel, config)
    }

    fn with_channel(channel: Channel, config: &ClientConfig) -> Result<Self> {
        let credentials = Credentials::from_config(config)?;
        Ok(Self {
            inner: Grpc::new(InterceptedService::new(channel, credentials)),
        })
    }

    async fn ready(&self) -> Result<Grpc<InterceptedService<Channel, Credentials>>> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| ResultsError::Connect(format!("service was not ready: {}", e)))?;
        Ok(grpc)
    }

    async fn unary<Req, Resp>(&self, path: &'static str, req: Req) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        trace!(method = path, "gRPC call");
        let mut grpc = self.ready().await?;
        let response = grpc
            .unary(
                Request::new(req),
                PathAndQuery::from_static(path),
                ProstCodec::<Req, Resp>::default(),
            )
            .await?;
        Ok(response.into_inner())
    }
}

fn endpoint(config: &ClientConfig) -> Result<Endpoint> {
    let tls = &config.tls;
    let use_tls = config.host.scheme() == "https"
        || tls.ca_file.is_some()
        || tls.cert_file.is_some()
        || tls.server_name.is_some();
    let uri = endpoint_uri(&config.host, use_tls)?;
    debug!(%uri, tls = use_tls, "Building gRPC endpoint");

    let mut endpoint = Endpoint::from_shared(uri)
        .map_err(|e| ResultsError::Config(format!("invalid host: {}", e)))?
        .timeout(config.timeout)
        .connect_timeout(config.timeout);

    if use_tls {
        if tls.insecure_skip_verify {
            warn!("insecure-skip-tls-verify is not supported by the gRPC client, verifying anyway");
        }
        let mut tls_config = ClientTlsConfig::new().with_enabled_roots();
        if let Some(ca) = tls.ca_pem()? {
            tls_config = tls_config.ca_certificate(Certificate::from_pem(ca));
        }
        if let Some((cert, key)) = tls.identity_pem()? {
            tls_config = tls_config.identity(Identity::from_pem(cert, key));
        }
        if let Some(name) = &tls.server_name {
            tls_config = tls_config.domain_name(name.clone());
        }
        endpoint = endpoint
            .tls_config(tls_config)
            .map_err(|e| ResultsError::Config(format!("invalid TLS configuration: {}", e)))?;
    }
    Ok(endpoint)
}

#[async_trait]
impl ResultsClient for GrpcClient {
    async fn get_result(&self, req: GetResultRequest) -> Result<ResultEntry> {
        self.unary(method::GET_RESULT, req).await
    }

    async fn list_results(&self, req: ListResultsRequest) -> Result<ListResultsResponse> {
        self.unary(method::LIST_RESULTS, req).await
    }

    async fn delete_result(&self, req: DeleteResultRequest) -> Result<()> {
        self.unary::<_, Empty>(method::DELETE_RESULT, req).await?;
        Ok(())
    }

    async fn get_record(&self, req: GetRecordRequest) -> Result<Record> {
        self.unary(method::GET_RECORD, req).await
    }

    async fn list_records(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        self.unary(method::LIST_RECORDS, req).await
    }

    async fn delete_record(&self, req: DeleteRecordRequest) -> Result<()> {
        self.unary::<_, Empty>(method::DELETE_RECORD, req).await?;
        Ok(())
    }

    async fn get_log(&self, req: GetLogRequest) -> Result<LogStream> {
        trace!(method = method::GET_LOG, "gRPC streaming call");
        let mut grpc = self.ready().await?;
        let response = grpc
            .server_streaming(
                Request::new(req),
                PathAndQuery::from_static(method::GET_LOG),
                ProstCodec::<GetLogRequest, HttpBody>::default(),
            )
            .await?;
        let chunks = response
            .into_inner()
            .map(|chunk| chunk.map(|body| body.data).map_err(ResultsError::from));
        Ok(Box::pin(chunks))
    }

    async fn list_logs(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        self.unary(method::LIST_LOGS, req).await
    }

    async fn delete_log(&self, req: DeleteLogRequest) -> Result<()> {
        self.unary::<_, Empty>(method::DELETE_LOG, req).await?;
        Ok(())
    }
}

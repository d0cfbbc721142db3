// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! REST transport over the HTTP/JSON bridge
//!
//! Every call maps to `<host><api-path>/parents/<routing>[/<collection>]`.
//! The routing segments come from the request's `name` or `parent`; the
//! remaining non-empty scalar fields become query parameters named after
//! their proto fields.

use async_trait::async_trait;
use futures::stream;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use super::{ClientConfig, LogStream, ResultsClient};
use crate::results::error::{Result, ResultsError};
use crate::results::proto::{
    DeleteLogRequest, DeleteRecordRequest, DeleteResultRequest, GetLogRequest, GetRecordRequest,
    GetResultRequest, ListRecordsRequest, ListRecordsResponse, ListResultsRequest,
    ListResultsResponse, Record, ResultEntry,
};

/// URL layout of a request message
trait RestRequest {
    /// Backend path the request is routed to (`name` or `parent`)
    fn route(&self) -> &str;

    /// Non-routing fields, skipping empty and zero values
    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

macro_rules! routed_by_name {
    ($($ty:ty),*) => {
        $(impl RestRequest for $ty {
            fn route(&self) -> &str {
                &self.name
            }
        })*
    };
}

routed_by_name!(
    GetResultRequest,
    DeleteResultRequest,
    GetRecordRequest,
    DeleteRecordRequest,
    GetLogRequest,
    DeleteLogRequest
);

fn list_query(
    filter: &str,
    page_size: i32,
    page_token: &str,
    order_by: &str,
) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !filter.is_empty() {
        query.push(("filter", filter.to_string()));
    }
    if page_size != 0 {
        query.push(("page_size", page_size.to_string()));
    }
    if !page_token.is_empty() {
        query.push(("page_token", page_token.to_string()));
    }
    if !order_by.is_empty() {
        query.push(("order_by", order_by.to_string()));
    }
    query
}

impl RestRequest for ListResultsRequest {
    fn route(&self) -> &str {
        &self.parent
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        list_query(&self.filter, self.page_size, &self.page_token, &self.order_by)
    }
}

impl RestRequest for ListRecordsRequest {
    fn route(&self) -> &str {
        &self.parent
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        list_query(&self.filter, self.page_size, &self.page_token, &self.order_by)
    }
}

/// Client for the results REST bridge
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    /// Build the client; no connection is made until the first call
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base = config.host.clone();
        {
            let mut segments = base.path_segments_mut().map_err(|_| {
                ResultsError::Config(format!("host '{}' cannot carry a path", config.host))
            })?;
            segments
                .pop_if_empty()
                .extend(config.api_path.split('/').filter(|s| !s.is_empty()));
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(config)?);

        if config.tls.insecure_skip_verify {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca) = config.tls.ca_pem()? {
            let cert = reqwest::Certificate::from_pem(&ca)
                .map_err(|e| ResultsError::Config(format!("invalid certificate-authority: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some((mut cert, key)) = config.tls.identity_pem()? {
            cert.push(b'\n');
            cert.extend_from_slice(&key);
            let identity = reqwest::Identity::from_pem(&cert)
                .map_err(|e| ResultsError::Config(format!("invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }
        if let Some(name) = &config.tls.server_name {
            warn!(server_name = %name, "tls-server-name is not supported by the REST client, ignoring");
        }

        let http = builder
            .build()
            .map_err(|e| ResultsError::Connect(e.to_string()))?;

        debug!(base = %base, "REST client ready");
        Ok(Self { http, base })
    }

    /// Full URL for a route, optionally suffixed by a collection
    fn url(&self, route: &str, collection: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ResultsError::Config(format!("invalid base URL '{}'", self.base)))?;
            segments
                .push("parents")
                .extend(route.split('/').filter(|s| !s.is_empty()));
            if let Some(collection) = collection {
                segments.push(collection);
            }
        }
        Ok(url)
    }

    fn request<R: RestRequest>(
        &self,
        method: Method,
        req: &R,
        collection: Option<&str>,
    ) -> Result<RequestBuilder> {
        let url = self.url(req.route(), collection)?;
        let query = req.query();
        trace!(%method, %url, ?query, "REST request");
        let mut builder = self.http.request(method, url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        Ok(builder)
    }

    async fn call<R: RestRequest, T: DeserializeOwned>(
        &self,
        method: Method,
        req: &R,
        collection: Option<&str>,
        what: &str,
    ) -> Result<T> {
        let response = check(self.request(method, req, collection)?.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ResultsError::Decode {
            what: what.to_string(),
            source,
        })
    }

    async fn delete<R: RestRequest>(&self, req: &R) -> Result<()> {
        check(self.request(Method::DELETE, req, None)?.send().await?).await?;
        Ok(())
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ResultsError::Config(format!("invalid token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    for (name, value) in config.impersonation.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ResultsError::Config(format!("invalid header '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| ResultsError::Config(format!("invalid value for '{}': {}", name, e)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Turn non-2xx responses into [`ResultsError::Http`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body.trim().to_string()
            }
        });
    debug!(status = status.as_u16(), %message, "REST call failed");
    Err(ResultsError::Http {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ResultsClient for RestClient {
    async fn get_result(&self, req: GetResultRequest) -> Result<ResultEntry> {
        self.call(Method::GET, &req, None, "result").await
    }

    async fn list_results(&self, req: ListResultsRequest) -> Result<ListResultsResponse> {
        self.call(Method::GET, &req, Some("results"), "result list")
            .await
    }

    async fn delete_result(&self, req: DeleteResultRequest) -> Result<()> {
        self.delete(&req).await
    }

    async fn get_record(&self, req: GetRecordRequest) -> Result<Record> {
        self.call(Method::GET, &req, None, "record").await
    }

    async fn list_records(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        self.call(Method::GET, &req, Some("records"), "record list")
            .await
    }

    async fn delete_record(&self, req: DeleteRecordRequest) -> Result<()> {
        self.delete(&req).await
    }

    async fn get_log(&self, req: GetLogRequest) -> Result<LogStream> {
        let response = check(self.request(Method::GET, &req, None)?.send().await?).await?;
        let body = response.bytes().await?;
        Ok(Box::pin(stream::once(async move { Ok(body) })))
    }

    async fn list_logs(&self, req: ListRecordsRequest) -> Result<ListRecordsResponse> {
        self.call(Method::GET, &req, Some("logs"), "log list").await
    }

    async fn delete_log(&self, req: DeleteLogRequest) -> Result<()> {
        self.delete(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::client::{ClientType, Impersonation};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API: &str = "/apis/results.tekton.dev/v1alpha2";

    fn client_for(server: &MockServer) -> RestClient {
        let mut config = ClientConfig::new(ClientType::Rest, Url::parse(&server.uri()).unwrap());
        config.token = Some("s3cr3t".to_string());
        RestClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_url_layout() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let url = client.url("default/results/-", Some("records")).unwrap();
        assert_eq!(
            url.path(),
            "/apis/results.tekton.dev/v1alpha2/parents/default/results/-/records"
        );
        let url = client.url("ns/results/r1/records/p1", None).unwrap();
        assert_eq!(
            url.path(),
            "/apis/results.tekton.dev/v1alpha2/parents/ns/results/r1/records/p1"
        );
    }

    #[test]
    fn test_list_query_skips_empty_fields() {
        let req = ListRecordsRequest {
            parent: "ns/results/-".to_string(),
            filter: String::new(),
            page_size: 10,
            page_token: String::new(),
            order_by: "update_time desc".to_string(),
        };
        assert_eq!(
            req.query(),
            vec![
                ("page_size", "10".to_string()),
                ("order_by", "update_time desc".to_string()),
            ]
        );
        assert_eq!(req.route(), "ns/results/-");
        assert!(ListRecordsRequest::default().query().is_empty());
    }

    #[tokio::test]
    async fn test_list_records_sends_query_and_token() {
        let server = MockServer::start().await;
        let payload = STANDARD.encode(br#"{"kind":"PipelineRun"}"#);
        Mock::given(method("GET"))
            .and(path(format!("{}/parents/default/results/-/records", API)))
            .and(query_param("filter", "data.metadata.name.contains(\"build\")"))
            .and(query_param("page_size", "5"))
            .and(query_param("page_token", "abc"))
            .and(header("authorization", "Bearer s3cr3t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{
                    "name": "default/results/r1/records/p1",
                    "uid": "p1",
                    "data": {"type": "tekton.dev/v1.PipelineRun", "value": payload}
                }],
                "nextPageToken": "def"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .list_records(ListRecordsRequest {
                parent: "default/results/-".to_string(),
                filter: "data.metadata.name.contains(\"build\")".to_string(),
                page_size: 5,
                page_token: "abc".to_string(),
                order_by: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.next_page_token, "def");
        assert_eq!(response.records.len(), 1);
        assert_eq!(response.records[0].payload(), br#"{"kind":"PipelineRun"}"#);
    }

    #[tokio::test]
    async fn test_not_found_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 5, "message": "record not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .get_record(GetRecordRequest {
                name: "ns/results/r1/records/missing".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("record not found"));
    }

    #[tokio::test]
    async fn test_delete_uses_delete_verb() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/parents/ns/results/r1/records/p1", API)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .delete_record(DeleteRecordRequest {
                name: "ns/results/r1/records/p1".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .delete_result(DeleteResultRequest {
                name: "ns/results/r1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResultsError::Http { status: 403, ref message } if message == "forbidden"));
    }

    #[tokio::test]
    async fn test_get_log_single_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/parents/ns/results/r1/logs/l1", API)))
            .respond_with(ResponseTemplate::new(200).set_body_string("line 1\nline 2\n"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let chunks: Vec<_> = client
            .get_log(GetLogRequest {
                name: "ns/results/r1/logs/l1".to_string(),
            })
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().as_ref(), b"line 1\nline 2\n");
    }

    #[tokio::test]
    async fn test_impersonation_headers_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("impersonate-user", "alice"))
            .and(header("impersonate-uid", "1001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ns/results/r1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ClientConfig::new(ClientType::Rest, Url::parse(&server.uri()).unwrap());
        config.impersonation = Impersonation {
            user: "alice".to_string(),
            uid: "1001".to_string(),
            groups: vec!["dev".to_string()],
            ..Default::default()
        };
        let client = RestClient::new(&config).unwrap();
        let result = client
            .get_result(GetResultRequest {
                name: "ns/results/r1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result.name, "ns/results/r1");
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .list_results(ListResultsRequest {
                parent: "ns".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResultsError::Decode { .. }));
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Locate the results API on the cluster
//!
//! Used when a context has no `host` configured. The API service is found
//! by label, then matched to the OpenShift routes in its namespace that
//! forward to it. Exactly one match is required; anything else is left to
//! `config set host=<url>`.

use anyhow::{Context, Result, bail};
use k8s_openapi::api::core::v1::Service;
use kube::api::{DynamicObject, ListParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Api, Client};
use serde_json::Value;
use tracing::{debug, info};

/// Label carried by the results API service
pub const SERVICE_LABEL: &str = "app.kubernetes.io/name=tekton-results-api";

const MANUAL_HINT: &str = "set it with 'resultsctl config set host=<url>'";

/// A route exposing the results API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub namespace: String,
    pub host: String,
}

fn route_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("route.openshift.io", "v1", "Route"))
}

/// Whether a route's target port names one of the service's ports
///
/// A route without a port forwards to the service's first port.
fn port_matches(service: &Service, target: &Value) -> bool {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();
    match target {
        Value::Null => !ports.is_empty(),
        Value::Number(n) => ports.iter().any(|p| Some(i64::from(p.port)) == n.as_i64()),
        Value::String(name) => ports
            .iter()
            .any(|p| p.name.as_deref() == Some(name.as_str()) || p.port.to_string() == *name),
        _ => false,
    }
}

/// Routes forwarding to `service`, as candidate hosts
pub fn match_routes(service: &Service, routes: &[DynamicObject]) -> Vec<Candidate> {
    let Some(service_name) = service.metadata.name.as_deref() else {
        return Vec::new();
    };
    routes
        .iter()
        .filter_map(|route| {
            let spec = route.data.get("spec")?;
            if spec["to"]["name"].as_str() != Some(service_name) {
                return None;
            }
            if !port_matches(service, &spec["port"]["targetPort"]) {
                return None;
            }
            let host = spec["host"].as_str().filter(|h| !h.is_empty())?;
            let scheme = if spec["tls"].is_null() { "http" } else { "https" };
            Some(Candidate {
                namespace: route.metadata.namespace.clone().unwrap_or_default(),
                host: format!("{}://{}", scheme, host),
            })
        })
        .collect()
}

/// The single candidate, or an error naming all of them
pub fn select_host(candidates: &[Candidate]) -> Result<String> {
    match candidates {
        [] => bail!("Results API host is not configured and no route to it was found, {}", MANUAL_HINT),
        [only] => Ok(only.host.clone()),
        many => {
            let listed: Vec<String> = many
                .iter()
                .map(|c| format!("{} [{}]", c.host, c.namespace))
                .collect();
            bail!(
                "Found several results API routes ({}), {}",
                listed.join(", "),
                MANUAL_HINT
            )
        }
    }
}

/// Every route exposing a labelled results API service
pub async fn discover(client: Client) -> Result<Vec<Candidate>> {
    let services: Api<Service> = Api::all(client.clone());
    let services = services
        .list(&ListParams::default().labels(SERVICE_LABEL))
        .await
        .context("Failed to list results API services")?;
    debug!(count = services.items.len(), "Found results API services");

    let ar = route_resource();
    let mut candidates = Vec::new();
    for service in &services.items {
        let Some(namespace) = service.metadata.namespace.as_deref() else {
            continue;
        };
        let routes: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &ar);
        let routes = match routes.list(&ListParams::default()).await {
            Ok(list) => list.items,
            // Not an OpenShift cluster
            Err(kube::Error::Api(e)) if e.code == 404 => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list routes in namespace '{}'", namespace));
            }
        };
        candidates.extend(match_routes(service, &routes));
    }
    Ok(candidates)
}

/// Find the results API host for a kube context
pub async fn discover_host(config: kube::Config) -> Result<String> {
    let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
    let candidates = discover(client).await?;
    let host = select_host(&candidates)?;
    info!(host = %host, "Discovered results API host");
    Ok(host)
}

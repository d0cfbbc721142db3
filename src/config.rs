// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for resultsctl
//!
//! Connection settings for the results API live in the kubeconfig, as a
//! named extension (`tekton-results`) on each context, so switching context
//! switches results endpoint too. Values missing there fall back to the
//! context itself (token, impersonation, namespace).
//!
//! Local state is kept under ~/.resultsctl/:
//! - ~/.resultsctl/log/ - rolling log files

use anyhow::{Context, Result, anyhow, bail};
use kube::config::{KubeConfigOptions, Kubeconfig};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::results::client::{
    ClientConfig, ClientType, DEFAULT_API_PATH, DEFAULT_TIMEOUT, Impersonation, TlsOptions,
};

/// Name of the kubeconfig context extension holding results settings
pub const EXTENSION_NAME: &str = "tekton-results";

/// Keys accepted by `config set`
pub const EXTENSION_KEYS: &[&str] = &[
    "client-type",
    "host",
    "api-path",
    "insecure-skip-tls-verify",
    "timeout",
    "certificate-authority",
    "client-certificate",
    "client-key",
    "tls-server-name",
    "act-as",
    "act-as-uid",
    "act-as-groups",
    "token",
];

/// Get the base resultsctl directory (~/.resultsctl/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".resultsctl"))
        .context("Could not determine home directory")
}

/// Results settings stored on a kubeconfig context
///
/// Every value is a string, as written by `config set`; unknown keys are
/// preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResultsExtension {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_bool"
    )]
    pub insecure_skip_tls_verify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(rename = "act-as", skip_serializing_if = "Option::is_none")]
    pub act_as: Option<String>,
    #[serde(rename = "act-as-uid", skip_serializing_if = "Option::is_none")]
    pub act_as_uid: Option<String>,
    #[serde(rename = "act-as-groups", skip_serializing_if = "Option::is_none")]
    pub act_as_groups: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Hand-edited kubeconfigs may carry a YAML bool instead of a string
fn string_or_bool<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Bool(b) => b.to_string(),
        Raw::Text(s) => s,
    }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ResultsExtension {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "client-type" => &mut self.client_type,
            "host" => &mut self.host,
            "api-path" => &mut self.api_path,
            "insecure-skip-tls-verify" => &mut self.insecure_skip_tls_verify,
            "timeout" => &mut self.timeout,
            "certificate-authority" => &mut self.certificate_authority,
            "client-certificate" => &mut self.client_certificate,
            "client-key" => &mut self.client_key,
            "tls-server-name" => &mut self.tls_server_name,
            "act-as" => &mut self.act_as,
            "act-as-uid" => &mut self.act_as_uid,
            "act-as-groups" => &mut self.act_as_groups,
            "token" => &mut self.token,
            _ => return None,
        })
    }

    /// Set one key; an empty value removes it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        if !value.is_empty() {
            validate(key, value)?;
        }
        let slot = self.slot(key).ok_or_else(|| {
            anyhow!(
                "Unknown config key '{}', expected one of: {}",
                key,
                EXTENSION_KEYS.join(", ")
            )
        })?;
        *slot = (!value.is_empty()).then(|| value.to_string());
        Ok(())
    }

    /// Apply `key=value` assignments in order
    pub fn apply(&mut self, assignments: &[String]) -> Result<()> {
        for assignment in assignments {
            let (key, value) = assignment
                .split_once('=')
                .with_context(|| format!("Expected key=value, got '{}'", assignment))?;
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Resolve a transport configuration, falling back to the context defaults
    pub fn to_client_config(&self, defaults: &KubeDefaults) -> Result<ClientConfig> {
        let host = non_empty(&self.host).context(
            "Results API host is not configured, set it with 'resultsctl config set host=<url>'",
        )?;
        let host = Url::parse(host).with_context(|| format!("Invalid host '{}'", host))?;

        let client_type = match non_empty(&self.client_type) {
            Some(ct) => ct.parse::<ClientType>()?,
            None => ClientType::default(),
        };

        let mut config = ClientConfig::new(client_type, host);
        if let Some(path) = non_empty(&self.api_path) {
            config.api_path = path.to_string();
        }
        config.timeout = match non_empty(&self.timeout) {
            Some(t) => parse_timeout(t)?,
            None => DEFAULT_TIMEOUT,
        };
        config.token = non_empty(&self.token)
            .map(String::from)
            .or_else(|| defaults.token.clone());

        config.impersonation = match non_empty(&self.act_as) {
            Some(user) => Impersonation {
                user: user.to_string(),
                uid: non_empty(&self.act_as_uid).unwrap_or_default().to_string(),
                groups: non_empty(&self.act_as_groups)
                    .map(split_groups)
                    .unwrap_or_default(),
                extra: BTreeMap::new(),
            },
            None => Impersonation {
                user: defaults.impersonate.clone().unwrap_or_default(),
                groups: defaults.impersonate_groups.clone(),
                ..Default::default()
            },
        };

        config.tls = TlsOptions {
            insecure_skip_verify: match non_empty(&self.insecure_skip_tls_verify) {
                Some(v) => parse_bool(v)?,
                None => false,
            },
            ca_file: non_empty(&self.certificate_authority).map(PathBuf::from),
            cert_file: non_empty(&self.client_certificate).map(PathBuf::from),
            key_file: non_empty(&self.client_key).map(PathBuf::from),
            server_name: non_empty(&self.tls_server_name).map(String::from),
        };

        debug!(
            client_type = %config.client_type,
            host = %config.host,
            api_path = %config.api_path,
            timeout = ?config.timeout,
            "Resolved results client configuration"
        );
        Ok(config)
    }
}

fn split_groups(groups: &str) -> Vec<String> {
    groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("Expected true or false, got '{}'", value))
}

fn parse_timeout(value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("Invalid timeout '{}'", value))
}

fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        "client-type" => {
            value.parse::<ClientType>()?;
        }
        "host" => {
            Url::parse(value).with_context(|| format!("Invalid host '{}'", value))?;
        }
        "insecure-skip-tls-verify" => {
            parse_bool(value)?;
        }
        "timeout" => {
            parse_timeout(value)?;
        }
        _ => {}
    }
    Ok(())
}

/// Settings taken from the kubeconfig context itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubeDefaults {
    pub token: Option<String>,
    pub namespace: String,
    pub impersonate: Option<String>,
    pub impersonate_groups: Vec<String>,
}

/// Resolve a context through kube's config loader
pub async fn load_kube_config(kubeconfig: Kubeconfig, context: &str) -> Result<kube::Config> {
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{}'", context))
}

impl KubeDefaults {
    pub fn from_config(config: &kube::Config) -> Self {
        Self {
            token: config
                .auth_info
                .token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            namespace: config.default_namespace.clone(),
            impersonate: config.auth_info.impersonate.clone(),
            impersonate_groups: config.auth_info.impersonate_groups.clone().unwrap_or_default(),
        }
    }
}

/// A kubeconfig file edited in place
///
/// Only the extension entry of a context is touched; everything else is
/// written back as read.
#[derive(Debug, Clone)]
pub struct KubeconfigFile {
    path: PathBuf,
    doc: Value,
}

impl KubeconfigFile {
    /// First entry of `$KUBECONFIG`, else ~/.kube/config
    pub fn default_path() -> Result<PathBuf> {
        if let Some(paths) = std::env::var_os("KUBECONFIG")
            && let Some(first) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty())
        {
            return Ok(first);
        }
        dirs::home_dir()
            .map(|p| p.join(".kube").join("config"))
            .context("Could not determine home directory")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
        let doc: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse kubeconfig: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed view of the same file
    pub fn kubeconfig(&self) -> Result<Kubeconfig> {
        Kubeconfig::read_from(&self.path)
            .with_context(|| format!("Failed to load kubeconfig: {}", self.path.display()))
    }

    pub fn current_context(&self) -> Option<&str> {
        self.doc.get("current-context").and_then(Value::as_str)
    }

    /// The requested context, or the current one
    pub fn resolve_context(&self, context: Option<&str>) -> Result<String> {
        let name = context
            .or_else(|| self.current_context())
            .filter(|c| !c.is_empty())
            .context("No context specified and no current context in kubeconfig")?;
        self.context(name)?;
        Ok(name.to_string())
    }

    fn context(&self, name: &str) -> Result<&Value> {
        self.doc
            .get("contexts")
            .and_then(Value::as_sequence)
            .into_iter()
            .flatten()
            .find(|c| c.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|c| c.get("context"))
            .with_context(|| format!("Context '{}' not found in kubeconfig", name))
    }

    fn context_mut(&mut self, name: &str) -> Result<&mut Mapping> {
        self.doc
            .get_mut("contexts")
            .and_then(Value::as_sequence_mut)
            .into_iter()
            .flatten()
            .find(|c| c.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|c| c.get_mut("context"))
            .and_then(Value::as_mapping_mut)
            .with_context(|| format!("Context '{}' not found in kubeconfig", name))
    }

    /// Results settings of a context, if any were saved
    pub fn extension(&self, context: &str) -> Result<Option<ResultsExtension>> {
        let entry = self
            .context(context)?
            .get("extensions")
            .and_then(Value::as_sequence)
            .into_iter()
            .flatten()
            .find(|e| e.get("name").and_then(Value::as_str) == Some(EXTENSION_NAME))
            .and_then(|e| e.get("extension"));
        match entry {
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Invalid {} extension on context '{}'", EXTENSION_NAME, context)),
            None => Ok(None),
        }
    }

    pub fn set_extension(&mut self, context: &str, extension: &ResultsExtension) -> Result<()> {
        let value = serde_yaml::to_value(extension).context("Failed to serialize extension")?;
        let ctx = self.context_mut(context)?;
        let extensions = ctx
            .entry(Value::from("extensions"))
            .or_insert_with(|| Value::Sequence(Vec::new()));
        if !extensions.is_sequence() {
            *extensions = Value::Sequence(Vec::new());
        }
        let Some(list) = extensions.as_sequence_mut() else {
            bail!("Invalid extensions on context '{}'", context);
        };

        let mut entry = Mapping::new();
        entry.insert(Value::from("name"), Value::from(EXTENSION_NAME));
        entry.insert(Value::from("extension"), value);

        match list
            .iter_mut()
            .find(|e| e.get("name").and_then(Value::as_str) == Some(EXTENSION_NAME))
        {
            Some(existing) => *existing = Value::Mapping(entry),
            None => list.push(Value::Mapping(entry)),
        }
        Ok(())
    }

    /// Drop the results settings of a context; returns whether any existed
    pub fn remove_extension(&mut self, context: &str) -> Result<bool> {
        let ctx = self.context_mut(context)?;
        let Some(list) = ctx
            .get_mut("extensions")
            .and_then(Value::as_sequence_mut)
        else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|e| e.get("name").and_then(Value::as_str) != Some(EXTENSION_NAME));
        Ok(list.len() != before)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.doc).context("Failed to serialize kubeconfig")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write kubeconfig: {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Saved kubeconfig");
        Ok(())
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
mod config_cmd;
mod delete;
mod get;
mod logs;

pub use args::{Args, Command, ConfigCommand, OutputFormat, SelectorArgs};

use anyhow::{Context, Result, anyhow, bail};
use kube::api::DynamicObject;
use std::path::PathBuf;
use tracing::{debug, info};

use resultsctl::config::{KubeDefaults, KubeconfigFile, load_kube_config};
use resultsctl::discovery::discover_host;
use resultsctl::results::resources::{ResourceSchema, get_resource_schema, list_resources};
use resultsctl::results::selector::{
    ALL_NAMESPACES, Selector, parse_key_values, parse_list, parse_owner_references,
};
use resultsctl::results::{ResultsClient, new_client};

/// Connected client plus the namespace commands operate in
pub struct Session {
    pub client: Box<dyn ResultsClient>,
    pub context: String,
    pub namespace: String,
}

impl Session {
    pub async fn connect(args: &Args) -> Result<Self> {
        let mut file = KubeconfigFile::load(&kubeconfig_path(args)?)?;
        let context = file.resolve_context(args.context.as_deref())?;
        let mut extension = file.extension(&context)?.unwrap_or_default();
        let kube_config = load_kube_config(file.kubeconfig()?, &context).await?;
        let defaults = KubeDefaults::from_config(&kube_config);

        if extension.host.as_deref().is_none_or(|h| h.trim().is_empty()) {
            let host = discover_host(kube_config)
                .await
                .with_context(|| format!("No results API host for context '{}'", context))?;
            extension.host = Some(host);
            file.set_extension(&context, &extension)?;
            file.save()?;
        }
        let config = extension
            .to_client_config(&defaults)
            .with_context(|| format!("Invalid results configuration for context '{}'", context))?;

        let client = new_client(&config)
            .await
            .with_context(|| format!("Failed to create results client for context '{}'", context))?;

        let namespace = if args.all_namespaces {
            ALL_NAMESPACES.to_string()
        } else {
            args.namespace.clone().unwrap_or(defaults.namespace)
        };
        info!(context = %context, namespace = %namespace, host = %config.host, "Connected");

        Ok(Self {
            client,
            context,
            namespace,
        })
    }

    pub fn all_namespaces(&self) -> bool {
        self.namespace == ALL_NAMESPACES
    }
}

fn kubeconfig_path(args: &Args) -> Result<PathBuf> {
    match &args.kubeconfig {
        Some(path) => Ok(path.clone()),
        None => KubeconfigFile::default_path(),
    }
}

fn resolve_resource(resource: &str) -> Result<ResourceSchema> {
    get_resource_schema(resource).ok_or_else(|| {
        let known: Vec<_> = list_resources().into_iter().map(|(name, _)| name).collect();
        anyhow!(
            "Unknown resource type '{}', supported: {}",
            resource,
            known.join(", ")
        )
    })
}

/// Translate command line filters into a selector
pub fn build_selector(
    schema: &ResourceSchema,
    name: Option<&str>,
    namespace: &str,
    args: &SelectorArgs,
) -> Result<Selector> {
    let selector = Selector {
        name: name.unwrap_or_default().to_string(),
        namespace: namespace.to_string(),
        uid: args.uid.clone().unwrap_or_default(),
        labels: args.labels.as_deref().map(parse_key_values).unwrap_or_default(),
        annotations: args
            .annotations
            .as_deref()
            .map(parse_key_values)
            .unwrap_or_default(),
        finalizers: args.finalizers.as_deref().map(parse_list).unwrap_or_default(),
        owner_references: args
            .owner_references
            .as_deref()
            .map(parse_owner_references)
            .transpose()?
            .unwrap_or_default(),
        filter: args.filter.clone().unwrap_or_default(),
        kind: schema.kind.clone(),
        api_version: args.api_version.clone(),
        limit: args.limit,
        continue_token: String::new(),
    };
    selector.validate()?;
    debug!(filter = %selector.encode(), "Built selector");
    Ok(selector)
}

/// The only object of a lookup
pub fn single_object(kind: &str, mut items: Vec<DynamicObject>) -> Result<DynamicObject> {
    match items.len() {
        0 => bail!("No {} found", kind),
        1 => Ok(items.remove(0)),
        _ => bail!("multiple resources found, use --uid flag to select"),
    }
}

pub async fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Version => {
            println!("Client version: {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Config { command } => {
            let mut file = KubeconfigFile::load(&kubeconfig_path(args)?)?;
            let context = file.resolve_context(args.context.as_deref())?;
            let message = config_cmd::run(&mut file, &context, command)?;
            println!("{}", message);
            Ok(())
        }
        Command::Get {
            resource,
            name,
            selector,
            output,
        } => {
            let schema = resolve_resource(resource)?;
            let session = Session::connect(args).await?;
            let selector = build_selector(&schema, name.as_deref(), &session.namespace, selector)?;
            get::run(&session, &schema, selector, *output).await
        }
        Command::Delete {
            resource,
            name,
            selector,
        } => {
            let schema = resolve_resource(resource)?;
            let session = Session::connect(args).await?;
            let selector = build_selector(&schema, name.as_deref(), &session.namespace, selector)?;
            delete::run(&session, &schema, selector).await
        }
        Command::Logs {
            resource,
            name,
            selector,
        } => {
            let schema = resolve_resource(resource)?;
            let session = Session::connect(args).await?;
            let selector = build_selector(&schema, name.as_deref(), &session.namespace, selector)?;
            logs::run(&session, &schema, selector).await
        }
    }
}

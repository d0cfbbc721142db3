// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use resultsctl::results::resources::DEFAULT_API_VERSION;

#[derive(Parser, Debug)]
#[command(name = "resultsctl")]
#[command(author, version, about = "Query and prune Tekton Results records")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the kubeconfig file, defaults to $KUBECONFIG or ~/.kube/config
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes context to use
    #[arg(long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Namespace to query, defaults to the context namespace
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Query across all namespaces
    #[arg(short = 'A', long, global = true, conflicts_with = "namespace")]
    pub all_namespaces: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List runs stored in the results API
    Get {
        /// Resource type (pipelineruns, pr, taskruns, tr)
        resource: String,

        /// Name (or part of the name) of the run
        name: Option<String>,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Print the matching run in full instead of a table
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,
    },

    /// Delete runs together with their child runs, logs and results
    Delete {
        /// Resource type (pipelineruns, pr, taskruns, tr)
        resource: String,

        /// Name (or part of the name) of the runs to delete
        name: Option<String>,

        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Print the log of a run
    Logs {
        /// Resource type (pipelineruns, pr, taskruns, tr)
        resource: String,

        /// Name (or part of the name) of the run
        name: Option<String>,

        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// View or change the results API settings of the current context
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print the client version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the stored settings
    View,

    /// Update settings, e.g. `set host=https://results.example.com client-type=GRPC`
    Set {
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },

    /// Remove all stored settings
    Reset,
}

/// Filters shared by the commands that look up runs
#[derive(ClapArgs, Debug, Clone)]
pub struct SelectorArgs {
    /// Number of runs fetched per page (5-100)
    #[arg(short, long, default_value_t = 10)]
    pub limit: i32,

    /// UID of the run
    #[arg(long)]
    pub uid: Option<String>,

    /// Label selector, e.g. "app=web, tier==db, marker"
    #[arg(short = 'L', long)]
    pub labels: Option<String>,

    /// Annotation selector, same syntax as --labels
    #[arg(long)]
    pub annotations: Option<String>,

    /// Comma separated finalizers
    #[arg(long)]
    pub finalizers: Option<String>,

    /// Owner references, e.g. "kind=PipelineRun name=build, uid=1234"
    #[arg(long)]
    pub owner_references: Option<String>,

    /// Raw filter expression, combined with the other filters
    #[arg(long)]
    pub filter: Option<String>,

    /// API version the runs were stored with
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

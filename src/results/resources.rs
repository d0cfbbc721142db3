// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource types stored in the results API and how they are listed

/// API version runs are stored with unless overridden
pub const DEFAULT_API_VERSION: &str = "tekton.dev/v1";

#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Plural name used on the command line
    pub name: String,
    pub kind: String,
    pub columns: Vec<ColumnSchema>,
}

/// How a table cell is derived from a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// String at a dotted JSON path
    Path(&'static str),
    /// Time since the RFC 3339 timestamp at a path
    Age(&'static str),
    /// Time between two RFC 3339 timestamps
    Duration(&'static str, &'static str),
    /// Reason of the `Succeeded` condition
    Status,
}

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub header: String,
    pub source: ColumnSource,
}

pub fn list_resources() -> Vec<(String, String)> {
    vec![
        ("pipelineruns".to_string(), "tekton.dev/PipelineRun".to_string()),
        ("taskruns".to_string(), "tekton.dev/TaskRun".to_string()),
    ]
}

/// Look up a resource by plural name, singular name or short alias
pub fn get_resource_schema(resource: &str) -> Option<ResourceSchema> {
    match resource.to_lowercase().as_str() {
        "pipelineruns" | "pipelinerun" | "pr" => Some(pipelineruns_schema()),
        "taskruns" | "taskrun" | "tr" => Some(taskruns_schema()),
        _ => None,
    }
}

fn pipelineruns_schema() -> ResourceSchema {
    ResourceSchema {
        name: "pipelineruns".to_string(),
        kind: "PipelineRun".to_string(),
        columns: run_columns(),
    }
}

fn taskruns_schema() -> ResourceSchema {
    ResourceSchema {
        name: "taskruns".to_string(),
        kind: "TaskRun".to_string(),
        columns: run_columns(),
    }
}

fn run_columns() -> Vec<ColumnSchema> {
    vec![
        col("NAME", ColumnSource::Path("metadata.name")),
        col("UID", ColumnSource::Path("metadata.uid")),
        col("STARTED", ColumnSource::Age("status.startTime")),
        col(
            "DURATION",
            ColumnSource::Duration("status.startTime", "status.completionTime"),
        ),
        col("STATUS", ColumnSource::Status),
    ]
}

fn col(header: &str, source: ColumnSource) -> ColumnSchema {
    ColumnSchema {
        header: header.to_string(),
        source,
    }
}

/// The NAMESPACE column shown when listing across namespaces
pub fn namespace_column() -> ColumnSchema {
    col("NAMESPACE", ColumnSource::Path("metadata.namespace"))
}

/// Add NAMESPACE as first column to a schema
pub fn with_namespace_column(mut schema: ResourceSchema) -> ResourceSchema {
    schema.columns.insert(0, namespace_column());
    schema
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource selectors and their translation into results filter expressions
//!
//! The results API filters records with a CEL expression evaluated against
//! the stored record. A [`Selector`] is turned into that expression by
//! walking a fixed table of metadata fields ([`METADATA_FIELDS`]) and
//! emitting one clause per populated value:
//!
//! - scalar values and list entries: `data.metadata.<field>.contains("<value>")`
//! - map keys without a value: `data.metadata.<field>.contains("<key>")`
//! - map keys with a value: `data.metadata.<field>["<key>"]=="<value>"`
//! - owner references: one `contains` clause per populated sub-field
//!
//! Clauses are joined with `&&`. Values are substituted literally; a value
//! containing `"` produces an invalid expression, which the server rejects.

use std::collections::BTreeMap;

use super::error::{Result, ResultsError};

/// Namespace segment matching every namespace in a parent path
pub const ALL_NAMESPACES: &str = "-";

/// Smallest page size accepted for a list call
pub const MIN_LIMIT: i32 = 5;

/// Largest page size accepted for a list call
pub const MAX_LIMIT: i32 = 100;

/// Shape of a metadata field, deciding which clause it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    /// Single string, partial match
    Contains,
    /// String map, key-exists or key-equals
    Keyed,
    /// List of strings, one partial match per entry
    Each,
    /// List of owner references, one partial match per populated sub-field
    Owners,
}

/// A metadata field the encoder knows how to filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataField {
    /// Field name under `data.metadata`
    pub wire_name: &'static str,
    pub kind: ClauseKind,
}

/// Filterable metadata fields, in the order clauses are emitted
pub const METADATA_FIELDS: &[MetadataField] = &[
    MetadataField { wire_name: "name", kind: ClauseKind::Contains },
    MetadataField { wire_name: "namespace", kind: ClauseKind::Contains },
    MetadataField { wire_name: "uid", kind: ClauseKind::Contains },
    MetadataField { wire_name: "labels", kind: ClauseKind::Keyed },
    MetadataField { wire_name: "annotations", kind: ClauseKind::Keyed },
    MetadataField { wire_name: "finalizers", kind: ClauseKind::Each },
    MetadataField { wire_name: "ownerReferences", kind: ClauseKind::Owners },
];

/// Partial owner reference; empty fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerReferenceSelector {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerReferenceSelector {
    /// Owner reference matching a single UID
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    fn values(&self) -> [&str; 4] {
        [&self.api_version, &self.kind, &self.name, &self.uid]
    }

    fn is_empty(&self) -> bool {
        self.values().iter().all(|v| v.is_empty())
    }
}

/// Filter criteria for records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub name: String,
    /// Empty or [`ALL_NAMESPACES`] means every namespace
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    pub owner_references: Vec<OwnerReferenceSelector>,
    /// Raw filter expression, passed through unchanged
    pub filter: String,
    pub kind: String,
    pub api_version: String,
    /// Page size; 0 leaves it to the server
    pub limit: i32,
    /// Continuation token of the next page to fetch
    pub continue_token: String,
}

/// Borrowed value of one metadata field
enum FieldValue<'a> {
    Scalar(&'a str),
    Map(&'a BTreeMap<String, String>),
    List(&'a [String]),
    Owners(&'a [OwnerReferenceSelector]),
}

impl Selector {
    /// Selector matching the children of an owner
    pub fn owned_by(uid: impl Into<String>) -> Self {
        Self {
            owner_references: vec![OwnerReferenceSelector::with_uid(uid)],
            ..Default::default()
        }
    }

    /// Reject selectors the server would refuse, before any network call
    pub fn validate(&self) -> Result<()> {
        if self.limit != 0 && !(MIN_LIMIT..=MAX_LIMIT).contains(&self.limit) {
            return Err(ResultsError::InvalidSelector(format!(
                "limit should be between {} and {}, got {}",
                MIN_LIMIT, MAX_LIMIT, self.limit
            )));
        }
        Ok(())
    }

    /// Namespace segment for the parent path, `-` when unset
    pub fn namespace_segment(&self) -> &str {
        if self.namespace.is_empty() {
            ALL_NAMESPACES
        } else {
            &self.namespace
        }
    }

    /// Parent path listing records of every result in the namespace
    pub fn parent(&self) -> String {
        format!("{}/results/-", self.namespace_segment())
    }

    /// Record the continuation token of a page
    ///
    /// Returns true when another page should be fetched.
    pub fn advance(&mut self, next_page_token: &str) -> bool {
        self.continue_token = next_page_token.to_string();
        !next_page_token.is_empty()
    }

    fn field_value(&self, field: &MetadataField) -> FieldValue<'_> {
        match field.wire_name {
            "name" => FieldValue::Scalar(&self.name),
            // The wildcard lives in the parent path, never in the filter
            "namespace" if self.namespace == ALL_NAMESPACES => FieldValue::Scalar(""),
            "namespace" => FieldValue::Scalar(&self.namespace),
            "uid" => FieldValue::Scalar(&self.uid),
            "labels" => FieldValue::Map(&self.labels),
            "annotations" => FieldValue::Map(&self.annotations),
            "finalizers" => FieldValue::List(&self.finalizers),
            "ownerReferences" => FieldValue::Owners(&self.owner_references),
            _ => FieldValue::Scalar(""),
        }
    }

    /// Individual clauses of the filter expression, in emission order
    pub fn clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();

        if !self.filter.trim().is_empty() {
            clauses.push(self.filter.clone());
        }

        if !self.kind.is_empty() && !self.api_version.is_empty() {
            clauses.push(format!("data_type==\"{}.{}\"", self.api_version, self.kind));
        }

        for field in METADATA_FIELDS {
            let name = field.wire_name;
            match (field.kind, self.field_value(field)) {
                (ClauseKind::Contains, FieldValue::Scalar(value)) => {
                    if !value.is_empty() {
                        clauses.push(contains(name, value));
                    }
                }
                (ClauseKind::Keyed, FieldValue::Map(map)) => {
                    for (key, value) in map {
                        if value.is_empty() {
                            clauses.push(contains(name, key));
                        } else {
                            clauses.push(format!(
                                "data.metadata.{}[\"{}\"]==\"{}\"",
                                name, key, value
                            ));
                        }
                    }
                }
                (ClauseKind::Each, FieldValue::List(values)) => {
                    clauses.extend(
                        values
                            .iter()
                            .filter(|v| !v.is_empty())
                            .map(|v| contains(name, v)),
                    );
                }
                (ClauseKind::Owners, FieldValue::Owners(owners)) => {
                    for owner in owners {
                        clauses.extend(
                            owner
                                .values()
                                .iter()
                                .filter(|v| !v.is_empty())
                                .map(|v| contains(name, v)),
                        );
                    }
                }
                _ => {}
            }
        }

        clauses
    }

    /// Full filter expression; empty when nothing is selected
    pub fn encode(&self) -> String {
        self.clauses().join(" && ")
    }
}

fn contains(field: &str, value: &str) -> String {
    format!("data.metadata.{}.contains(\"{}\")", field, value)
}

/// Parse `"a=b, c==d, e"` into a map; bare keys map to an empty value
pub fn parse_key_values(s: &str) -> BTreeMap<String, String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => {
                let value = value.strip_prefix('=').unwrap_or(value);
                (key.to_string(), value.to_string())
            }
            None => (part.to_string(), String::new()),
        })
        .collect()
}

/// Parse a comma separated finalizer list
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Parse owner references: comma separated entries of space separated
/// `key=value` pairs, e.g. `"kind=Service name=svc, kind=Deployment name=app"`
///
/// Recognised keys are `apiVersion`, `kind`, `name` and `uid`.
pub fn parse_owner_references(s: &str) -> Result<Vec<OwnerReferenceSelector>> {
    let mut owners = Vec::new();
    for entry in s.split(',') {
        if entry.trim().is_empty() {
            continue;
        }
        let mut owner = OwnerReferenceSelector::default();
        for pair in entry.split_whitespace() {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ResultsError::InvalidSelector(format!(
                    "owner reference field '{}' is not a key=value pair",
                    pair
                )));
            };
            let slot = match key {
                "apiVersion" => &mut owner.api_version,
                "kind" => &mut owner.kind,
                "name" => &mut owner.name,
                "uid" => &mut owner.uid,
                _ => {
                    return Err(ResultsError::InvalidSelector(format!(
                        "unknown owner reference field '{}'",
                        key
                    )));
                }
            };
            *slot = value.to_string();
        }
        if !owner.is_empty() {
            owners.push(owner);
        }
    }
    Ok(owners)
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Query and mutation engine for the Tekton Results API

pub mod cascade;
pub mod client;
pub mod error;
pub mod log;
pub mod proto;
pub mod query;
pub mod resources;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

pub use cascade::{ResourceNode, delete, delete_matching};
pub use client::{ClientConfig, ClientType, Impersonation, ResultsClient, TlsOptions, new_client};
pub use error::{ResultsError, status};
pub use query::{RecordPage, list};
pub use selector::Selector;

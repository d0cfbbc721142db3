// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Query and prune Tekton Results records
//!
//! [`results`] holds the engine: selector encoding, the gRPC and REST
//! transports, paginated listing and cascading deletion. [`config`] reads
//! connection settings from the kubeconfig and [`discovery`] finds the API
//! on the cluster when none is set.

pub mod config;
pub mod discovery;
pub mod results;

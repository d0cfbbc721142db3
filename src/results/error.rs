// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types shared by the transports and the query/delete engine

use thiserror::Error;
use tonic::Code;

/// HTTP status used when a resource is missing on the backend
pub const NOT_FOUND: u16 = 404;

/// Errors returned by the results engine and its transports
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Selector rejected before any network call
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Transport configuration is unusable
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// Could not establish a connection to the results API
    #[error("failed to connect to results API: {0}")]
    Connect(String),

    /// gRPC call returned a non-OK status
    #[error("results API error ({}): {}", .0.code(), .0.message())]
    Grpc(Box<tonic::Status>),

    /// REST bridge returned a non-2xx status
    #[error("results API error ({status}): {message}")]
    Http { status: u16, message: String },

    /// HTTP request failed before a status was received
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A record payload or response body could not be decoded
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Create/Update calls are not supported by this client
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tonic::Status> for ResultsError {
    fn from(status: tonic::Status) -> Self {
        ResultsError::Grpc(Box::new(status))
    }
}

impl ResultsError {
    /// HTTP-equivalent status code of this error, if it carries one
    ///
    /// gRPC codes are translated with the same table grpc-gateway uses, so
    /// both transports report a missing resource as 404.
    pub fn status(&self) -> Option<u16> {
        match self {
            ResultsError::Http { status, .. } => Some(*status),
            ResultsError::Grpc(status) => Some(http_status_from_code(status.code())),
            ResultsError::Request(e) => e.status().map(|s| s.as_u16()),
            ResultsError::Unimplemented(_) => Some(501),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(NOT_FOUND)
    }
}

/// Extract the HTTP-equivalent status code from an engine error
pub fn status(err: &ResultsError) -> Option<u16> {
    err.status()
}

/// Map a gRPC status code to the HTTP status grpc-gateway would return
pub fn http_status_from_code(code: Code) -> u16 {
    match code {
        Code::Ok => 200,
        Code::Cancelled => 499,
        Code::Unknown => 500,
        Code::InvalidArgument => 400,
        Code::DeadlineExceeded => 504,
        Code::NotFound => 404,
        Code::AlreadyExists => 409,
        Code::PermissionDenied => 403,
        Code::Unauthenticated => 401,
        Code::ResourceExhausted => 429,
        Code::FailedPrecondition => 400,
        Code::Aborted => 409,
        Code::OutOfRange => 400,
        Code::Unimplemented => 501,
        Code::Internal => 500,
        Code::Unavailable => 503,
        Code::DataLoss => 500,
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ResultsError>;

/// Turn a "not found" failure into success
pub fn ignore_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

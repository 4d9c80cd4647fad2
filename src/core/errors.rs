// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing every failure kind the core can
/// surface. Matches the error-kind taxonomy of the engine: input
/// validation, policy denial, timeouts, remote failures, deployment
/// validation breaches, and unrecoverable states.
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("remote failure: {0}")]
    RemoteFailure(String),

    #[error("validation breach: {0}")]
    ValidationBreach(String),

    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    #[error("connection pool exhausted for host '{0}'")]
    PoolExhausted(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SSH error: {0}")]
    Ssh(String),
}

pub type OpsResult<T> = Result<T, OpsError>;

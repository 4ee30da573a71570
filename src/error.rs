use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RankscanError {
    #[error("invalid id range: {0}")]
    InvalidRange(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing credential: set {0} in the environment or a .env file")]
    MissingCredential(&'static str),

    #[error("invalid selector {selector}: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to write output artifact {path}: {message}")]
    ArtifactWrite { path: String, message: String },

    #[error("failed to read output artifact {path}: {message}")]
    ArtifactRead { path: String, message: String },

    #[error("failed to read overwrite confirmation: {0}")]
    Prompt(String),

    #[error("output artifact {0} already exists (pass --yes to overwrite)")]
    ArtifactExists(String),

    #[error("output artifact {path} is not sorted by rank (first violation at line {line})")]
    ArtifactUnsorted { path: String, line: usize },
}

/// Per-profile fetch failure. Never fatal for a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request: {0}")]
    Request(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned status {status}")]
    Status { status: u16 },

    #[error("failed to read response body: {0}")]
    Body(String),
}

//! Error types for the deployer

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the deployment document.
///
/// All of them are fatal and surface before any remote call is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required field `{field}`{}", site_suffix(.site))]
    MissingField { field: String, site: Option<String> },

    #[error("Field `{field}` of site `{site}` must be {expected}, found {found}")]
    TypeMismatch {
        field: String,
        site: String,
        expected: String,
        found: String,
    },

    #[error("Invalid site `{site}`: {message}")]
    InvalidSite { site: String, message: String },

    #[error("Unresolved placeholder `{token}` at {location}")]
    UnresolvedPlaceholder { token: String, location: String },

    #[error("Duplicate site domain `{domain}`")]
    DuplicateDomain { domain: String },

    #[error("Unable to read env file `{}` of site `{site}`: {source}", .path.display())]
    EnvFile {
        site: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid secret definition on line {line}: expected NAME=VALUE")]
    InvalidSecretLine { line: usize },
}

fn site_suffix(site: &Option<String>) -> String {
    match site {
        Some(site) => format!(" in site `{}`", site),
        None => String::new(),
    }
}

/// Errors raised while producing a site's nginx configuration
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Nginx template `{name}` not found")]
    Missing { name: String },

    #[error("Unable to read nginx config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template variable `{name}` is reserved by Forge")]
    ReservedVariable { name: String },
}

/// Errors returned by the Forge API gateway
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        /// The request never reached the server
        connect: bool,
        timeout: bool,
    },

    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Transient failures worth another attempt: 5xx, 429, timeouts and connection errors
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Transport { connect, timeout, .. } => *connect || *timeout,
            _ => false,
        }
    }

    /// HTTP status of the failed response, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by a step of the per-site pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{operation} did not finish after {attempts} polls")]
    PollTimeout { operation: String, attempts: u32 },

    #[error("{operation} ended with status `{status}`")]
    OperationFailed { operation: String, status: String },

    #[error("{0}")]
    Invalid(String),
}

/// Errors that abort the whole run
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to read deployment file `{}`: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API client error: {0}")]
    Api(#[from] ApiError),

    #[error("Logging error: {0}")]
    Logging(String),
}

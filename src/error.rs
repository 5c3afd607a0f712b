//! Error types for the limitprobe crate.
//!
//! Anything response-shaped is a [`Verdict`](crate::classifier::Verdict),
//! recovered inside the test loop. Only configuration problems surface as
//! errors, and they are fatal at startup.

use thiserror::Error;

/// Error raised while loading or persisting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed proxy line {line:?}: expected protocol:host:port:username:password:status:interval_ms")]
    MalformedProxyLine { line: String },

    #[error("unknown proxy protocol {0:?}")]
    UnknownProtocol(String),

    #[error("invalid proxy port {0:?}")]
    InvalidPort(String),

    #[error("invalid proxy status token {0:?}: expected \"enabled\" or \"disabled\"")]
    InvalidStatus(String),

    #[error("invalid interval {0:?}: expected milliseconds as an integer")]
    InvalidInterval(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("invalid api.url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

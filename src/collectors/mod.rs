pub mod checks;
pub mod processes;
pub mod system;

use crate::report::MetricResult;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed {what}: {detail}")]
    Parse { what: &'static str, detail: String },
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("{0}")]
    NotFound(String),
}

impl CollectError {
    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        CollectError::Parse {
            what,
            detail: detail.into(),
        }
    }
}

pub fn settle<T>(metric: &'static str, result: Result<T, CollectError>) -> MetricResult<T> {
    if let Err(err) = &result {
        warn!(metric, error = %err, "metric unavailable");
    }
    result.into()
}

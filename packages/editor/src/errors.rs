//! Error types for the editor

use puck_common::CommonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Store is closed")]
    StoreClosed,

    #[error("No publish sink configured")]
    NoPublishSink,
}

/// Failure reported by host-supplied resolver code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResolverError {
    message: String,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ResolverError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ResolverError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resolveData failed for {component_type} {id}: {source}")]
    Resolver {
        component_type: String,
        id: String,
        #[source]
        source: ResolverError,
    },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Publish rejected: {0}")]
    Rejected(String),
}

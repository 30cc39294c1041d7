use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::common::types::Endpoint;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("no endpoints configured")]
    NoEndpointsConfigured,

    #[error("all hosts in pool are down ({})", join_endpoints(.endpoints))]
    AllEndpointsDown { endpoints: Vec<Endpoint> },
}

impl From<config::ConfigError> for PoolError {
    fn from(err: config::ConfigError) -> Self {
        PoolError::Configuration(err.to_string())
    }
}

/// A single failed dial. Consumed by the selector, never returned from `connect`.
#[derive(Debug, Error)]
#[error("connection to {endpoint} failed: {kind}")]
pub struct ConnectionError {
    pub endpoint: Endpoint,
    #[source]
    pub kind: ConnectionErrorKind,
}

impl ConnectionError {
    pub fn new(endpoint: Endpoint, kind: ConnectionErrorKind) -> Self {
        Self { endpoint, kind }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionErrorKind {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// The failure store backend could not serve a request.
#[derive(Debug, Error)]
#[error("failure store unavailable: {0}")]
pub struct StoreError(pub String);

fn join_endpoints(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

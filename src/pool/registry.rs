use arc_swap::ArcSwap;

use crate::common::types::Endpoint;
use crate::error::PoolError;

/// Candidate endpoints in registration order. Append-only.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: ArcSwap<Vec<Endpoint>>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: ArcSwap::from_pointee(endpoints),
        }
    }

    /// Builds a registry from `host:port` entries, dropping the ones that
    /// don't parse.
    pub fn from_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = servers
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                let parsed = Endpoint::parse(entry);
                if parsed.is_none() {
                    tracing::debug!("Dropping malformed server entry {:?}", entry);
                }
                parsed
            })
            .collect();

        Self::new(endpoints)
    }

    /// Appends an endpoint. Duplicates are kept.
    pub fn add(&self, host: impl Into<String>, port: u16) -> Result<(), PoolError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(PoolError::Configuration(
                "endpoint host must not be empty".into(),
            ));
        }
        if port == 0 {
            return Err(PoolError::Configuration(format!(
                "endpoint {host} has no usable port"
            )));
        }

        let endpoint = Endpoint::new(host, port);
        self.endpoints.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(endpoint.clone());
            next
        });
        Ok(())
    }

    /// Snapshot of the current endpoints.
    pub fn list(&self) -> Vec<Endpoint> {
        Vec::clone(&self.endpoints.load())
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.load().is_empty()
    }
}

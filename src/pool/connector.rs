use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::types::Endpoint;
use crate::error::{ConnectionError, ConnectionErrorKind};

/// Opens a transport connection to one endpoint.
///
/// Every failure (refused, DNS, timeout, cancelled) is a `ConnectionError`;
/// the selector does not look at the kind.
pub trait Connector: Send + Sync {
    type Connection: Send;

    fn open(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            nodelay: true,
        }
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Connector for TcpConnector {
    type Connection = TcpStream;

    async fn open(&self, endpoint: &Endpoint) -> Result<TcpStream, ConnectionError> {
        let dial = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = with_deadline(endpoint, self.connect_timeout, dial).await?;

        if self.nodelay {
            stream
                .set_nodelay(true)
                .map_err(|e| ConnectionError::new(endpoint.clone(), e.into()))?;
        }

        Ok(stream)
    }
}

/// Runs one dial against `deadline`. Expiry becomes `Timeout`, I/O errors `Io`.
pub async fn with_deadline<F, T>(
    endpoint: &Endpoint,
    deadline: Duration,
    dial: F,
) -> Result<T, ConnectionError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(deadline, dial).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(ConnectionError::new(endpoint.clone(), e.into())),
        Err(_) => Err(ConnectionError::new(
            endpoint.clone(),
            ConnectionErrorKind::Timeout(deadline),
        )),
    }
}

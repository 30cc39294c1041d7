use std::fmt;

/// A `host:port` destination the pool can dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Parses a `host:port` entry. Returns `None` when either half is missing
    /// or the port is not a valid `u16`.
    pub fn parse(entry: &str) -> Option<Endpoint> {
        let (host, port) = entry.trim().rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port = port.parse::<u16>().ok().filter(|port| *port != 0)?;
        Some(Endpoint::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

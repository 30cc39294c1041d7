pub mod connector;
pub mod failure_store;
pub mod registry;
pub mod selector;

pub use connector::{Connector, TcpConnector};
pub use failure_store::{FailureKey, FailureKind, FailureStore, MemoryFailureStore, NoopFailureStore};
pub use registry::EndpointRegistry;
pub use selector::{DebugHandler, FailoverSelector, SelectorOptions};

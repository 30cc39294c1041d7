pub mod common;
pub mod configuration;
pub mod error;
pub mod pool;
pub mod selection_method;
pub mod utils;

pub mod prelude {
    pub use crate::common::clock::{Clock, SystemClock};
    pub use crate::common::types::Endpoint;
    pub use crate::configuration::Settings;
    pub use crate::error::{ConnectionError, ConnectionErrorKind, PoolError, StoreError};
    pub use crate::pool::{
        Connector, EndpointRegistry, FailoverSelector, FailureKey, FailureKind, FailureStore,
        MemoryFailureStore, NoopFailureStore, SelectorOptions, TcpConnector,
    };
}

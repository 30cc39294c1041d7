use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, error, info, warn, Level};

use crate::common::clock::{Clock, SystemClock};
use crate::common::types::Endpoint;
use crate::error::PoolError;
use crate::pool::connector::Connector;
use crate::pool::failure_store::{FailureKey, FailureStore};
use crate::pool::registry::EndpointRegistry;
use crate::selection_method::{SelectionAlgorithm, SelectionMethod};

/// Receives human readable notes about mark-down and recovery events.
pub type DebugHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOptions {
    /// Dial attempts per endpoint per cycle. At least 1.
    pub num_retries: u32,
    /// How long a down endpoint is skipped.
    pub retry_interval: Duration,
    /// Failure events before an endpoint is marked down. At least 1.
    pub max_consecutive_failures: u32,
    pub randomize: bool,
    /// Dial the last candidate of the cycle even when it is down.
    pub always_try_last: bool,
    /// Lifetime of failure records in the store. `None` keeps them until cleared.
    pub failure_ttl: Option<Duration>,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            num_retries: 1,
            retry_interval: Duration::from_secs(60),
            max_consecutive_failures: 1,
            randomize: true,
            always_try_last: true,
            failure_ttl: None,
        }
    }
}

impl SelectorOptions {
    fn normalized(mut self) -> Self {
        self.num_retries = self.num_retries.max(1);
        self.max_consecutive_failures = self.max_consecutive_failures.max(1);
        self
    }
}

/// Picks an endpoint and dials it, skipping endpoints that failed recently.
pub struct FailoverSelector<C, S> {
    registry: Arc<EndpointRegistry>,
    connector: C,
    store: S,
    clock: Arc<dyn Clock>,
    options: ArcSwap<SelectorOptions>,
    debug_handler: Option<DebugHandler>,
}

impl<C, S> FailoverSelector<C, S>
where
    C: Connector,
    S: FailureStore,
{
    pub fn new(registry: Arc<EndpointRegistry>, connector: C, store: S) -> Self {
        Self {
            registry,
            connector,
            store,
            clock: Arc::new(SystemClock),
            options: ArcSwap::from_pointee(SelectorOptions::default()),
            debug_handler: None,
        }
    }

    pub fn with_options(self, options: SelectorOptions) -> Self {
        self.apply(options);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_debug_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.debug_handler = Some(Arc::new(handler));
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn options(&self) -> SelectorOptions {
        SelectorOptions::clone(&self.options.load())
    }

    /// Replaces every option at once. Takes effect on the next `connect`.
    pub fn apply(&self, options: SelectorOptions) {
        self.options.store(Arc::new(options.normalized()));
    }

    pub fn set_num_retries(&self, num_retries: u32) {
        self.update(|options| options.num_retries = num_retries);
    }

    pub fn set_retry_interval(&self, retry_interval: Duration) {
        self.update(|options| options.retry_interval = retry_interval);
    }

    pub fn set_max_consecutive_failures(&self, max_consecutive_failures: u32) {
        self.update(|options| options.max_consecutive_failures = max_consecutive_failures);
    }

    pub fn set_randomize(&self, randomize: bool) {
        self.update(|options| options.randomize = randomize);
    }

    pub fn set_always_try_last(&self, always_try_last: bool) {
        self.update(|options| options.always_try_last = always_try_last);
    }

    pub fn set_failure_ttl(&self, failure_ttl: Option<Duration>) {
        self.update(|options| options.failure_ttl = failure_ttl);
    }

    fn update(&self, change: impl Fn(&mut SelectorOptions)) {
        self.options.rcu(|current| {
            let mut next = SelectorOptions::clone(current);
            change(&mut next);
            next.normalized()
        });
    }

    /// Runs one connection cycle and returns the first connection that opens.
    #[tracing::instrument(name = "Failover connect", skip_all)]
    pub async fn connect(&self) -> Result<C::Connection, PoolError> {
        let options = self.options.load_full();

        let mut candidates = self.registry.list();
        SelectionMethod::from_randomize(options.randomize).order(&mut candidates);

        let count = candidates.len();
        if count == 0 {
            return Err(PoolError::NoEndpointsConfigured);
        }

        for (index, endpoint) in candidates.iter().enumerate() {
            let is_last = options.always_try_last && index == count - 1;

            let failtime_key = FailureKey::last_failure(endpoint);
            let last_failure = self.read(&failtime_key).unwrap_or(0);

            let mut interval_passed = false;
            if last_failure > 0 {
                let elapsed = self.clock.now().saturating_sub(last_failure);
                if elapsed > options.retry_interval.as_secs() {
                    interval_passed = true;
                    self.diagnose(
                        Level::INFO,
                        &format!(
                            "retry interval ({}s) has passed for host {endpoint}",
                            options.retry_interval.as_secs()
                        ),
                    );
                }
            }

            if last_failure > 0 && !interval_passed && !is_last {
                debug!("Skipping {} while it is marked down", endpoint);
                continue;
            }

            for attempt in 1..=options.num_retries {
                match self.connector.open(endpoint).await {
                    Ok(connection) => {
                        if last_failure > 0 {
                            self.remove(&failtime_key);
                        }
                        debug!("Connected to {} on attempt {}", endpoint, attempt);
                        return Ok(connection);
                    }
                    Err(e) => {
                        debug!(
                            "Attempt {}/{} failed: {}",
                            attempt, options.num_retries, e
                        );
                    }
                }
            }

            self.record_failure(endpoint, &options);
        }

        let err = PoolError::AllEndpointsDown {
            endpoints: candidates,
        };
        self.diagnose(Level::ERROR, &err.to_string());
        Err(err)
    }

    fn record_failure(&self, endpoint: &Endpoint, options: &SelectorOptions) {
        let consecfails_key = FailureKey::consecutive_failures(endpoint);
        // A store that can't count is treated as having no prior failures.
        let (consecfails, counted) =
            match self.store.increment(&consecfails_key, options.failure_ttl) {
                Ok(count) => (count, true),
                Err(e) => {
                    warn!("Could not count failure for {}: {}", endpoint, e);
                    (1, false)
                }
            };

        if consecfails < u64::from(options.max_consecutive_failures) {
            if !counted {
                self.write(&consecfails_key, consecfails, options.failure_ttl);
            }
        } else {
            self.diagnose(
                Level::WARN,
                &format!(
                    "marking {endpoint} as down for {}s after {consecfails} failed attempts",
                    options.retry_interval.as_secs()
                ),
            );
            self.write(
                &FailureKey::last_failure(endpoint),
                self.clock.now(),
                options.failure_ttl,
            );
            self.remove(&consecfails_key);
        }
    }

    fn read(&self, key: &FailureKey) -> Option<u64> {
        self.store.get(key).unwrap_or_else(|e| {
            warn!("Treating {:?} for {} as a miss: {}", key.kind, key.endpoint, e);
            None
        })
    }

    fn write(&self, key: &FailureKey, value: u64, ttl: Option<Duration>) {
        if let Err(e) = self.store.set(key, value, ttl) {
            warn!("Could not store {:?} for {}: {}", key.kind, key.endpoint, e);
        }
    }

    fn remove(&self, key: &FailureKey) {
        if let Err(e) = self.store.delete(key) {
            warn!("Could not clear {:?} for {}: {}", key.kind, key.endpoint, e);
        }
    }

    fn diagnose(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            error!("{}", message);
        } else if level == Level::WARN {
            warn!("{}", message);
        } else {
            info!("{}", message);
        }
        if let Some(handler) = &self.debug_handler {
            handler(message);
        }
    }
}

impl<C, S: fmt::Debug> fmt::Debug for FailoverSelector<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverSelector")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("options", &self.options.load_full())
            .finish()
    }
}

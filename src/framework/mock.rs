//! # Mock Services
//!
//! Scriptable services for testing orchestration without real resources.
//!
//! A [`MockService`] implements both [`Service`] and [`BlockingService`], so the same mock can be
//! registered either way. Script it with the builder methods, then assert on its counters or on
//! a shared [`InitLog`].
//!
//! # Example
//! ```ignore
//! let log = InitLog::new();
//! let orchestrator = Orchestrator::new();
//!
//! orchestrator.register("Config", MockService::new("Config").with_log(&log))?;
//! orchestrator
//!     .register("Db", MockService::new("Db").with_log(&log).fail_with("connection refused"))?
//!     .requires(["Config"])?;
//!
//! assert!(orchestrator.ensure_ready("Db").await.is_err());
//! assert_eq!(log.initialized(), ["Config", "Db"]);
//! ```

use crate::framework::error::BoxError;
use crate::framework::service::{BlockingService, Service};
use crate::framework::ServiceId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One routine call observed by an [`InitLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitEvent {
    Initialize(ServiceId),
    Ping(ServiceId),
}

/// Ordered record of routine calls, shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct InitLog {
    events: Arc<Mutex<Vec<InitEvent>>>,
}

impl InitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: InitEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<InitEvent> {
        self.lock().clone()
    }

    /// Ids whose `initialize()` ran, in call order.
    pub fn initialized(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                InitEvent::Initialize(id) => Some(id.to_string()),
                InitEvent::Ping(_) => None,
            })
            .collect()
    }

    pub fn pinged(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                InitEvent::Ping(id) => Some(id.to_string()),
                InitEvent::Initialize(_) => None,
            })
            .collect()
    }

    /// Position of the first `initialize()` of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.initialized().iter().position(|name| name == id)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InitEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
enum Ping {
    Healthy,
    Unhealthy,
    Error(String),
}

type Check = Box<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// A service whose routines do nothing but what they are scripted to do.
pub struct MockService {
    id: ServiceId,
    failure: Option<String>,
    failures_left: AtomicUsize,
    ping: Ping,
    delay: Duration,
    check: Option<Check>,
    log: Option<InitLog>,
    initialize_calls: AtomicUsize,
    ping_calls: AtomicUsize,
}

impl std::fmt::Debug for MockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockService")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl MockService {
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            failure: None,
            failures_left: AtomicUsize::new(0),
            ping: Ping::Healthy,
            delay: Duration::ZERO,
            check: None,
            log: None,
            initialize_calls: AtomicUsize::new(0),
            ping_calls: AtomicUsize::new(0),
        }
    }

    /// Every `initialize()` fails with `message`.
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.fail_times(usize::MAX, message)
    }

    /// The first `times` calls to `initialize()` fail with `message`.
    pub fn fail_times(mut self, times: usize, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self.failures_left = AtomicUsize::new(times);
        self
    }

    /// `ping()` answers `false`.
    pub fn unhealthy(mut self) -> Self {
        self.ping = Ping::Unhealthy;
        self
    }

    /// `ping()` fails with `message`.
    pub fn ping_error(mut self, message: impl Into<String>) -> Self {
        self.ping = Ping::Error(message.into());
        self
    }

    /// `initialize()` takes at least `delay`.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `check` at the start of `initialize()`; an error fails the initialization.
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }

    pub fn with_log(mut self, log: &InitLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    fn begin_initialize(&self) -> Result<(), BoxError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(InitEvent::Initialize(self.id.clone()));
        }
        match &self.check {
            Some(check) => check(),
            None => Ok(()),
        }
    }

    fn finish_initialize(&self) -> Result<(), BoxError> {
        let Some(message) = &self.failure else {
            return Ok(());
        };
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(message.clone().into())
        } else {
            Ok(())
        }
    }

    fn answer_ping(&self) -> Result<bool, BoxError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(InitEvent::Ping(self.id.clone()));
        }
        match &self.ping {
            Ping::Healthy => Ok(true),
            Ping::Unhealthy => Ok(false),
            Ping::Error(message) => Err(message.clone().into()),
        }
    }
}

#[async_trait]
impl Service for MockService {
    async fn initialize(&self) -> Result<(), BoxError> {
        self.begin_initialize()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finish_initialize()
    }

    async fn ping(&self) -> Result<bool, BoxError> {
        self.answer_ping()
    }
}

impl BlockingService for MockService {
    fn initialize(&self) -> Result<(), BoxError> {
        self.begin_initialize()?;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.finish_initialize()
    }

    fn ping(&self) -> Result<bool, BoxError> {
        self.answer_ping()
    }
}

//! # Initialization Orchestrator
//!
//! The [`Orchestrator`] owns every service descriptor and drives them through
//! `initialize() -> ping() -> READY | FAILED`, exactly once, for any number of concurrent callers.
//!
//! ## Architecture
//!
//! A request for service `S` goes through these steps:
//!
//! 1. **Fast path**: if `S` is READY, return. This is one atomic load.
//! 2. **Plan**: resolve the order of `S`'s dependency closure (which rejects cycles), reject
//!    services already initializing on the caller's [`InitPath`], reject unregistered ids.
//! 3. **Setup**: run the one-time setup hook if it hasn't succeeded yet.
//! 4. **Walk**: for each descriptor in order, either observe a settled state, wait for the
//!    current initializer, or claim the descriptor and launch its routine. A claimed service
//!    whose current dependencies are not all READY (they were redeclared after planning) is
//!    released and the request is planned again.
//!
//! ```text
//!  ensure_ready(Users)
//!        │
//!        ▼
//!   plan: [Config, Db, Users]
//!        │
//!        ├── Config  READY ─────────────► next
//!        ├── Db      claimed ─► launch ─► wait ─► READY ─► next
//!        └── Users   busy ────────────── wait ─► READY ─► Ok(())
//! ```
//!
//! Routines never run on the waiting caller's future. Suspending routines are spawned on the
//! current tokio runtime (or a private fallback runtime when there is none) and blocking routines
//! on a blocking thread. Blocking callers run blocking routines inline. Dropping a waiting future
//! only abandons that caller's wait.
//!
//! ## Failures
//!
//! A failed routine leaves its service FAILED. Later requests re-raise the stored error,
//! attributed to the requested service, and never retry on their own. [`Orchestrator::reset`]
//! is the only way back.

use crate::framework::error::{BoxError, InitFailure, InitializationError, Result, ServiceError};
use crate::framework::service::{BlockingService, Routine, Service};
use crate::framework::ServiceId;
use crate::handles::ServiceHandle;
use crate::lifecycle::descriptor::{Attempt, Claim, ServiceDescriptor};
use crate::lifecycle::path::InitPath;
use crate::lifecycle::registry::Registry;
use crate::lifecycle::state::{ServiceState, ServiceStatus};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

/// Hook run once before the first initialization of any service.
///
/// The hook must not request services: doing so fails with [`ServiceError::SetupReentered`].
pub type SetupHook = Box<dyn Fn() -> std::result::Result<(), BoxError> + Send + Sync>;

const DEFAULT_FALLBACK_WORKER_THREADS: usize = 2;

/// Runs service initialization for a set of registered services.
///
/// Cloning is cheap; all clones share the same services.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new();
///
/// let config = orchestrator.register_blocking("Config", Config::default())?;
/// let db = orchestrator.register("Db", Db::default())?.requires(["Config"])?;
///
/// // Initializes Config, then Db, then returns
/// let db = db.ready().await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    setup: Setup,
    fallback: OnceLock<Runtime>,
    fallback_worker_threads: usize,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // A runtime can't be dropped from async context; don't wait for stragglers.
        if let Some(runtime) = self.fallback.take() {
            runtime.shutdown_background();
        }
    }
}

thread_local! {
    static IN_SETUP: Cell<bool> = const { Cell::new(false) };
}

struct Setup {
    done: AtomicBool,
    hook: Mutex<Option<SetupHook>>,
}

impl Setup {
    /// Async callers wait for a running hook without holding their worker thread.
    async fn run(&self) -> Result<()> {
        if self.skip()? {
            return Ok(());
        }
        let hook = self.hook.lock().await;
        self.invoke(hook.as_ref())
    }

    fn run_blocking(&self) -> Result<()> {
        if self.skip()? {
            return Ok(());
        }
        let hook = self.hook.blocking_lock();
        self.invoke(hook.as_ref())
    }

    fn skip(&self) -> Result<bool> {
        if self.done.load(Ordering::Acquire) {
            return Ok(true);
        }
        if IN_SETUP.with(Cell::get) {
            return Err(ServiceError::SetupReentered);
        }
        Ok(false)
    }

    /// Callers hold the hook lock.
    fn invoke(&self, hook: Option<&SetupHook>) -> Result<()> {
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(hook) = hook {
            let _running = SetupScope::enter();
            hook().map_err(|e| {
                warn!(error = %e, "Setup hook failed");
                ServiceError::Setup(Arc::from(e))
            })?;
            info!("Setup hook executed");
        }
        self.done.store(true, Ordering::Release);
        Ok(())
    }

    /// Refused once setup has completed, or while the hook is running.
    fn install(&self, hook: SetupHook) -> bool {
        let Ok(mut slot) = self.hook.try_lock() else {
            return false;
        };
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(hook);
        true
    }
}

/// Marks the current thread as running the setup hook.
struct SetupScope;

impl SetupScope {
    fn enter() -> Self {
        IN_SETUP.with(|flag| flag.set(true));
        SetupScope
    }
}

impl Drop for SetupScope {
    fn drop(&mut self) {
        IN_SETUP.with(|flag| flag.set(false));
    }
}

/// Construction-time options for an [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    setup: Option<SetupHook>,
    fallback_worker_threads: Option<usize>,
}

impl OrchestratorBuilder {
    /// Hook run once, before the first initialization of any service.
    ///
    /// A failing hook fails that request with [`ServiceError::Setup`] and runs again on the next.
    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(hook));
        self
    }

    /// Worker threads of the runtime used for suspending routines requested outside tokio.
    pub fn fallback_worker_threads(mut self, threads: usize) -> Self {
        self.fallback_worker_threads = Some(threads.max(1));
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(Inner {
                registry: Registry::default(),
                setup: Setup {
                    done: AtomicBool::new(false),
                    hook: Mutex::new(self.setup),
                },
                fallback: OnceLock::new(),
                fallback_worker_threads: self
                    .fallback_worker_threads
                    .unwrap_or(DEFAULT_FALLBACK_WORKER_THREADS),
            }),
        }
    }
}

/// Non-owning reference to an orchestrator, held by handles stored inside services.
#[derive(Clone)]
pub(crate) struct WeakOrchestrator(Weak<Inner>);

impl WeakOrchestrator {
    pub(crate) fn upgrade(&self) -> Option<Orchestrator> {
        self.0.upgrade().map(|inner| Orchestrator { inner })
    }
}

/// The process-wide orchestrator, created on first use.
pub fn global() -> &'static Orchestrator {
    static GLOBAL: OnceLock<Orchestrator> = OnceLock::new();
    GLOBAL.get_or_init(Orchestrator::new)
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub(crate) fn downgrade(&self) -> WeakOrchestrator {
        WeakOrchestrator(Arc::downgrade(&self.inner))
    }

    /// Installs the setup hook. Returns `false` if setup has already completed or is running.
    pub fn set_setup<F>(&self, hook: F) -> bool
    where
        F: Fn() -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.inner.setup.install(Box::new(hook))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a service whose `initialize()` suspends.
    pub fn register<S: Service>(
        &self,
        id: impl Into<ServiceId>,
        service: S,
    ) -> Result<ServiceHandle<S>> {
        let id = id.into();
        let service = Arc::new(service);
        let descriptor = self
            .inner
            .registry
            .attach(&id, Routine::Suspending(service.clone()))?;
        Ok(ServiceHandle::new(service, descriptor, self.clone()))
    }

    /// Registers a service whose `initialize()` blocks.
    pub fn register_blocking<S: BlockingService>(
        &self,
        id: impl Into<ServiceId>,
        service: S,
    ) -> Result<ServiceHandle<S>> {
        let id = id.into();
        let service = Arc::new(service);
        let descriptor = self
            .inner
            .registry
            .attach(&id, Routine::Blocking(service.clone()))?;
        Ok(ServiceHandle::new(service, descriptor, self.clone()))
    }

    /// Declares (or replaces) the dependencies of `id`, in initialization preference order.
    ///
    /// Fails with [`ServiceError::DependenciesFrozen`] once `id` has started initializing.
    pub fn declare<I, D>(&self, id: impl Into<ServiceId>, dependencies: I) -> Result<()>
    where
        I: IntoIterator<Item = D>,
        D: Into<ServiceId>,
    {
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        self.inner.registry.declare(&id.into(), dependencies)
    }

    // =========================================================================
    // Graph queries
    // =========================================================================

    pub fn dependencies_of(&self, id: impl Into<ServiceId>) -> Vec<ServiceId> {
        self.inner.registry.dependencies_of(&id.into())
    }

    /// Initialization order of `id`'s dependency closure, ending with `id`.
    pub fn order(&self, id: impl Into<ServiceId>) -> Result<Vec<ServiceId>> {
        self.inner.registry.order(&id.into())
    }

    pub fn detect_cycle(&self, id: impl Into<ServiceId>) -> Result<()> {
        self.inner.registry.detect_cycle(&id.into())
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    /// Brings `id` and its dependency closure to READY, suspending while others initialize.
    pub async fn ensure_ready(&self, id: impl Into<ServiceId>) -> Result<()> {
        self.ensure_ready_for(id, "ensure_ready").await
    }

    /// Like [`ensure_ready`](Self::ensure_ready), recording the operation that needed it.
    pub async fn ensure_ready_for(
        &self,
        id: impl Into<ServiceId>,
        requested_for: &str,
    ) -> Result<()> {
        let id = id.into();
        if self.is_ready(&id) {
            return Ok(());
        }
        self.walk_async(&id, &InitPath::current(), requested_for).await
    }

    /// Like [`ensure_ready`](Self::ensure_ready) on an explicit initialization path.
    pub async fn ensure_ready_in(&self, id: impl Into<ServiceId>, path: &InitPath) -> Result<()> {
        let id = id.into();
        if self.is_ready(&id) {
            return Ok(());
        }
        self.walk_async(&id, path, "ensure_ready").await
    }

    /// Blocking form of [`ensure_ready`](Self::ensure_ready).
    ///
    /// Must not be called from inside an async task.
    pub fn ensure_ready_blocking(&self, id: impl Into<ServiceId>) -> Result<()> {
        self.ensure_ready_blocking_for(id, "ensure_ready")
    }

    pub fn ensure_ready_blocking_for(
        &self,
        id: impl Into<ServiceId>,
        requested_for: &str,
    ) -> Result<()> {
        let id = id.into();
        if self.is_ready(&id) {
            return Ok(());
        }
        self.walk_blocking(&id, &InitPath::current(), requested_for)
    }

    // =========================================================================
    // State & inspection
    // =========================================================================

    pub fn state(&self, id: impl Into<ServiceId>) -> ServiceState {
        self.inner
            .registry
            .get(&id.into())
            .map(|descriptor| descriptor.state())
            .unwrap_or(ServiceState::Uninitialized)
    }

    /// Moves a FAILED service back to UNINITIALIZED so the next request retries it.
    ///
    /// Returns `false` for any other state; READY never reverts.
    pub fn reset(&self, id: impl Into<ServiceId>) -> bool {
        self.inner
            .registry
            .get(&id.into())
            .is_some_and(|descriptor| descriptor.reset())
    }

    pub fn status(&self, id: impl Into<ServiceId>) -> Option<ServiceStatus> {
        self.inner.registry.status(&id.into())
    }

    /// Status of every known service, sorted by id.
    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        self.inner.registry.snapshot()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_ready(&self, id: &ServiceId) -> bool {
        self.inner
            .registry
            .get(id)
            .is_some_and(|descriptor| descriptor.is_ready())
    }

    async fn walk_async(&self, root: &ServiceId, path: &InitPath, requested_for: &str) -> Result<()> {
        'plan: loop {
            let plan = self.inner.registry.plan(root, path)?;
            self.inner.setup.run().await?;
            log_plan(&plan, root, requested_for);

            for descriptor in plan {
                loop {
                    match descriptor.try_claim(path) {
                        Attempt::Ready => break,
                        Attempt::Failed(err) => return Err(reraise(err, root)),
                        Attempt::Unregistered => {
                            return Err(ServiceError::NotRegistered(descriptor.id().clone()))
                        }
                        Attempt::Busy => {
                            log_wait(&descriptor, root);
                            descriptor.wait_async().await;
                        }
                        Attempt::Claimed(claim) => {
                            let Some(claim) = self.confirm(claim) else {
                                continue 'plan;
                            };
                            self.launch(claim, path)?;
                            descriptor.wait_async().await;
                        }
                    }
                }
            }
            return Ok(());
        }
    }

    fn walk_blocking(&self, root: &ServiceId, path: &InitPath, requested_for: &str) -> Result<()> {
        'plan: loop {
            let plan = self.inner.registry.plan(root, path)?;
            self.inner.setup.run_blocking()?;
            log_plan(&plan, root, requested_for);

            for descriptor in plan {
                loop {
                    match descriptor.try_claim(path) {
                        Attempt::Ready => break,
                        Attempt::Failed(err) => return Err(reraise(err, root)),
                        Attempt::Unregistered => {
                            return Err(ServiceError::NotRegistered(descriptor.id().clone()))
                        }
                        Attempt::Busy => {
                            log_wait(&descriptor, root);
                            descriptor.wait_blocking();
                        }
                        Attempt::Claimed(claim) => {
                            let Some(claim) = self.confirm(claim) else {
                                continue 'plan;
                            };
                            let routine = claim.routine().clone();
                            match routine {
                                Routine::Blocking(service) => {
                                    let child = path.child(claim.id());
                                    drive_blocking(service, claim, child);
                                }
                                Routine::Suspending(_) => {
                                    self.launch(claim, path)?;
                                    descriptor.wait_blocking();
                                }
                            }
                        }
                    }
                }
            }
            return Ok(());
        }
    }

    /// Keeps the claim only if every dependency declared for it right now is READY.
    ///
    /// A plan is computed before anything is claimed, so a service redeclared in between may
    /// have gained dependencies the plan never visited.
    fn confirm(&self, claim: Claim) -> Option<Claim> {
        if self.inner.registry.dependencies_ready(claim.id()) {
            return Some(claim);
        }
        debug!(service = %claim.id(), "Dependencies changed since planning");
        claim.release();
        None
    }

    /// Starts the claimed routine off the caller's stack.
    fn launch(&self, claim: Claim, path: &InitPath) -> Result<()> {
        let handle = match self.runtime_handle() {
            Ok(handle) => handle,
            Err(e) => {
                claim.release();
                return Err(e);
            }
        };
        let child = path.child(claim.id());
        let routine = claim.routine().clone();
        match routine {
            Routine::Suspending(service) => {
                handle.spawn(drive_suspending(service, claim, child));
            }
            Routine::Blocking(service) => {
                handle.spawn_blocking(move || drive_blocking(service, claim, child));
            }
        }
        Ok(())
    }

    fn runtime_handle(&self) -> Result<Handle> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(handle);
        }
        if let Some(runtime) = self.inner.fallback.get() {
            return Ok(runtime.handle().clone());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.inner.fallback_worker_threads)
            .thread_name("service-init")
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Runtime(Arc::new(e)))?;
        debug!(
            worker_threads = self.inner.fallback_worker_threads,
            "Started fallback runtime"
        );
        Ok(self.inner.fallback.get_or_init(|| runtime).handle().clone())
    }
}

fn log_plan(plan: &[Arc<ServiceDescriptor>], root: &ServiceId, requested_for: &str) {
    let order: Vec<String> = plan
        .iter()
        .map(|d| match d.state() {
            ServiceState::Ready => format!("{} (ready)", d.id()),
            _ => d.id().to_string(),
        })
        .collect();
    debug!(service = %root, requested_for, order = %order.join(", "), "Initialization order");
}

fn log_wait(descriptor: &ServiceDescriptor, root: &ServiceId) {
    let initializer = descriptor.initializer().unwrap_or_default();
    debug!(
        service = %descriptor.id(),
        requested_for = %root,
        initializer = %initializer,
        "Waiting for in-flight initialization"
    );
}

fn reraise(err: InitializationError, root: &ServiceId) -> ServiceError {
    debug!(service = %root, failed = %err.failed_service(), "Re-raising stored failure");
    ServiceError::Initialization(err.attribute_to(root))
}

async fn drive_suspending(service: Arc<dyn Service>, claim: Claim, path: InitPath) {
    let span = info_span!("initialize", service = %claim.id(), kind = "suspending");
    let outcome = path
        .scope(async move { run_suspending(&*service).await })
        .instrument(span)
        .await;
    claim.settle(outcome);
}

async fn run_suspending(service: &dyn Service) -> Result<(), InitFailure> {
    info!("Initializing service");
    service.initialize().await.map_err(InitFailure::initialize)?;
    match service.ping().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(InitFailure::Unhealthy),
        Err(e) => Err(InitFailure::ping(e)),
    }
}

fn drive_blocking(service: Arc<dyn BlockingService>, claim: Claim, path: InitPath) {
    let span = info_span!("initialize", service = %claim.id(), kind = "blocking");
    let _entered = span.enter();
    let outcome = path.enter(|| run_blocking(&*service));
    claim.settle(outcome);
}

fn run_blocking(service: &dyn BlockingService) -> Result<(), InitFailure> {
    info!("Initializing service");
    service.initialize().map_err(InitFailure::initialize)?;
    match service.ping() {
        Ok(true) => Ok(()),
        Ok(false) => Err(InitFailure::Unhealthy),
        Err(e) => Err(InitFailure::ping(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{InitLog, MockService};

    #[test]
    fn blocking_request_initializes_the_chain_in_order() {
        let log = InitLog::new();
        let orchestrator = Orchestrator::new();
        for (name, deps) in [("Config", vec![]), ("Db", vec!["Config"]), ("Users", vec!["Db"])] {
            orchestrator
                .register_blocking(name, MockService::new(name).with_log(&log))
                .expect("register");
            orchestrator.declare(name, deps).expect("declare");
        }

        orchestrator.ensure_ready_blocking("Users").expect("ready");
        orchestrator.ensure_ready_blocking("Users").expect("still ready");

        assert_eq!(log.initialized(), ["Config", "Db", "Users"]);
        assert_eq!(orchestrator.state("Db"), ServiceState::Ready);
    }

    #[test]
    fn suspending_routine_runs_on_the_fallback_runtime() {
        let orchestrator = Orchestrator::builder().fallback_worker_threads(1).build();
        let handle = orchestrator
            .register("Cache", MockService::new("Cache"))
            .expect("register");

        orchestrator.ensure_ready_blocking("Cache").expect("ready");
        assert_eq!(handle.unguarded().initialize_calls(), 1);
    }

    #[test]
    fn set_setup_is_refused_after_setup_ran() {
        let orchestrator = Orchestrator::new();
        orchestrator
            .register_blocking("Config", MockService::new("Config"))
            .expect("register");

        assert!(orchestrator.set_setup(|| Ok(())));
        orchestrator.ensure_ready_blocking("Config").expect("ready");
        assert!(!orchestrator.set_setup(|| Ok(())));
    }

    #[test]
    fn reset_ignores_services_that_did_not_fail() {
        let orchestrator = Orchestrator::new();
        orchestrator
            .register_blocking("Config", MockService::new("Config"))
            .expect("register");

        assert!(!orchestrator.reset("Config"));
        orchestrator.ensure_ready_blocking("Config").expect("ready");
        assert!(!orchestrator.reset("Config"));
        assert!(!orchestrator.reset("Ghost"));
    }

    #[test]
    fn global_orchestrator_is_shared() {
        global()
            .register_blocking("GlobalProbe", MockService::new("GlobalProbe"))
            .expect("register");

        assert!(std::ptr::eq(global(), global()));
        assert_eq!(global().state("GlobalProbe"), ServiceState::Uninitialized);
        global().ensure_ready_blocking("GlobalProbe").expect("ready");
        assert_eq!(global().state("GlobalProbe"), ServiceState::Ready);
    }
}

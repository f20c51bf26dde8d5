//! # Service Descriptor
//!
//! Per-service lifecycle record: the registered routine, the current [`ServiceState`], the
//! stored failure and the wake-up channels for callers waiting on an in-flight initialization.
//!
//! ## Claiming
//!
//! Exactly one caller moves a descriptor from `Uninitialized` to `Initializing` by taking a
//! [`Claim`]. Everybody else either sees a settled state or waits. The claim is a guard: it
//! settles the descriptor as `Ready` or `Failed`, hands it back with [`Claim::release`], or, if it
//! is dropped unsettled (panic, runtime shutdown), marks the service as aborted so waiters never
//! hang.
//!
//! ## Waiting
//!
//! The state lives in an atomic so a READY check costs one load. Transitions happen under the
//! slot mutex; blocking waiters sleep on a `Condvar`, async waiters on a tokio `Notify`.

use crate::framework::error::{InitFailure, InitializationError, ServiceError};
use crate::framework::service::Routine;
use crate::framework::ServiceId;
use crate::lifecycle::path::InitPath;
use crate::lifecycle::state::ServiceState;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Slot {
    routine: Option<Routine>,
    last_error: Option<InitializationError>,
    /// Path of the caller that claimed the current initialization.
    initializer: Option<InitPath>,
}

pub struct ServiceDescriptor {
    id: ServiceId,
    state: AtomicU8,
    slot: Mutex<Slot>,
    settled: Condvar,
    notify: Notify,
}

/// Result of trying to claim a descriptor.
pub(crate) enum Attempt {
    Ready,
    Failed(InitializationError),
    /// Another caller holds the claim.
    Busy,
    Unregistered,
    Claimed(Claim),
}

impl ServiceDescriptor {
    pub(crate) fn new(id: ServiceId) -> Self {
        Self {
            id,
            state: AtomicU8::new(ServiceState::Uninitialized as u8),
            slot: Mutex::new(Slot::default()),
            settled: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// The failure stored by the last settled initialization, if it failed.
    pub fn last_error(&self) -> Option<InitializationError> {
        self.lock().last_error.clone()
    }

    /// Path of the caller currently initializing this service.
    pub fn initializer(&self) -> Option<InitPath> {
        self.lock().initializer.clone()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.lock().routine.is_some()
    }

    pub(crate) fn attach(&self, routine: Routine) -> Result<(), ServiceError> {
        let mut slot = self.lock();
        if slot.routine.is_some() {
            return Err(ServiceError::AlreadyRegistered(self.id.clone()));
        }
        debug!(service = %self.id, kind = routine.kind(), "Routine attached");
        slot.routine = Some(routine);
        Ok(())
    }

    pub(crate) fn try_claim(self: &Arc<Self>, path: &InitPath) -> Attempt {
        let mut slot = self.lock();
        match self.state() {
            ServiceState::Ready => Attempt::Ready,
            ServiceState::Initializing => Attempt::Busy,
            ServiceState::Failed => Attempt::Failed(slot.last_error.clone().unwrap_or_else(|| {
                InitializationError::failed(self.id.clone(), InitFailure::Aborted)
            })),
            ServiceState::Uninitialized => match slot.routine.clone() {
                None => Attempt::Unregistered,
                Some(routine) => {
                    slot.initializer = Some(path.clone());
                    self.store(ServiceState::Initializing);
                    Attempt::Claimed(Claim {
                        descriptor: Arc::clone(self),
                        routine,
                        done: false,
                    })
                }
            },
        }
    }

    /// FAILED back to UNINITIALIZED. Any other state is left alone.
    pub(crate) fn reset(&self) -> bool {
        let mut slot = self.lock();
        if self.state() != ServiceState::Failed {
            return false;
        }
        slot.last_error = None;
        self.store(ServiceState::Uninitialized);
        info!(service = %self.id, "Service reset");
        true
    }

    /// Suspends until the in-flight initialization settles or is released.
    pub(crate) async fn wait_async(&self) -> ServiceState {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let state = self.state();
            if state != ServiceState::Initializing {
                return state;
            }
            notified.await;
        }
    }

    /// Blocks the thread until the in-flight initialization settles or is released.
    pub(crate) fn wait_blocking(&self) -> ServiceState {
        let mut slot = self.lock();
        while self.state() == ServiceState::Initializing {
            slot = self
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(slot);
        self.state()
    }

    fn settle(&self, outcome: Result<(), InitializationError>) {
        let mut slot = self.lock();
        slot.initializer = None;
        match outcome {
            Ok(()) => {
                slot.last_error = None;
                self.store(ServiceState::Ready);
                info!(service = %self.id, "Service ready");
            }
            Err(e) => {
                warn!(service = %self.id, error = %e, "Service failed");
                slot.last_error = Some(e);
                self.store(ServiceState::Failed);
            }
        }
        drop(slot);
        self.wake();
    }

    fn release(&self) {
        let mut slot = self.lock();
        slot.initializer = None;
        if self.state() == ServiceState::Initializing {
            self.store(ServiceState::Uninitialized);
        }
        drop(slot);
        self.wake();
    }

    fn wake(&self) {
        self.settled.notify_all();
        self.notify.notify_waiters();
    }

    /// Callers hold the slot lock.
    fn store(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive right to run one initialization of a descriptor.
pub(crate) struct Claim {
    descriptor: Arc<ServiceDescriptor>,
    routine: Routine,
    done: bool,
}

impl Claim {
    pub(crate) fn id(&self) -> &ServiceId {
        &self.descriptor.id
    }

    pub(crate) fn routine(&self) -> &Routine {
        &self.routine
    }

    pub(crate) fn settle(mut self, outcome: Result<(), InitFailure>) {
        self.done = true;
        let id = self.descriptor.id.clone();
        self.descriptor
            .settle(outcome.map_err(|failure| InitializationError::failed(id, failure)));
    }

    /// Gives the descriptor back untouched, as if it had never been claimed.
    pub(crate) fn release(mut self) {
        self.done = true;
        self.descriptor.release();
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!(service = %self.descriptor.id, "Initialization dropped before it settled");
        self.descriptor.settle(Err(InitializationError::failed(
            self.descriptor.id.clone(),
            InitFailure::Aborted,
        )));
    }
}

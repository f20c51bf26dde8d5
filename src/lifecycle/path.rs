//! # Initialization Path
//!
//! An [`InitPath`] is the chain of services whose `initialize()` is in progress on the current
//! logical call path, outermost first. The orchestrator threads it explicitly through nested
//! requests; a request that resolves back to a service already on the path is a self-dependency
//! and fails fast instead of waiting on itself.
//!
//! Routines don't receive the path as an argument. While a routine runs, the orchestrator exposes
//! it through a scope:
//!
//! - suspending routines run inside a tokio task-local scope ([`InitPath::scope`]),
//! - blocking routines run inside a thread-local scope ([`InitPath::enter`]).
//!
//! A routine that spawns its own tasks should carry the path along explicitly:
//!
//! ```rust,ignore
//! let path = InitPath::current();
//! tokio::spawn(path.scope(async move { users.ready().await }));
//! ```

use crate::framework::id::{format_chain, ServiceId};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;

tokio::task_local! {
    static TASK_PATH: InitPath;
}

thread_local! {
    static THREAD_PATH: RefCell<Option<InitPath>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitPath {
    chain: Vec<ServiceId>,
}

impl InitPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// The path of the routine running on this task or thread, or an empty path.
    ///
    /// When both a task scope and a thread scope are active the deeper one wins: scopes only
    /// ever nest, so the longer chain is the innermost.
    pub fn current() -> Self {
        let task = TASK_PATH.try_with(InitPath::clone).ok();
        let thread = THREAD_PATH.with(|slot| slot.borrow().clone());

        match (task, thread) {
            (Some(task), Some(thread)) if thread.len() > task.len() => thread,
            (Some(task), _) => task,
            (None, Some(thread)) => thread,
            (None, None) => InitPath::default(),
        }
    }

    pub fn ids(&self) -> &[ServiceId] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.chain.contains(id)
    }

    /// The service whose routine is running right now.
    pub fn innermost(&self) -> Option<&ServiceId> {
        self.chain.last()
    }

    pub(crate) fn child(&self, id: &ServiceId) -> Self {
        let mut chain = self.chain.clone();
        chain.push(id.clone());
        Self { chain }
    }

    /// Runs `fut` with this path visible to [`InitPath::current`].
    pub fn scope<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        TASK_PATH.scope(self, fut)
    }

    /// Runs `f` on this thread with this path visible to [`InitPath::current`].
    pub fn enter<R>(self, f: impl FnOnce() -> R) -> R {
        let previous = THREAD_PATH.with(|slot| slot.replace(Some(self)));
        let _restore = Restore(previous);
        f()
    }
}

impl fmt::Display for InitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_chain(&self.chain))
    }
}

/// Puts the outer thread scope back, also when `f` unwinds.
struct Restore(Option<InitPath>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        THREAD_PATH.with(|slot| *slot.borrow_mut() = previous);
    }
}

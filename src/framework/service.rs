//! # Service Contract
//!
//! The traits a singleton must implement to be driven by the
//! [`Orchestrator`](crate::lifecycle::Orchestrator).
//!
//! A service comes in one of two flavours:
//!
//! - [`Service`] for routines that suspend (`async fn initialize`), driven on a tokio task.
//! - [`BlockingService`] for routines that block the calling thread.
//!
//! Both share the same lifecycle: `initialize()` runs exactly once, then `ping()` is asked whether
//! the service came up healthy. The default `ping()` always answers `true`.
//!
//! Services are singletons shared behind an `Arc`, so every hook takes `&self`. State built during
//! `initialize()` lives in interior-mutable fields such as [`InitCell`](crate::lifecycle::InitCell).

use crate::framework::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;

/// A singleton whose initialization suspends instead of blocking.
///
/// # Example
///
/// ```rust
/// use singleton_service::{BoxError, Service};
/// use async_trait::async_trait;
///
/// struct Cache;
///
/// #[async_trait]
/// impl Service for Cache {
///     async fn initialize(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Builds the service's resources. Dependencies are READY when this runs.
    ///
    /// Any error marks the service FAILED.
    async fn initialize(&self) -> Result<(), BoxError>;

    /// Health check run right after a successful `initialize()`.
    ///
    /// Returning `Ok(false)` or an error marks the service FAILED.
    async fn ping(&self) -> Result<bool, BoxError> {
        Ok(true)
    }
}

/// A singleton whose initialization blocks the calling thread.
pub trait BlockingService: Send + Sync + 'static {
    /// Builds the service's resources. Dependencies are READY when this runs.
    fn initialize(&self) -> Result<(), BoxError>;

    /// Health check run right after a successful `initialize()`.
    fn ping(&self) -> Result<bool, BoxError> {
        Ok(true)
    }
}

/// The registered initialization routine of a descriptor.
#[derive(Clone)]
pub(crate) enum Routine {
    Suspending(Arc<dyn Service>),
    Blocking(Arc<dyn BlockingService>),
}

impl Routine {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Routine::Suspending(_) => "suspending",
            Routine::Blocking(_) => "blocking",
        }
    }
}

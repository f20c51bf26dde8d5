//! Building blocks shared by the graph and lifecycle layers.
//!
//! # Main Components
//!
//! - [`ServiceId`] - identity of a singleton service
//! - [`Service`] / [`BlockingService`] - the routines a service exposes to the orchestrator
//! - [`ServiceError`] - errors surfaced to callers
//!
//! # Testing
//!
//! See the [`mock`] module for scriptable services.

pub mod error;
pub mod id;
pub mod mock;
pub mod service;

pub use error::{BoxError, InitFailure, InitializationError, Result, ServiceError, SharedError};
pub use id::ServiceId;
pub use service::{BlockingService, Service};

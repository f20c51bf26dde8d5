//! Service lifecycle: descriptors, the registry and the orchestrator that drives them.
//!
//! - [`Orchestrator`] - exactly-once, dependency-ordered initialization
//! - [`ServiceDescriptor`] - per-service state and wake-up channels
//! - [`InitPath`] - the chain of services initializing on the current call path
//! - [`InitCell`] - write-once state assigned during `initialize()`

pub mod cell;
pub mod descriptor;
pub mod orchestrator;
pub mod path;
mod registry;
pub mod state;
pub mod tracing;

pub use cell::InitCell;
pub use descriptor::ServiceDescriptor;
pub use orchestrator::{global, Orchestrator, OrchestratorBuilder, SetupHook};
pub use path::InitPath;
pub use state::{ServiceState, ServiceStatus};

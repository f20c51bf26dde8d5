#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Singleton Service
//!
//! > **Lazy, dependency-ordered, exactly-once initialization of singleton services.**
//!
//! A service is a process-wide singleton with an `initialize()` routine and an optional `ping()`
//! health check. Services declare which other services they need. The first guarded call on a
//! service initializes its whole dependency closure in order, exactly once, no matter how many
//! tasks or threads ask at the same time.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Explicit over implicit
//! There is no interception of arbitrary methods. Registration hands back a typed
//! [`ServiceHandle`], and guarded operations go through it (`handle.ready().await?`), or through
//! a domain client implementing [`Guarded`].
//!
//! ### Fail closed
//! Dependency cycles and re-entrant requests are structural defects. They are reported before
//! any routine runs, with the offending chain of ids, and never worked around.
//!
//! ### One state machine, two calling conventions
//! Every operation has a suspending form for async code and a blocking form for plain threads.
//! Both share the same per-service state and wake-up channels, so a blocking caller and an async
//! caller racing for the same service still see one initialization.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Contract ([`framework`])
//! - **Role**: what a service is, how it is named and how it fails.
//! - **Key items**: [`Service`], [`BlockingService`], [`ServiceId`], [`ServiceError`].
//!
//! ### 2. The Graph ([`graph`])
//! - **Role**: declared edges, cycle detection and deterministic ordering.
//! - **Key items**: [`DependencyGraph`](graph::DependencyGraph),
//!   [`resolve_order`](graph::resolve_order), [`detect_cycle`](graph::detect_cycle).
//!
//! ### 3. The Orchestrator ([`lifecycle`])
//! - **Role**: drives each service through `UNINITIALIZED -> INITIALIZING -> READY | FAILED`.
//! - **Key items**: [`Orchestrator`], [`InitPath`], [`InitCell`].
//!   See [`lifecycle::tracing`] for what gets logged.
//!
//! ### 4. The Interface ([`handles`])
//! - **Role**: typed, guarded access to registered services.
//! - **Key items**: [`ServiceHandle`], [`Guarded`].
//!
//! ## 🚀 Quick Start
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::new();
//!
//! orchestrator.register_blocking("Config", Config::from_env())?;
//! let db = orchestrator.register("Db", Db::default())?.requires(["Config"])?;
//!
//! // Initializes Config, then Db, then runs the query
//! let user = db.call_async("find_user", |db| db.find_user(1)).await?;
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run -p service-sample
//! ```

pub mod framework;
pub mod graph;
pub mod handles;
pub mod lifecycle;

pub use framework::{
    BlockingService, BoxError, InitFailure, InitializationError, Result, Service, ServiceError,
    ServiceId,
};
pub use handles::{Guarded, ServiceHandle};
pub use lifecycle::{
    global, InitCell, InitPath, Orchestrator, OrchestratorBuilder, ServiceState, ServiceStatus,
};

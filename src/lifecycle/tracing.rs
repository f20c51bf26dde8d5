//! # Observability & Tracing
//!
//! The library only emits `tracing` events and spans; applications decide where they go.
//! [`setup_tracing`] is the subscriber the demo application installs.
//!
//! ## Configuration
//!
//! Levels come from `RUST_LOG`. The output is compact and hides module paths
//! (`with_target(false)`); the `service` field says where an event came from.
//!
//! ```bash
//! # Lifecycle transitions only
//! RUST_LOG=info cargo run -p service-sample
//!
//! # Plus computed orders, re-raised failures and declarations
//! RUST_LOG=debug cargo run -p service-sample
//! ```
//!
//! ## What Gets Traced
//!
//! - **Setup**: the one-time setup hook ran or failed
//! - **Planning**: the initialization order computed for a request, and the operation that
//!   triggered it (`requested_for`)
//! - **Lifecycle**: each `initialize` span, with `service` and routine `kind`, and the
//!   ready / failed / reset transitions
//! - **Failures**: stored failures re-raised to later callers
//!
//! ## Trace Example
//!
//! The first `Users.get(1)` of the demo, with `RUST_LOG=debug`:
//!
//! ```text
//! DEBUG Initialization order service=Users requested_for="get" order="Config, Db, Users"
//! INFO initialize: Initializing service service=Config kind="blocking"
//! INFO Service ready service=Config
//! INFO initialize: Initializing service service=Db kind="suspending"
//! INFO Service ready service=Db
//! INFO initialize: Initializing service service=Users kind="suspending"
//! INFO Service ready service=Users
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

//! # Service Sample
//!
//! Boots a three-service chain lazily:
//!
//! 1. [`AppServices::new`] registers `Config`, `Db` and `Users` without initializing anything.
//! 2. The first `users.get(1)` initializes `Config`, `Db`, `Users`, in that order.
//! 3. `users.get(2)` finds everything READY and initializes nothing.
//! 4. The status snapshot is logged.
//!
//! Settings come from `SAMPLE_DB_URL` (default `memory://users`) and `SAMPLE_SEED_USERS`
//! (default `3`).

use service_sample::lifecycle::AppServices;
use singleton_service::lifecycle::tracing::setup_tracing;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting application");
    let app = AppServices::new().map_err(|e| e.to_string())?;

    let span = tracing::info_span!("first_lookup");
    let first = async {
        info!("Fetching user 1");
        app.users.get(1).await
    }
    .instrument(span)
    .await;

    match first {
        Ok(user) => info!(id = user.id, name = %user.name, "User loaded"),
        Err(e) => {
            error!(error = %e, "First lookup failed");
            return Err(e.to_string());
        }
    }

    let span = tracing::info_span!("second_lookup");
    let second = async {
        info!("Fetching user 2");
        app.users.get(2).await
    }
    .instrument(span)
    .await
    .map_err(|e| e.to_string())?;
    info!(id = second.id, name = %second.name, "User loaded");

    for status in app.orchestrator.snapshot() {
        info!(
            service = %status.id,
            state = %status.state,
            dependencies = ?status.dependencies,
            "Service status"
        );
    }

    info!(boot = ?app.journal.entries(), "Application completed successfully");
    Ok(())
}

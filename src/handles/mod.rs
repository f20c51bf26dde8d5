//! Guarded access to registered services.
//!
//! A [`ServiceHandle`] is what registration returns: the only way to reach a service, and every
//! accessor except `unguarded()` waits for the service's dependency chain first. Domain clients
//! wrap a handle and implement [`Guarded`].

mod guarded;
mod service_handle;

pub use guarded::Guarded;
pub use service_handle::ServiceHandle;

//! Dependency graph, validation and ordering.
//!
//! - [`DependencyGraph`] - declared edges between services
//! - [`detect_cycle`] - depth-first cycle detection rooted at one service
//! - [`resolve_order`] - deterministic initialization order for a service's closure

pub mod dependency;
pub mod order;
pub mod validator;

pub use dependency::DependencyGraph;
pub use order::resolve_order;
pub use validator::detect_cycle;

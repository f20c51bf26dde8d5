//! # Service Sample Library
//!
//! The demo application's services, clients and wiring, exposed for integration testing.

pub mod clients;
pub mod lifecycle;
pub mod model;
pub mod services;

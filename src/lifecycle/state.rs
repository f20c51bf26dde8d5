//! Lifecycle states and status reports.

use crate::framework::ServiceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a service is in its one-way lifecycle.
///
/// `Uninitialized -> Initializing -> Ready | Failed`. `Ready` never reverts; `Failed` only
/// returns to `Uninitialized` through an explicit
/// [`Orchestrator::reset`](crate::lifecycle::Orchestrator::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Failed = 3,
}

impl ServiceState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ServiceState::Initializing,
            2 => ServiceState::Ready,
            3 => ServiceState::Failed,
            _ => ServiceState::Uninitialized,
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, ServiceState::Ready | ServiceState::Failed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of one service, suitable for health endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub id: ServiceId,
    pub state: ServiceState,
    pub dependencies: Vec<ServiceId>,
    pub last_error: Option<String>,
}

//! # Service Errors
//!
//! This module defines the error types surfaced by the orchestration engine. By centralizing them
//! we get one taxonomy for every caller:
//!
//! - **Structural errors** ([`ServiceError::CircularDependency`], [`ServiceError::SelfDependency`])
//!   describe a defect in the dependency declarations and are never resolved implicitly.
//! - **Initialization errors** ([`InitializationError`]) wrap a failing `initialize()` or `ping()`
//!   and always name the service that actually failed, even several dependency levels away.
//!
//! All errors are `Clone`: every caller waiting on the same initialization receives the same value.

use crate::framework::id::{format_chain, ServiceId};
use std::sync::Arc;

/// Error type returned by service routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a routine error, stored on the failed descriptor.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

/// Why a service's own routine did not bring it to READY.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InitFailure {
    #[error("initialize() failed: {0}")]
    Initialize(#[source] SharedError),
    #[error("ping() reported the service as unhealthy")]
    Unhealthy,
    #[error("ping() failed: {0}")]
    Ping(#[source] SharedError),
    /// The initializer panicked or its runtime shut down before it settled.
    #[error("initialization was aborted before it completed")]
    Aborted,
}

impl InitFailure {
    pub(crate) fn initialize(e: BoxError) -> Self {
        InitFailure::Initialize(Arc::from(e))
    }

    pub(crate) fn ping(e: BoxError) -> Self {
        InitFailure::Ping(Arc::from(e))
    }
}

/// A failed initialization, attributed to the service that failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InitializationError {
    /// The service's own `initialize()` or `ping()` failed.
    #[error("failed to initialize service {service}: {failure}")]
    Failed {
        service: ServiceId,
        #[source]
        failure: InitFailure,
    },
    /// A dependency failed, so `service` never ran.
    #[error(
        "failed to initialize service {service} because of {}: {}",
        .cause.failed_service(),
        .cause.failure()
    )]
    Dependency {
        service: ServiceId,
        #[source]
        cause: Box<InitializationError>,
    },
}

impl InitializationError {
    pub(crate) fn failed(service: ServiceId, failure: InitFailure) -> Self {
        InitializationError::Failed { service, failure }
    }

    /// The service this error was reported for.
    pub fn service(&self) -> &ServiceId {
        match self {
            InitializationError::Failed { service, .. }
            | InitializationError::Dependency { service, .. } => service,
        }
    }

    /// The service whose own routine failed.
    pub fn failed_service(&self) -> &ServiceId {
        match self {
            InitializationError::Failed { service, .. } => service,
            InitializationError::Dependency { cause, .. } => cause.failed_service(),
        }
    }

    /// The underlying routine failure.
    pub fn failure(&self) -> &InitFailure {
        match self {
            InitializationError::Failed { failure, .. } => failure,
            InitializationError::Dependency { cause, .. } => cause.failure(),
        }
    }

    /// Re-reports a stored failure for a request rooted at `requested`.
    pub(crate) fn attribute_to(self, requested: &ServiceId) -> Self {
        if self.service() == requested {
            self
        } else {
            InitializationError::Dependency {
                service: requested.clone(),
                cause: Box::new(self),
            }
        }
    }
}

/// Errors returned by the orchestration engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("circular dependency detected: {}", format_chain(.cycle))]
    CircularDependency { cycle: Vec<ServiceId> },

    #[error(
        "service {service} was requested from inside its own initialization: {}",
        format_chain(.path)
    )]
    SelfDependency {
        service: ServiceId,
        path: Vec<ServiceId>,
    },

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error("service {0} has no registered initialization routine")]
    NotRegistered(ServiceId),

    #[error("service {0} is already registered")]
    AlreadyRegistered(ServiceId),

    #[error("dependencies of service {0} are frozen: it has already begun initializing")]
    DependenciesFrozen(ServiceId),

    #[error("setup hook failed: {0}")]
    Setup(#[source] SharedError),

    #[error("the setup hook may not request services")]
    SetupReentered,

    #[error("service {0} outlived the orchestrator it was registered with")]
    Detached(ServiceId),

    #[error("attribute {attribute} of service {service} was never set by initialize()")]
    UnsetAttribute {
        service: ServiceId,
        attribute: &'static str,
    },

    #[error("attribute {attribute} of service {service} may only be assigned inside initialize()")]
    GuardedAssignment {
        service: ServiceId,
        attribute: &'static str,
    },

    #[error("attribute {attribute} of service {service} was already assigned")]
    AttributeAlreadySet {
        service: ServiceId,
        attribute: &'static str,
    },

    #[error("could not start a runtime for service initialization: {0}")]
    Runtime(#[source] Arc<std::io::Error>),
}

impl ServiceError {
    /// True for errors caused by the shape of the dependency declarations.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ServiceError::CircularDependency { .. } | ServiceError::SelfDependency { .. }
        )
    }

    /// True if this error, or the routine failure it wraps, is a self-dependency.
    pub fn is_self_dependency(&self) -> bool {
        match self {
            ServiceError::SelfDependency { .. } => true,
            ServiceError::Initialization(e) => match e.failure() {
                InitFailure::Initialize(cause) => cause
                    .downcast_ref::<ServiceError>()
                    .is_some_and(ServiceError::is_self_dependency),
                _ => false,
            },
            _ => false,
        }
    }

    /// The initialization error, if this is one.
    pub fn as_initialization(&self) -> Option<&InitializationError> {
        match self {
            ServiceError::Initialization(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boom() -> InitializationError {
        InitializationError::failed(
            ServiceId::from("Config"),
            InitFailure::initialize("missing file".into()),
        )
    }

    #[test]
    fn dependency_failure_names_the_failed_service() {
        let err = boom().attribute_to(&ServiceId::from("Users"));

        assert_eq!(err.service().as_str(), "Users");
        assert_eq!(err.failed_service().as_str(), "Config");
        assert_eq!(
            err.to_string(),
            "failed to initialize service Users because of Config: initialize() failed: missing file"
        );

        let source = std::error::Error::source(&err).expect("dependency cause");
        assert!(source.to_string().starts_with("failed to initialize service Config"));
    }

    #[test]
    fn own_failure_is_not_rewrapped() {
        let err = boom().attribute_to(&ServiceId::from("Config"));
        assert!(matches!(err, InitializationError::Failed { .. }));
    }

    #[test]
    fn cycle_is_rendered_in_order() {
        let err = ServiceError::CircularDependency {
            cycle: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "circular dependency detected: A -> B -> A");
        assert!(err.is_structural());
    }

    #[test]
    fn nested_self_dependency_is_found_through_the_routine_error() {
        let inner = ServiceError::SelfDependency {
            service: "Db".into(),
            path: vec!["Db".into(), "Db".into()],
        };
        let err: ServiceError = InitializationError::failed(
            "Db".into(),
            InitFailure::initialize(Box::new(inner)),
        )
        .into();

        assert!(err.is_self_dependency());
        assert!(!err.is_structural());
    }
}

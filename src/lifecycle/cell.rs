//! Write-once service state that only the owning service's `initialize()` may assign.

use crate::framework::error::{Result, ServiceError};
use crate::framework::ServiceId;
use crate::lifecycle::path::InitPath;
use std::fmt;
use std::sync::OnceLock;

/// A value built by a service during `initialize()` and read by its guarded operations.
///
/// ```rust,ignore
/// struct Db {
///     pool: InitCell<Pool>,
/// }
///
/// impl BlockingService for Db {
///     fn initialize(&self) -> Result<(), BoxError> {
///         self.pool.set(Pool::connect()?)?;
///         Ok(())
///     }
/// }
/// ```
pub struct InitCell<T> {
    owner: ServiceId,
    attribute: &'static str,
    value: OnceLock<T>,
}

impl<T> InitCell<T> {
    pub fn new(owner: impl Into<ServiceId>, attribute: &'static str) -> Self {
        Self {
            owner: owner.into(),
            attribute,
            value: OnceLock::new(),
        }
    }

    /// Assigns the value from inside the owner's `initialize()`.
    pub fn set(&self, value: T) -> Result<()> {
        if InitPath::current().innermost() != Some(&self.owner) {
            return Err(ServiceError::GuardedAssignment {
                service: self.owner.clone(),
                attribute: self.attribute,
            });
        }
        self.value
            .set(value)
            .map_err(|_| ServiceError::AttributeAlreadySet {
                service: self.owner.clone(),
                attribute: self.attribute,
            })
    }

    pub fn get(&self) -> Result<&T> {
        self.value.get().ok_or_else(|| ServiceError::UnsetAttribute {
            service: self.owner.clone(),
            attribute: self.attribute,
        })
    }

    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for InitCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitCell")
            .field("owner", &self.owner)
            .field("attribute", &self.attribute)
            .field("value", &self.value.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside<R>(owner: &str, f: impl FnOnce() -> R) -> R {
        InitPath::new().child(&owner.into()).enter(f)
    }

    #[test]
    fn assignment_outside_initialize_is_rejected() {
        let cell = InitCell::new("Db", "pool");

        let err = cell.set(1).unwrap_err();
        assert!(matches!(err, ServiceError::GuardedAssignment { attribute: "pool", .. }));
        assert!(!cell.is_set());
    }

    #[test]
    fn assignment_from_another_service_is_rejected() {
        let cell = InitCell::new("Db", "pool");

        let err = inside("Users", || cell.set(1)).unwrap_err();
        assert!(matches!(err, ServiceError::GuardedAssignment { .. }));
    }

    #[test]
    fn owner_assigns_once() {
        let cell = InitCell::new("Db", "pool");

        inside("Db", || cell.set(7)).expect("first assignment");
        let err = inside("Db", || cell.set(8)).unwrap_err();

        assert!(matches!(err, ServiceError::AttributeAlreadySet { .. }));
        assert_eq!(cell.get().copied().ok(), Some(7));
    }

    #[test]
    fn reading_an_unset_value_names_the_attribute() {
        let cell: InitCell<u32> = InitCell::new("Db", "pool");

        let err = cell.get().unwrap_err();
        assert_eq!(
            err.to_string(),
            "attribute pool of service Db was never set by initialize()"
        );
    }
}

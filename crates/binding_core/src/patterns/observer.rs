//! Observer side of the notification graph.
//!
//! An observer is any type implementing [`Observer`] that also owns a
//! [`Registrations`] component. The component remembers which observables
//! the observer is registered with, keeps them alive, and tears every pairing
//! down when it is dropped.
//!
//! Because `register_with` must hand the observable a back-reference to the
//! observer itself, observers are built with [`Rc::new_cyclic`]:
//!
//! ```
//! use std::rc::{Rc, Weak};
//! use binding_core::patterns::{Observable, Observer, Registrations};
//! use binding_core::types::BindingError;
//!
//! struct Listener {
//!     registrations: Registrations,
//! }
//!
//! impl Observer for Listener {
//!     fn update(&self) -> Result<(), BindingError> {
//!         Ok(())
//!     }
//! }
//!
//! let source = Observable::new();
//! let listener = Rc::new_cyclic(|weak: &Weak<Listener>| Listener {
//!     registrations: Registrations::new(weak.clone()),
//! });
//!
//! listener.registrations.register_with(&source);
//! assert!(source.is_observed_by(listener.registrations.id()));
//!
//! drop(listener);
//! assert_eq!(source.observer_count(), 0);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::observable::{Observable, ObserverId};
use crate::types::BindingError;

/// An entity that listens for changes.
///
/// `update()` carries no payload: it only says that something upstream
/// changed and derived state must be re-derived.
pub trait Observer {
    /// React to a change in one of the observed entities.
    ///
    /// # Errors
    ///
    /// Any error is propagated to whoever triggered the notification.
    fn update(&self) -> Result<(), BindingError>;
}

/// The observer-side half of every registration.
///
/// # Invariants
///
/// - If this component lists observable `A`, then `A` lists this observer,
///   and vice versa.
/// - Dropping the component unregisters from every observable.
pub struct Registrations {
    id: ObserverId,
    this: Weak<dyn Observer>,
    observables: RefCell<Vec<Rc<Observable>>>,
}

impl fmt::Debug for Registrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrations")
            .field("id", &self.id)
            .field("observable_count", &self.observables.borrow().len())
            .finish()
    }
}

impl Registrations {
    /// Create the component for the observer behind `this`.
    pub fn new(this: Weak<dyn Observer>) -> Self {
        Self {
            id: ObserverId::fresh(),
            this,
            observables: RefCell::new(Vec::new()),
        }
    }

    /// Identity of the owning observer.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Register with `observable`.
    ///
    /// Registering twice is a no-op: the observer is still notified once per
    /// change. Returns whether a new pairing was created.
    pub fn register_with(&self, observable: &Rc<Observable>) -> bool {
        let created = observable.attach(self.id, self.this.clone());
        if created {
            self.observables.borrow_mut().push(Rc::clone(observable));
            debug!(observer = %self.id, observable = %observable.id(), "registered");
        }
        created
    }

    /// Register with every observable yielded by `observables`.
    pub fn register_with_all<'a>(&self, observables: impl IntoIterator<Item = &'a Rc<Observable>>) {
        for observable in observables {
            self.register_with(observable);
        }
    }

    /// Remove the pairing with `observable` in both directions.
    ///
    /// Does nothing when the observer was not registered. Returns whether a
    /// pairing was removed.
    pub fn unregister_with(&self, observable: &Rc<Observable>) -> bool {
        let removed_here = {
            let mut observables = self.observables.borrow_mut();
            let before = observables.len();
            observables.retain(|o| !Rc::ptr_eq(o, observable));
            observables.len() != before
        };
        let removed_there = observable.detach(self.id);
        if removed_here || removed_there {
            debug!(observer = %self.id, observable = %observable.id(), "unregistered");
        }
        removed_here || removed_there
    }

    /// Remove this observer from every observable it is registered with.
    pub fn unregister_with_all(&self) {
        let observables = std::mem::take(&mut *self.observables.borrow_mut());
        for observable in &observables {
            observable.detach(self.id);
        }
        if !observables.is_empty() {
            debug!(observer = %self.id, count = observables.len(), "unregistered from all");
        }
    }

    /// Whether this observer is registered with `observable`.
    pub fn is_registered_with(&self, observable: &Observable) -> bool {
        self.observables
            .borrow()
            .iter()
            .any(|o| std::ptr::eq(Rc::as_ptr(o), observable))
    }

    /// Number of observables this observer is registered with.
    pub fn observable_count(&self) -> usize {
        self.observables.borrow().len()
    }
}

impl Drop for Registrations {
    fn drop(&mut self) {
        self.unregister_with_all();
    }
}

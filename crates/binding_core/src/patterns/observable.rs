//! Observable side of the notification graph.
//!
//! # Design
//!
//! An [`Observable`] is a shared (`Rc`) component that market-data and
//! derived objects compose. It keeps non-owning back-references to the
//! observers registered with it, so an observer never has its lifetime
//! extended by the things it watches. The owning direction runs the other
//! way: observers hold `Rc<Observable>` through their
//! [`Registrations`](super::observer::Registrations).
//!
//! # Notification
//!
//! `notify_observers()` takes a snapshot of the registration list before
//! calling anybody, so an observer may register, unregister or drop other
//! observers from inside its own `update()` without corrupting the loop.
//! Observers that died before their turn are skipped and pruned.
//!
//! # Failure Policy
//!
//! A failing observer does not stop delivery. Every observer in the
//! snapshot is called, failures are collected, and a single
//! [`BindingError::NotificationFailed`] is returned afterwards. Deliveries
//! that already happened are not undone.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use super::observer::Observer;
use super::settings::UpdateGate;
use crate::types::BindingError;

fn next_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Identity of an observer within the notification graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn fresh() -> Self {
        Self(next_id())
    }

    /// Raw numeric value, mainly for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Identity of an observable within the notification graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Raw numeric value, mainly for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observable#{}", self.0)
    }
}

/// A single (observer, back-reference) pairing.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: ObserverId,
    pub(crate) observer: Weak<dyn Observer>,
}

/// Anything that exposes an [`Observable`] component.
///
/// Observers register with the component, never with the owning object, so
/// the trait is all that is needed to make a type watchable.
pub trait Observed {
    /// The observable component of this object.
    fn observable(&self) -> &Rc<Observable>;
}

/// An entity other entities depend on.
///
/// # Invariants
///
/// 1. An observer appears at most once in the registration list.
/// 2. Registrations never keep an observer alive.
/// 3. `notify_observers()` delivers to a snapshot taken when it starts.
pub struct Observable {
    id: ObservableId,
    observers: RefCell<Vec<Registration>>,
    gate: Option<Rc<UpdateGate>>,
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("observer_count", &self.observers.borrow().len())
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

impl Observable {
    /// Create an ungated observable. Its notifications are always delivered
    /// immediately.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: ObservableId(next_id()),
            observers: RefCell::new(Vec::new()),
            gate: None,
        })
    }

    /// Create an observable whose notifications pass through `gate`.
    ///
    /// While the gate has updates disabled, notifications are either dropped
    /// or deferred until the gate is re-enabled.
    pub fn with_gate(gate: &Rc<UpdateGate>) -> Rc<Self> {
        Rc::new(Self {
            id: ObservableId(next_id()),
            observers: RefCell::new(Vec::new()),
            gate: Some(Rc::clone(gate)),
        })
    }

    /// Identity of this observable.
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Number of live registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|r| r.observer.strong_count() > 0)
            .count()
    }

    /// Whether the observer with `id` is registered here.
    pub fn is_observed_by(&self, id: ObserverId) -> bool {
        self.observers.borrow().iter().any(|r| r.id == id)
    }

    /// Add a registration. Returns `false` when the observer was already
    /// registered.
    pub(crate) fn attach(&self, id: ObserverId, observer: Weak<dyn Observer>) -> bool {
        let mut observers = self.observers.borrow_mut();
        if observers.iter().any(|r| r.id == id) {
            return false;
        }
        observers.push(Registration { id, observer });
        true
    }

    /// Remove a registration. Returns `false` when there was nothing to
    /// remove.
    pub(crate) fn detach(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|r| r.id != id);
        observers.len() != before
    }

    /// Call `update()` on every registered observer.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NotificationFailed`] if any observer failed.
    /// All observers in the snapshot have been called by then.
    pub fn notify_observers(&self) -> Result<(), BindingError> {
        let snapshot: Vec<Registration> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|r| r.observer.strong_count() > 0);
            observers.clone()
        };

        if let Some(gate) = &self.gate {
            if !gate.updates_enabled() {
                gate.hold(snapshot);
                return Ok(());
            }
        }

        trace!(observable = %self.id, observers = snapshot.len(), "notifying observers");
        deliver(&snapshot)
    }
}

/// Deliver `update()` to each registration, collecting failures.
pub(crate) fn deliver(targets: &[Registration]) -> Result<(), BindingError> {
    let mut errors = Vec::new();
    for registration in targets {
        let Some(observer) = registration.observer.upgrade() else {
            continue;
        };
        if let Err(err) = observer.update() {
            warn!(observer = %registration.id, error = %err, "observer update failed");
            err.flatten_into(&mut errors);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(BindingError::NotificationFailed { errors })
    }
}

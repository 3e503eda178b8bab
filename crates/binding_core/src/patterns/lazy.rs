//! Lazy recalculation on top of the notification graph.
//!
//! # State Machine
//!
//! Each lazy object is either *uncalculated* or *calculated*, with an
//! orthogonal *frozen* flag. It starts uncalculated and unfrozen.
//!
//! | Event | Effect |
//! |-------|--------|
//! | `update()` | mark uncalculated; notify downstream unless frozen |
//! | `calculate()` | run `perform_calculations` if uncalculated and not frozen |
//! | `recalculate()` | recompute unconditionally, then notify downstream |
//! | `freeze()` | stop recomputing and stop forwarding notifications |
//! | `unfreeze()` | resume; notify downstream, do not recompute |
//!
//! Invalidation is pushed, computation is pulled: a burst of upstream
//! changes costs one `perform_calculations` per object that is actually
//! queried afterwards.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::observable::{Observable, Observed};
use super::observer::{Observer, Registrations};
use super::settings::UpdateGate;
use crate::types::BindingError;

/// How a lazy object forwards notifications it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LazyForwarding {
    /// Forward every notification (unless frozen).
    #[default]
    Always,
    /// Forward only the notification that moves the object from calculated
    /// to uncalculated; later ones are swallowed until it is recalculated.
    FirstOnly,
}

/// Resets the `updating` flag however `update` exits.
struct UpdatingGuard<'a>(&'a Cell<bool>);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Shared state of a lazy object: its registrations as an observer, its own
/// observable, and the cache flags.
pub struct LazyState {
    registrations: Registrations,
    observable: Rc<Observable>,
    calculated: Cell<bool>,
    frozen: Cell<bool>,
    updating: Cell<bool>,
    forwarding: Cell<LazyForwarding>,
    calculations: Cell<u64>,
}

impl fmt::Debug for LazyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyState")
            .field("observer", &self.registrations.id())
            .field("observable", &self.observable.id())
            .field("calculated", &self.calculated.get())
            .field("frozen", &self.frozen.get())
            .field("forwarding", &self.forwarding.get())
            .field("calculations", &self.calculations.get())
            .finish()
    }
}

impl LazyState {
    /// State for the lazy object behind `this`, with an ungated observable.
    pub fn new(this: Weak<dyn Observer>) -> Self {
        Self::with_observable(this, Observable::new())
    }

    /// State whose downstream notifications pass through `gate`.
    pub fn with_gate(this: Weak<dyn Observer>, gate: &Rc<UpdateGate>) -> Self {
        Self::with_observable(this, Observable::with_gate(gate))
    }

    fn with_observable(this: Weak<dyn Observer>, observable: Rc<Observable>) -> Self {
        Self {
            registrations: Registrations::new(this),
            observable,
            calculated: Cell::new(false),
            frozen: Cell::new(false),
            updating: Cell::new(false),
            forwarding: Cell::new(LazyForwarding::Always),
            calculations: Cell::new(0),
        }
    }

    /// Observer-side registrations.
    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }

    /// Whether a valid cached result exists.
    pub fn is_calculated(&self) -> bool {
        self.calculated.get()
    }

    /// Whether automatic recalculation is suppressed.
    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Number of times `perform_calculations` has been started.
    pub fn calculation_count(&self) -> u64 {
        self.calculations.get()
    }

    /// Current forwarding policy.
    pub fn forwarding(&self) -> LazyForwarding {
        self.forwarding.get()
    }

    /// Forward every notification received.
    pub fn always_forward_notifications(&self) {
        self.forwarding.set(LazyForwarding::Always);
    }

    /// Forward only the first notification after a calculation.
    pub fn forward_first_notification_only(&self) {
        self.forwarding.set(LazyForwarding::FirstOnly);
    }

    /// The body of `Observer::update` for lazy objects.
    ///
    /// A notification arriving while this object is already inside `update`
    /// (a cycle in the graph) is ignored.
    ///
    /// # Errors
    ///
    /// Propagates downstream notification failures.
    pub fn update(&self) -> Result<(), BindingError> {
        if self.updating.get() {
            trace!(observer = %self.registrations.id(), "re-entrant update ignored");
            return Ok(());
        }
        self.updating.set(true);
        let _guard = UpdatingGuard(&self.updating);

        let was_calculated = self.calculated.get();
        if was_calculated || self.forwarding.get() == LazyForwarding::Always {
            self.calculated.set(false);
            if !self.frozen.get() {
                return self.observable.notify_observers();
            }
            trace!(observer = %self.registrations.id(), "frozen, notification not forwarded");
        }
        Ok(())
    }

    /// Run `perform` if the cache is stale and the object is not frozen.
    ///
    /// The object is marked calculated before `perform` runs, so a
    /// re-entrant request from inside `perform` returns immediately.
    ///
    /// # Errors
    ///
    /// If `perform` fails the object goes back to uncalculated and the
    /// error is returned.
    pub fn calculate<F>(&self, perform: F) -> Result<(), BindingError>
    where
        F: FnOnce() -> Result<(), BindingError>,
    {
        if self.calculated.get() || self.frozen.get() {
            return Ok(());
        }
        self.calculated.set(true);
        self.calculations.set(self.calculations.get() + 1);
        debug!(
            observer = %self.registrations.id(),
            count = self.calculations.get(),
            "performing calculations"
        );
        if let Err(err) = perform() {
            self.calculated.set(false);
            return Err(err);
        }
        Ok(())
    }

    /// Recompute unconditionally, then notify observers.
    ///
    /// The frozen flag is restored afterwards and observers are notified
    /// even when the computation fails.
    ///
    /// # Errors
    ///
    /// The computation's error takes precedence over notification failures.
    pub fn recalculate<F>(&self, perform: F) -> Result<(), BindingError>
    where
        F: FnOnce() -> Result<(), BindingError>,
    {
        let was_frozen = self.frozen.get();
        self.calculated.set(false);
        self.frozen.set(false);
        let outcome = self.calculate(perform);
        self.frozen.set(was_frozen);
        let notified = self.observable.notify_observers();
        outcome.and(notified)
    }

    /// Suppress recalculation and downstream forwarding.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    /// Lift the freeze and tell observers they may be stale.
    ///
    /// # Errors
    ///
    /// Propagates downstream notification failures.
    pub fn unfreeze(&self) -> Result<(), BindingError> {
        if self.frozen.get() {
            self.frozen.set(false);
            return self.observable.notify_observers();
        }
        Ok(())
    }
}

impl Observed for LazyState {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

/// An observer and observable that caches an expensive computation.
///
/// Implementors embed a [`LazyState`], route `Observer::update` to
/// [`LazyState::update`], and supply `perform_calculations`. Accessors of
/// derived quantities call [`calculate`](LazyObject::calculate) first.
pub trait LazyObject: Observer {
    /// The embedded lazy state.
    fn lazy_state(&self) -> &LazyState;

    /// Compute and store the derived quantities.
    ///
    /// # Errors
    ///
    /// Any error leaves the object uncalculated.
    fn perform_calculations(&self) -> Result<(), BindingError>;

    /// Bring the cache up to date if needed.
    ///
    /// # Errors
    ///
    /// Propagates `perform_calculations` failures.
    fn calculate(&self) -> Result<(), BindingError> {
        self.lazy_state().calculate(|| self.perform_calculations())
    }

    /// Recompute unconditionally and notify observers.
    ///
    /// # Errors
    ///
    /// Propagates computation or notification failures.
    fn recalculate(&self) -> Result<(), BindingError> {
        self.lazy_state().recalculate(|| self.perform_calculations())
    }

    /// See [`LazyState::freeze`].
    fn freeze(&self) {
        self.lazy_state().freeze();
    }

    /// See [`LazyState::unfreeze`].
    ///
    /// # Errors
    ///
    /// Propagates downstream notification failures.
    fn unfreeze(&self) -> Result<(), BindingError> {
        self.lazy_state().unfreeze()
    }

    /// Whether a valid cached result exists.
    fn is_calculated(&self) -> bool {
        self.lazy_state().is_calculated()
    }

    /// Whether automatic recalculation is suppressed.
    fn is_frozen(&self) -> bool {
        self.lazy_state().is_frozen()
    }
}

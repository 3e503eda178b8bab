//! Foreign subclasses of the graph's own abstract roles: `Observer` and
//! `LazyObject`.

use std::fmt;
use std::rc::{Rc, Weak};

use super::{ForeignClass, MethodSpec, Override};
use crate::patterns::lazy::{LazyObject, LazyState};
use crate::patterns::observer::{Observer, Registrations};
use crate::patterns::settings::UpdateGate;
use crate::types::BindingError;

type UpdateFn = dyn Fn() -> Result<(), BindingError>;
type LazyUpdateFn = dyn Fn(&LazyState) -> Result<(), BindingError>;
type PerformFn = dyn Fn() -> Result<(), BindingError>;

/// An observer whose `update` is supplied by foreign code.
pub struct ForeignObserver {
    registrations: Registrations,
    update: Override<UpdateFn>,
}

impl fmt::Debug for ForeignObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignObserver")
            .field("registrations", &self.registrations)
            .field("update", &self.update)
            .finish()
    }
}

impl ForeignObserver {
    /// Start describing a foreign observer.
    pub fn builder() -> ForeignObserverBuilder {
        ForeignObserverBuilder {
            update: Override::new(Self::CLASS, "update"),
        }
    }

    /// Observer-side registrations.
    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }
}

impl Observer for ForeignObserver {
    fn update(&self) -> Result<(), BindingError> {
        (self.update.required()?)()
    }
}

impl ForeignClass for ForeignObserver {
    const CLASS: &'static str = "Observer";
    const METHODS: &'static [MethodSpec] = &[MethodSpec::required("update")];

    fn is_overridden(&self, method: &str) -> bool {
        method == "update" && self.update.is_overridden()
    }
}

/// Builder for [`ForeignObserver`].
pub struct ForeignObserverBuilder {
    update: Override<UpdateFn>,
}

impl ForeignObserverBuilder {
    /// Override `update`.
    pub fn update(mut self, f: impl Fn() -> Result<(), BindingError> + 'static) -> Self {
        self.update.set(Box::new(f));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignObserver> {
        Rc::new_cyclic(|weak: &Weak<ForeignObserver>| ForeignObserver {
            registrations: Registrations::new(weak.clone()),
            update: self.update,
        })
    }
}

/// A lazy object whose computation is supplied by foreign code.
///
/// `perform_calculations` is required. `update` defaults to the native lazy
/// invalidation; an override receives the [`LazyState`] so it can still run
/// the native behaviour (`state.update()`) around its own logic.
pub struct ForeignLazyObject {
    lazy: LazyState,
    perform_calculations: Override<PerformFn>,
    update: Override<LazyUpdateFn>,
}

impl fmt::Debug for ForeignLazyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignLazyObject")
            .field("lazy", &self.lazy)
            .field("perform_calculations", &self.perform_calculations)
            .field("update", &self.update)
            .finish()
    }
}

impl ForeignLazyObject {
    /// Start describing a foreign lazy object.
    pub fn builder() -> ForeignLazyObjectBuilder {
        ForeignLazyObjectBuilder {
            perform_calculations: Override::new(Self::CLASS, "performCalculations"),
            update: Override::new(Self::CLASS, "update"),
            gate: None,
        }
    }
}

impl Observer for ForeignLazyObject {
    fn update(&self) -> Result<(), BindingError> {
        match self.update.get() {
            Some(f) => f(&self.lazy),
            None => self.lazy.update(),
        }
    }
}

impl LazyObject for ForeignLazyObject {
    fn lazy_state(&self) -> &LazyState {
        &self.lazy
    }

    fn perform_calculations(&self) -> Result<(), BindingError> {
        (self.perform_calculations.required()?)()
    }
}

impl ForeignClass for ForeignLazyObject {
    const CLASS: &'static str = "LazyObject";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("performCalculations"),
        MethodSpec::defaulted("update"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "performCalculations" => self.perform_calculations.is_overridden(),
            "update" => self.update.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignLazyObject`].
pub struct ForeignLazyObjectBuilder {
    perform_calculations: Override<PerformFn>,
    update: Override<LazyUpdateFn>,
    gate: Option<Rc<UpdateGate>>,
}

impl ForeignLazyObjectBuilder {
    /// Override `performCalculations`.
    pub fn perform_calculations(
        mut self,
        f: impl Fn() -> Result<(), BindingError> + 'static,
    ) -> Self {
        self.perform_calculations.set(Box::new(f));
        self
    }

    /// Override `update`.
    pub fn update(mut self, f: impl Fn(&LazyState) -> Result<(), BindingError> + 'static) -> Self {
        self.update.set(Box::new(f));
        self
    }

    /// Route downstream notifications through `gate`.
    pub fn gate(mut self, gate: &Rc<UpdateGate>) -> Self {
        self.gate = Some(Rc::clone(gate));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignLazyObject> {
        let Self {
            perform_calculations,
            update,
            gate,
        } = self;
        Rc::new_cyclic(|weak: &Weak<ForeignLazyObject>| {
            let this: Weak<dyn Observer> = weak.clone();
            let lazy = match &gate {
                Some(gate) => LazyState::with_gate(this, gate),
                None => LazyState::new(this),
            };
            ForeignLazyObject {
                lazy,
                perform_calculations,
                update,
            }
        })
    }
}

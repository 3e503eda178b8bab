//! Property and integration tests for the notification graph.
//!
//! Covers registration symmetry, teardown, cascade invalidation,
//! at-most-once computation, freeze suppression and required-override
//! dispatch failures through the public API only.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use binding_core::bridge::{ForeignClass, ForeignLazyObject};
use binding_core::patterns::{
    LazyObject, LazyState, Observable, Observed, Observer, Registrations,
};
use binding_core::types::BindingError;
use proptest::prelude::*;

struct Listener {
    registrations: Registrations,
    hits: Cell<u32>,
}

impl Listener {
    fn new() -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Listener>| Listener {
            registrations: Registrations::new(weak.clone()),
            hits: Cell::new(0),
        })
    }
}

impl Observer for Listener {
    fn update(&self) -> Result<(), BindingError> {
        self.hits.set(self.hits.get() + 1);
        Ok(())
    }
}

/// Lazy object computing `upstream + 1`, or `seed + 1` at the head of a chain.
struct Level {
    lazy: LazyState,
    upstream: Option<Rc<Level>>,
    seed: Rc<Cell<f64>>,
    output: Cell<f64>,
}

impl Level {
    fn head(source: &Rc<Observable>, seed: &Rc<Cell<f64>>) -> Rc<Self> {
        let level = Self::build(None, seed);
        level.lazy.registrations().register_with(source);
        level
    }

    fn after(upstream: &Rc<Level>) -> Rc<Self> {
        let level = Self::build(Some(Rc::clone(upstream)), &upstream.seed);
        level
            .lazy
            .registrations()
            .register_with(upstream.lazy.observable());
        level
    }

    fn build(upstream: Option<Rc<Level>>, seed: &Rc<Cell<f64>>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Level>| Level {
            lazy: LazyState::new(weak.clone()),
            upstream,
            seed: Rc::clone(seed),
            output: Cell::new(f64::NAN),
        })
    }

    fn value(&self) -> Result<f64, BindingError> {
        self.calculate()?;
        Ok(self.output.get())
    }
}

impl Observer for Level {
    fn update(&self) -> Result<(), BindingError> {
        self.lazy.update()
    }
}

impl LazyObject for Level {
    fn lazy_state(&self) -> &LazyState {
        &self.lazy
    }

    fn perform_calculations(&self) -> Result<(), BindingError> {
        let base = match &self.upstream {
            Some(level) => level.value()?,
            None => self.seed.get(),
        };
        self.output.set(base + 1.0);
        Ok(())
    }
}

#[test]
fn test_registration_symmetry() {
    let source = Observable::new();
    let listener = Listener::new();

    assert!(listener.registrations.register_with(&source));
    assert!(source.is_observed_by(listener.registrations.id()));
    assert!(listener.registrations.is_registered_with(&source));

    assert!(listener.registrations.unregister_with(&source));
    assert!(!source.is_observed_by(listener.registrations.id()));
    assert!(!listener.registrations.is_registered_with(&source));

    // Unregistering again is a silent no-op.
    assert!(!listener.registrations.unregister_with(&source));
}

#[test]
fn test_teardown_removes_every_registration() {
    let sources: Vec<Rc<Observable>> = (0..4).map(|_| Observable::new()).collect();
    let listener = Listener::new();
    listener.registrations.register_with_all(&sources);
    assert_eq!(listener.registrations.observable_count(), 4);

    drop(listener);
    for source in &sources {
        assert_eq!(source.observer_count(), 0);
        source.notify_observers().unwrap();
    }
}

#[test]
fn test_cascade_invalidation_recomputes_once() {
    let source = Observable::new();
    let seed = Rc::new(Cell::new(1.0));
    let l1 = Level::head(&source, &seed);
    let l2 = Level::after(&l1);

    assert_eq!(l2.value().unwrap(), 3.0);
    assert!(l1.is_calculated());
    assert!(l2.is_calculated());

    seed.set(10.0);
    source.notify_observers().unwrap();
    assert!(!l1.is_calculated());
    assert!(!l2.is_calculated());

    assert_eq!(l2.value().unwrap(), 12.0);
    assert_eq!(l2.lazy_state().calculation_count(), 2);
    assert_eq!(l1.lazy_state().calculation_count(), 2);
}

#[test]
fn test_frozen_object_does_not_cascade() {
    let source = Observable::new();
    let seed = Rc::new(Cell::new(1.0));
    let l1 = Level::head(&source, &seed);
    let l2 = Level::after(&l1);
    l2.value().unwrap();

    l1.freeze();
    seed.set(5.0);
    source.notify_observers().unwrap();
    assert!(l2.is_calculated());

    l1.unfreeze().unwrap();
    assert!(!l2.is_calculated());
    assert_eq!(l2.value().unwrap(), 7.0);
}

#[test]
fn test_missing_required_override_is_reported() {
    let lazy = ForeignLazyObject::builder().build();
    assert_eq!(lazy.missing_overrides(), vec!["performCalculations"]);

    let err = lazy.calculate().unwrap_err();
    assert!(err.is_missing_override());
    assert_eq!(
        err.to_string(),
        "LazyObject::performCalculations is required but was not overridden"
    );
}

#[test]
fn test_failing_observer_does_not_block_others() {
    let source = Observable::new();
    let broken = ForeignLazyObject::builder()
        .perform_calculations(|| Ok(()))
        .update(|_| Err(BindingError::Calculation("boom".to_string())))
        .build();
    let listener = Listener::new();
    broken.lazy_state().registrations().register_with(&source);
    listener.registrations.register_with(&source);

    let err = source.notify_observers().unwrap_err();
    assert_eq!(
        err,
        BindingError::NotificationFailed {
            errors: vec![BindingError::Calculation("boom".to_string())]
        }
    );
    assert_eq!(listener.hits.get(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of register/unregister keeps both sides consistent.
    #[test]
    fn prop_registration_symmetry(ops in prop::collection::vec((0..3usize, 0..4usize, any::<bool>()), 1..64)) {
        let sources: Vec<Rc<Observable>> = (0..4).map(|_| Observable::new()).collect();
        let listeners: Vec<Rc<Listener>> = (0..3).map(|_| Listener::new()).collect();

        for (p, s, register) in ops {
            if register {
                listeners[p].registrations.register_with(&sources[s]);
            } else {
                listeners[p].registrations.unregister_with(&sources[s]);
            }
        }

        for listener in &listeners {
            for source in &sources {
                prop_assert_eq!(
                    listener.registrations.is_registered_with(source),
                    source.is_observed_by(listener.registrations.id())
                );
            }
        }
    }

    /// Each registered observer is notified exactly once per change,
    /// however many times it registered.
    #[test]
    fn prop_one_delivery_per_change(registrations in 1..8usize, changes in 1..16u32) {
        let source = Observable::new();
        let listener = Listener::new();
        for _ in 0..registrations {
            listener.registrations.register_with(&source);
        }
        for _ in 0..changes {
            source.notify_observers().unwrap();
        }
        prop_assert_eq!(listener.hits.get(), changes);
    }

    /// Repeated access without intervening notification computes once.
    #[test]
    fn prop_at_most_once_compute(accesses in 1..50usize, seed in -1.0e6..1.0e6f64) {
        let source = Observable::new();
        let input = Rc::new(Cell::new(seed));
        let level = Level::head(&source, &input);

        for _ in 0..accesses {
            prop_assert_eq!(level.value().unwrap(), seed + 1.0);
        }
        prop_assert_eq!(level.lazy_state().calculation_count(), 1);
    }
}

//! Instruments and pricing engines.
//!
//! An [`Instrument`] is a lazy object wrapping a [`Product`]. Its NPV is
//! computed by a [`PricingEngine`] from the product's arguments and cached
//! until the engine, the engine's market data, or the evaluation date
//! changes.
//!
//! ```text
//! Quote ──▶ Handle ──▶ YieldTermStructure ──▶ Handle ──▶ PricingEngine ──▶ Instrument
//! ```

mod cashflows;
mod foreign;

pub use cashflows::{Cashflow, DiscountingEngine, FixedCashflows};
pub use foreign::{ForeignEngine, ForeignEngineBuilder};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::patterns::{
    LazyObject, LazyState, Observable, Observed, Observer, Settings,
};
use binding_core::types::BindingError;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Results produced by a pricing engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingResults {
    /// Net present value, if the engine computed one
    pub npv: Option<f64>,
    /// Error estimate of the NPV, if available
    pub error_estimate: Option<f64>,
    /// Named by-products of the calculation
    pub additional: BTreeMap<String, f64>,
}

impl PricingResults {
    /// Results holding only an NPV.
    pub fn with_npv(npv: f64) -> Self {
        Self {
            npv: Some(npv),
            ..Default::default()
        }
    }
}

/// Calculates results from a product's arguments.
///
/// Engines are observables: an instrument registers with its engine and is
/// invalidated whenever the engine's market data changes.
///
/// # Required Methods
///
/// - [`calculate`](PricingEngine::calculate)
///
/// # Provided Methods
///
/// - [`reset`](PricingEngine::reset): clear engine-side state before a
///   calculation (no-op by default)
pub trait PricingEngine<A>: Observed {
    /// Price `arguments`.
    ///
    /// # Errors
    ///
    /// Any failure leaves the calling instrument uncalculated.
    fn calculate(&self, arguments: &A) -> Result<PricingResults, BindingError>;

    /// Clear engine-side state before a calculation.
    fn reset(&self) {}
}

/// What an instrument prices.
pub trait Product {
    /// Arguments handed to the pricing engine.
    type Arguments;

    /// Date of the last event of the product.
    fn maturity_date(&self) -> NaiveDate;

    /// Snapshot of the arguments for the engine.
    fn arguments(&self) -> Self::Arguments;
}

/// Whether an event on `event_date` has already happened as of `reference`.
///
/// With `include_reference_date_events`, an event on the reference date
/// still counts as pending.
pub fn has_occurred(
    event_date: NaiveDate,
    reference: NaiveDate,
    include_reference_date_events: bool,
) -> bool {
    if include_reference_date_events {
        event_date < reference
    } else {
        event_date <= reference
    }
}

type EngineRef<P> = Rc<dyn PricingEngine<<P as Product>::Arguments>>;

/// A priced product.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use chrono::NaiveDate;
/// use binding_core::patterns::{Handle, Settings};
/// use binding_models::instruments::{Cashflow, DiscountingEngine, FixedCashflows, Instrument};
/// use binding_models::term_structures::{FlatForward, YieldTermStructure};
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let settings = Settings::new();
/// settings.set_evaluation_date(today).unwrap();
///
/// let curve: Rc<dyn YieldTermStructure> = FlatForward::with_rate(today, 0.0);
/// let engine = DiscountingEngine::new(Handle::new(curve), &settings);
/// let bond = Instrument::new(
///     FixedCashflows::new(vec![Cashflow::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 100.0)]),
///     &settings,
/// );
/// bond.set_pricing_engine(engine).unwrap();
/// assert!((bond.npv().unwrap() - 100.0).abs() < 1e-12);
/// ```
pub struct Instrument<P: Product> {
    lazy: LazyState,
    product: P,
    settings: Rc<Settings>,
    engine: RefCell<Option<EngineRef<P>>>,
    results: RefCell<PricingResults>,
}

impl<P: Product> fmt::Debug for Instrument<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("lazy", &self.lazy)
            .field("has_engine", &self.engine.borrow().is_some())
            .field("results", &*self.results.borrow())
            .finish()
    }
}

impl<P> Instrument<P>
where
    P: Product + 'static,
    P::Arguments: 'static,
{
    /// Instrument on `product`, with no engine yet.
    ///
    /// The instrument observes the session's evaluation date, since expiry
    /// depends on it.
    pub fn new(product: P, settings: &Rc<Settings>) -> Rc<Self> {
        let instrument = Rc::new_cyclic(|weak: &Weak<Instrument<P>>| Instrument {
            lazy: LazyState::with_gate(weak.clone(), settings.gate()),
            product,
            settings: Rc::clone(settings),
            engine: RefCell::new(None),
            results: RefCell::new(PricingResults::default()),
        });
        settings.apply_to(&instrument.lazy);
        instrument
            .lazy
            .registrations()
            .register_with(settings.evaluation_date_value().observable());
        instrument
    }

    /// The priced product.
    pub fn product(&self) -> &P {
        &self.product
    }

    /// Replace the engine, re-wire registrations and invalidate.
    ///
    /// # Errors
    ///
    /// Propagates downstream notification failures.
    pub fn set_pricing_engine(&self, engine: EngineRef<P>) -> Result<(), BindingError> {
        let previous = self.engine.borrow_mut().take();
        if let Some(previous) = previous {
            self.lazy.registrations().unregister_with(previous.observable());
        }
        self.lazy.registrations().register_with(engine.observable());
        *self.engine.borrow_mut() = Some(engine);
        debug!(observer = %self.lazy.registrations().id(), "pricing engine set");
        self.lazy.update()
    }

    /// Whether the product's last event has occurred as of the evaluation
    /// date.
    pub fn is_expired(&self) -> bool {
        has_occurred(
            self.product.maturity_date(),
            self.settings.evaluation_date(),
            self.settings.include_reference_date_events(),
        )
    }

    /// Net present value.
    ///
    /// # Errors
    ///
    /// Fails when no engine is set, the engine fails, or the engine did not
    /// provide an NPV.
    pub fn npv(&self) -> Result<f64, BindingError> {
        self.calculate()?;
        self.results
            .borrow()
            .npv
            .ok_or_else(|| BindingError::Calculation("NPV not provided".to_string()))
    }

    /// Error estimate of the NPV.
    ///
    /// # Errors
    ///
    /// Fails when the calculation fails or no estimate was provided.
    pub fn error_estimate(&self) -> Result<f64, BindingError> {
        self.calculate()?;
        self.results
            .borrow()
            .error_estimate
            .ok_or_else(|| BindingError::Calculation("error estimate not provided".to_string()))
    }

    /// A named by-product of the calculation.
    ///
    /// # Errors
    ///
    /// Fails when the calculation fails or `name` was not provided.
    pub fn result(&self, name: &str) -> Result<f64, BindingError> {
        self.calculate()?;
        self.results
            .borrow()
            .additional
            .get(name)
            .copied()
            .ok_or_else(|| BindingError::Calculation(format!("{name} not provided")))
    }
}

impl<P> Observer for Instrument<P>
where
    P: Product + 'static,
    P::Arguments: 'static,
{
    fn update(&self) -> Result<(), BindingError> {
        self.lazy.update()
    }
}

impl<P> LazyObject for Instrument<P>
where
    P: Product + 'static,
    P::Arguments: 'static,
{
    fn lazy_state(&self) -> &LazyState {
        &self.lazy
    }

    fn perform_calculations(&self) -> Result<(), BindingError> {
        if self.is_expired() {
            info!(observer = %self.lazy.registrations().id(), "instrument expired");
            *self.results.borrow_mut() = PricingResults {
                npv: Some(0.0),
                error_estimate: Some(0.0),
                additional: BTreeMap::new(),
            };
            return Ok(());
        }

        let engine = self
            .engine
            .borrow()
            .clone()
            .ok_or_else(|| BindingError::Calculation("null pricing engine".to_string()))?;
        engine.reset();
        let results = engine.calculate(&self.product.arguments())?;
        *self.results.borrow_mut() = results;
        Ok(())
    }
}

impl<P: Product> Observed for Instrument<P> {
    fn observable(&self) -> &Rc<Observable> {
        self.lazy.observable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Deposit {
        maturity: NaiveDate,
        amount: f64,
    }

    impl Product for Deposit {
        type Arguments = f64;

        fn maturity_date(&self) -> NaiveDate {
            self.maturity
        }

        fn arguments(&self) -> f64 {
            self.amount
        }
    }

    /// Engine returning the amount times a settable factor.
    struct Scaling {
        observable: Rc<Observable>,
        factor: Cell<f64>,
        calls: Cell<u32>,
        resets: Cell<u32>,
    }

    impl Scaling {
        fn new(factor: f64) -> Rc<Self> {
            Rc::new(Self {
                observable: Observable::new(),
                factor: Cell::new(factor),
                calls: Cell::new(0),
                resets: Cell::new(0),
            })
        }

        fn set_factor(&self, factor: f64) {
            self.factor.set(factor);
            self.observable.notify_observers().unwrap();
        }
    }

    impl Observed for Scaling {
        fn observable(&self) -> &Rc<Observable> {
            &self.observable
        }
    }

    impl PricingEngine<f64> for Scaling {
        fn calculate(&self, amount: &f64) -> Result<PricingResults, BindingError> {
            self.calls.set(self.calls.get() + 1);
            let mut results = PricingResults::with_npv(amount * self.factor.get());
            results.additional.insert("factor".to_string(), self.factor.get());
            Ok(results)
        }

        fn reset(&self) {
            self.resets.set(self.resets.get() + 1);
        }
    }

    fn session(today: NaiveDate) -> Rc<Settings> {
        let settings = Settings::new();
        settings.set_evaluation_date(today).unwrap();
        settings
    }

    #[test]
    fn test_npv_cached_until_engine_changes() {
        let settings = session(date(2024, 1, 1));
        let engine = Scaling::new(0.9);
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2025, 1, 1),
                amount: 100.0,
            },
            &settings,
        );
        deposit.set_pricing_engine(engine.clone()).unwrap();

        assert_relative_eq!(deposit.npv().unwrap(), 90.0);
        assert_relative_eq!(deposit.npv().unwrap(), 90.0);
        assert_eq!(engine.calls.get(), 1);
        assert_eq!(engine.resets.get(), 1);

        engine.set_factor(0.8);
        assert!(!deposit.is_calculated());
        assert_relative_eq!(deposit.npv().unwrap(), 80.0);
        assert_relative_eq!(deposit.result("factor").unwrap(), 0.8);
        assert_eq!(engine.calls.get(), 2);
    }

    #[test]
    fn test_missing_engine() {
        let settings = session(date(2024, 1, 1));
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2025, 1, 1),
                amount: 100.0,
            },
            &settings,
        );
        assert_eq!(
            deposit.npv().unwrap_err(),
            BindingError::Calculation("null pricing engine".to_string())
        );
    }

    #[test]
    fn test_expired_instrument_skips_engine() {
        let settings = session(date(2024, 1, 1));
        let engine = Scaling::new(0.9);
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2024, 1, 1),
                amount: 100.0,
            },
            &settings,
        );
        deposit.set_pricing_engine(engine.clone()).unwrap();

        assert!(deposit.is_expired());
        assert_eq!(deposit.npv().unwrap(), 0.0);
        assert_eq!(deposit.error_estimate().unwrap(), 0.0);
        assert_eq!(engine.calls.get(), 0);

        // Counting reference-date events as pending revives it.
        settings.set_include_reference_date_events(true);
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        assert!(!deposit.is_expired());
        assert_relative_eq!(deposit.npv().unwrap(), 90.0);
    }

    #[test]
    fn test_evaluation_date_change_invalidates() {
        let settings = session(date(2024, 1, 1));
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2024, 6, 1),
                amount: 100.0,
            },
            &settings,
        );
        deposit.set_pricing_engine(Scaling::new(1.0)).unwrap();
        assert_relative_eq!(deposit.npv().unwrap(), 100.0);

        settings.set_evaluation_date(date(2024, 7, 1)).unwrap();
        assert!(!deposit.is_calculated());
        assert_eq!(deposit.npv().unwrap(), 0.0);
    }

    #[test]
    fn test_replacing_engine_unregisters_previous() {
        let settings = session(date(2024, 1, 1));
        let first = Scaling::new(1.0);
        let second = Scaling::new(2.0);
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2025, 1, 1),
                amount: 10.0,
            },
            &settings,
        );
        deposit.set_pricing_engine(first.clone()).unwrap();
        deposit.set_pricing_engine(second.clone()).unwrap();
        assert_eq!(first.observable.observer_count(), 0);
        assert_relative_eq!(deposit.npv().unwrap(), 20.0);

        first.set_factor(3.0);
        assert!(deposit.is_calculated());
    }

    #[test]
    fn test_missing_npv_and_named_result() {
        struct Silent(Rc<Observable>);
        impl Observed for Silent {
            fn observable(&self) -> &Rc<Observable> {
                &self.0
            }
        }
        impl PricingEngine<f64> for Silent {
            fn calculate(&self, _: &f64) -> Result<PricingResults, BindingError> {
                Ok(PricingResults::default())
            }
        }

        let settings = session(date(2024, 1, 1));
        let deposit = Instrument::new(
            Deposit {
                maturity: date(2025, 1, 1),
                amount: 1.0,
            },
            &settings,
        );
        deposit
            .set_pricing_engine(Rc::new(Silent(Observable::new())))
            .unwrap();
        assert!(matches!(deposit.npv(), Err(BindingError::Calculation(_))));
        assert!(deposit.result("delta").is_err());
        assert!(deposit.is_calculated());
    }

    #[test]
    fn test_has_occurred() {
        let d = date(2024, 1, 1);
        assert!(has_occurred(d, d, false));
        assert!(!has_occurred(d, d, true));
        assert!(has_occurred(d, date(2024, 1, 2), true));
        assert!(!has_occurred(date(2024, 1, 2), d, false));
    }
}

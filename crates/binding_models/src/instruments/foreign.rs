use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::patterns::{Observable, Observed, Observer, Registrations};
use binding_core::types::BindingError;

use super::{PricingEngine, PricingResults};

type CalculateFn<A> = dyn Fn(&A) -> Result<PricingResults, BindingError>;
type ResetFn = dyn Fn();

/// A pricing engine implemented by foreign code.
///
/// Like any engine it observes its market data: whatever the builder was
/// told to [`observe`](ForeignEngineBuilder::observe) forwards its
/// notifications to the engine's dependents.
pub struct ForeignEngine<A> {
    registrations: Registrations,
    observable: Rc<Observable>,
    calculate: Override<CalculateFn<A>>,
    reset: Override<ResetFn>,
}

impl<A> fmt::Debug for ForeignEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignEngine")
            .field("registrations", &self.registrations)
            .field("observable", &self.observable.id())
            .field("calculate", &self.calculate)
            .field("reset", &self.reset)
            .finish()
    }
}

impl<A: 'static> ForeignEngine<A> {
    /// Start describing a foreign engine.
    pub fn builder() -> ForeignEngineBuilder<A> {
        ForeignEngineBuilder {
            calculate: Override::new(Self::CLASS, "calculate"),
            reset: Override::new(Self::CLASS, "reset"),
            observed: Vec::new(),
        }
    }

    /// Observer-side registrations, for wiring done after construction.
    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }
}

impl<A: 'static> Observer for ForeignEngine<A> {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl<A> Observed for ForeignEngine<A> {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl<A: 'static> PricingEngine<A> for ForeignEngine<A> {
    fn calculate(&self, arguments: &A) -> Result<PricingResults, BindingError> {
        (self.calculate.required()?)(arguments)
    }

    fn reset(&self) {
        if let Some(f) = self.reset.get() {
            f();
        }
    }
}

impl<A: 'static> ForeignClass for ForeignEngine<A> {
    const CLASS: &'static str = "PricingEngine";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("calculate"),
        MethodSpec::defaulted("reset"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "calculate" => self.calculate.is_overridden(),
            "reset" => self.reset.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignEngine`].
pub struct ForeignEngineBuilder<A> {
    calculate: Override<CalculateFn<A>>,
    reset: Override<ResetFn>,
    observed: Vec<Rc<Observable>>,
}

impl<A: 'static> ForeignEngineBuilder<A> {
    /// Override `calculate`.
    pub fn calculate(
        mut self,
        f: impl Fn(&A) -> Result<PricingResults, BindingError> + 'static,
    ) -> Self {
        self.calculate.set(Box::new(f));
        self
    }

    /// Override `reset`.
    pub fn reset(mut self, f: impl Fn() + 'static) -> Self {
        self.reset.set(Box::new(f));
        self
    }

    /// Register the engine with `target` once built.
    pub fn observe<T: Observed + ?Sized>(mut self, target: &T) -> Self {
        self.observed.push(Rc::clone(target.observable()));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignEngine<A>> {
        let Self {
            calculate,
            reset,
            observed,
        } = self;
        let engine = Rc::new_cyclic(|weak: &Weak<ForeignEngine<A>>| ForeignEngine {
            registrations: Registrations::new(weak.clone()),
            observable: Observable::new(),
            calculate,
            reset,
        });
        engine.registrations.register_with_all(&observed);
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{Cashflow, FixedCashflows, Instrument};
    use crate::quotes::{Quote, SimpleQuote};
    use binding_core::patterns::{Handle, LazyObject, Settings};
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instrument(settings: &Rc<Settings>) -> Rc<Instrument<FixedCashflows>> {
        Instrument::new(
            FixedCashflows::new(vec![Cashflow::new(date(2030, 1, 1), 50.0)]),
            settings,
        )
    }

    #[test]
    fn test_instrument_calls_foreign_calculate() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let resets = Rc::new(Cell::new(0));
        let counter = Rc::clone(&resets);
        let engine = ForeignEngine::<Vec<Cashflow>>::builder()
            .calculate(|cfs: &Vec<Cashflow>| {
                Ok(PricingResults::with_npv(cfs.iter().map(|cf| cf.amount).sum()))
            })
            .reset(move || counter.set(counter.get() + 1))
            .build();
        let trade = instrument(&settings);
        trade.set_pricing_engine(engine.clone()).unwrap();

        assert_eq!(trade.npv().unwrap(), 50.0);
        assert_eq!(resets.get(), 1);

        engine.observable().notify_observers().unwrap();
        assert!(!trade.is_calculated());
        trade.npv().unwrap();
        assert_eq!(resets.get(), 2);
    }

    #[test]
    fn test_observed_quote_change_reaches_instrument() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let spot = SimpleQuote::new(2.0);
        let quote = Handle::new(spot.clone() as Rc<dyn Quote>);
        let engine = {
            let link = quote.clone();
            ForeignEngine::<Vec<Cashflow>>::builder()
                .calculate(move |cfs: &Vec<Cashflow>| {
                    let scale = link.current_link()?.value()?;
                    Ok(PricingResults::with_npv(
                        scale * cfs.iter().map(|cf| cf.amount).sum::<f64>(),
                    ))
                })
                .observe(&quote)
                .build()
        };
        assert!(engine.registrations().is_registered_with(quote.observable()));

        let trade = instrument(&settings);
        trade.set_pricing_engine(engine).unwrap();
        assert_eq!(trade.npv().unwrap(), 100.0);

        spot.set_value(3.0).unwrap();
        assert!(!trade.is_calculated());
        assert_eq!(trade.npv().unwrap(), 150.0);
        assert_eq!(trade.lazy_state().calculation_count(), 2);
    }

    #[test]
    fn test_dropping_engine_unregisters_from_market_data() {
        let spot = SimpleQuote::new(1.0);
        let engine = ForeignEngine::<Vec<Cashflow>>::builder()
            .observe(&*spot)
            .build();
        assert_eq!(spot.observable().observer_count(), 1);
        drop(engine);
        assert_eq!(spot.observable().observer_count(), 0);
    }

    #[test]
    fn test_missing_calculate_surfaces_through_instrument() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let engine = ForeignEngine::<Vec<Cashflow>>::builder().build();
        assert_eq!(engine.missing_overrides(), vec!["calculate"]);

        let trade = instrument(&settings);
        trade.set_pricing_engine(engine).unwrap();
        let err = trade.npv().unwrap_err();
        assert_eq!(
            err,
            BindingError::MissingOverride {
                class: "PricingEngine",
                method: "calculate"
            }
        );
        assert!(!trade.is_calculated());
    }
}

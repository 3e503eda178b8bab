//! Fixed cash flow products and their discounting engine.

use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::patterns::{Handle, Observable, Observed, Observer, Registrations, Settings};
use binding_core::types::BindingError;
use chrono::NaiveDate;
use tracing::trace;

use super::{has_occurred, PricingEngine, PricingResults, Product};
use crate::term_structures::YieldTermStructure;

/// A single known payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cashflow {
    /// Payment date
    pub date: NaiveDate,
    /// Amount paid
    pub amount: f64,
}

impl Cashflow {
    /// Payment of `amount` on `date`.
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

/// A strip of known payments.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCashflows {
    cashflows: Vec<Cashflow>,
}

impl FixedCashflows {
    /// Product paying `cashflows`.
    pub fn new(cashflows: Vec<Cashflow>) -> Self {
        Self { cashflows }
    }

    /// The payments.
    pub fn cashflows(&self) -> &[Cashflow] {
        &self.cashflows
    }
}

impl Product for FixedCashflows {
    type Arguments = Vec<Cashflow>;

    /// Last payment date; an empty strip is always expired.
    fn maturity_date(&self) -> NaiveDate {
        self.cashflows
            .iter()
            .map(|cf| cf.date)
            .max()
            .unwrap_or(NaiveDate::MIN)
    }

    fn arguments(&self) -> Vec<Cashflow> {
        self.cashflows.clone()
    }
}

/// Discounts pending cash flows on a yield curve.
///
/// Forwards every notification of its curve handle, so instruments using it
/// are invalidated when the curve (or the quote behind it) changes.
pub struct DiscountingEngine {
    registrations: Registrations,
    observable: Rc<Observable>,
    curve: Handle<dyn YieldTermStructure>,
    settings: Rc<Settings>,
}

impl fmt::Debug for DiscountingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscountingEngine")
            .field("observable", &self.observable.id())
            .field("curve", &self.curve)
            .finish()
    }
}

impl DiscountingEngine {
    /// Engine discounting on `curve`.
    pub fn new(curve: Handle<dyn YieldTermStructure>, settings: &Rc<Settings>) -> Rc<Self> {
        let engine = Rc::new_cyclic(|weak: &Weak<DiscountingEngine>| DiscountingEngine {
            registrations: Registrations::new(weak.clone()),
            observable: Observable::with_gate(settings.gate()),
            curve,
            settings: Rc::clone(settings),
        });
        engine
            .registrations
            .register_with(engine.curve.observable());
        engine
    }

    /// The curve handle.
    pub fn curve(&self) -> &Handle<dyn YieldTermStructure> {
        &self.curve
    }
}

impl Observer for DiscountingEngine {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl Observed for DiscountingEngine {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl PricingEngine<Vec<Cashflow>> for DiscountingEngine {
    fn calculate(&self, cashflows: &Vec<Cashflow>) -> Result<PricingResults, BindingError> {
        let curve = self.curve.current_link()?;
        let reference = curve.reference_date()?;
        let include = self.settings.include_reference_date_events();

        let mut npv = 0.0;
        let mut pending = 0usize;
        for cf in cashflows {
            if has_occurred(cf.date, reference, include) {
                continue;
            }
            npv += cf.amount * curve.discount_date(cf.date)?;
            pending += 1;
        }
        trace!(npv, pending, "cash flows discounted");

        let mut results = PricingResults::with_npv(npv);
        results
            .additional
            .insert("pending_cashflows".to_string(), pending as f64);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::Instrument;
    use crate::quotes::{Quote, SimpleQuote};
    use crate::term_structures::FlatForward;
    use approx::assert_relative_eq;
    use binding_core::patterns::{LazyObject, RelinkableHandle};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bond() -> FixedCashflows {
        FixedCashflows::new(vec![
            Cashflow::new(date(2024, 1, 1), 5.0),
            Cashflow::new(date(2025, 1, 1), 5.0),
            Cashflow::new(date(2026, 1, 1), 105.0),
        ])
    }

    #[test]
    fn test_maturity_date() {
        assert_eq!(bond().maturity_date(), date(2026, 1, 1));
        assert_eq!(FixedCashflows::new(vec![]).maturity_date(), NaiveDate::MIN);
    }

    #[test]
    fn test_past_cashflows_excluded() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let curve: Rc<dyn YieldTermStructure> = FlatForward::with_rate(date(2024, 1, 1), 0.0);
        let engine = DiscountingEngine::new(Handle::new(curve), &settings);

        let results = engine.calculate(&bond().arguments()).unwrap();
        assert_relative_eq!(results.npv.unwrap(), 110.0);
        assert_eq!(results.additional["pending_cashflows"], 2.0);

        settings.set_include_reference_date_events(true);
        let results = engine.calculate(&bond().arguments()).unwrap();
        assert_relative_eq!(results.npv.unwrap(), 115.0);
    }

    #[test]
    fn test_curve_relink_reprices_instrument() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let low: Rc<dyn YieldTermStructure> = FlatForward::with_rate(date(2024, 1, 1), 0.01);
        let high: Rc<dyn YieldTermStructure> = FlatForward::with_rate(date(2024, 1, 1), 0.10);
        let curve = RelinkableHandle::new(Some(low));
        let engine = DiscountingEngine::new(curve.handle(), &settings);
        let instrument = Instrument::new(bond(), &settings);
        instrument.set_pricing_engine(engine).unwrap();

        let npv_low = instrument.npv().unwrap();
        curve.link_to(Some(high)).unwrap();
        assert!(!instrument.is_calculated());
        let npv_high = instrument.npv().unwrap();
        assert!(npv_high < npv_low);
    }

    #[test]
    fn test_quote_change_reaches_instrument() {
        let settings = Settings::new();
        settings.set_evaluation_date(date(2024, 1, 1)).unwrap();
        let rate = SimpleQuote::new(0.03);
        let curve: Rc<dyn YieldTermStructure> =
            FlatForward::new(date(2024, 1, 1), Handle::new(rate.clone() as Rc<dyn Quote>));
        let instrument = Instrument::new(bond(), &settings);
        instrument
            .set_pricing_engine(DiscountingEngine::new(Handle::new(curve), &settings))
            .unwrap();

        let before = instrument.npv().unwrap();
        rate.set_value(0.0).unwrap();
        assert!(!instrument.is_calculated());
        assert_relative_eq!(instrument.npv().unwrap(), 110.0);
        assert!(before < 110.0);
    }
}

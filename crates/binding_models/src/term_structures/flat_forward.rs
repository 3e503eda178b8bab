use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::patterns::{
    Handle, LazyObject, LazyState, Observable, Observed, Observer, Settings,
};
use binding_core::types::BindingError;
use chrono::{Duration, NaiveDate};
use tracing::debug;

use super::{YieldCurve, YieldTermStructure};
use crate::error::MarketDataError;
use crate::quotes::{Quote, SimpleQuote};

enum ReferenceDate {
    Fixed(NaiveDate),
    Moving {
        settings: Rc<Settings>,
        settlement_days: i64,
    },
}

/// Flat continuously compounded forward curve.
///
/// The rate is read from a quote handle and cached; the curve is invalidated
/// whenever the quote (or, for a moving curve, the evaluation date) changes
/// and re-reads the quote on the next query.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use chrono::NaiveDate;
/// use binding_core::patterns::Handle;
/// use binding_models::quotes::{Quote, SimpleQuote};
/// use binding_models::term_structures::{FlatForward, YieldCurve};
///
/// let rate = SimpleQuote::new(0.05);
/// let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
/// let curve = FlatForward::new(today, Handle::new(rate.clone() as Rc<dyn Quote>));
///
/// assert!((curve.discount_factor(1.0).unwrap() - (-0.05_f64).exp()).abs() < 1e-12);
/// rate.set_value(0.04).unwrap();
/// assert!((curve.discount_factor(1.0).unwrap() - (-0.04_f64).exp()).abs() < 1e-12);
/// ```
pub struct FlatForward {
    lazy: LazyState,
    reference: ReferenceDate,
    forward: Handle<dyn Quote>,
    rate: Cell<f64>,
}

impl fmt::Debug for FlatForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reference = match &self.reference {
            ReferenceDate::Fixed(date) => format!("fixed {date}"),
            ReferenceDate::Moving {
                settlement_days, ..
            } => format!("moving +{settlement_days}d"),
        };
        f.debug_struct("FlatForward")
            .field("lazy", &self.lazy)
            .field("reference", &reference)
            .field("forward", &self.forward)
            .finish()
    }
}

impl FlatForward {
    /// Curve with a fixed reference date.
    pub fn new(reference_date: NaiveDate, forward: Handle<dyn Quote>) -> Rc<Self> {
        let curve = Rc::new_cyclic(|weak: &Weak<FlatForward>| FlatForward {
            lazy: LazyState::new(weak.clone()),
            reference: ReferenceDate::Fixed(reference_date),
            forward,
            rate: Cell::new(f64::NAN),
        });
        curve
            .lazy
            .registrations()
            .register_with(curve.forward.observable());
        curve
    }

    /// Curve with a fixed reference date and a constant rate.
    pub fn with_rate(reference_date: NaiveDate, rate: f64) -> Rc<Self> {
        let quote: Rc<dyn Quote> = SimpleQuote::new(rate);
        Self::new(reference_date, Handle::new(quote))
    }

    /// Curve whose reference date is `settlement_days` after the session's
    /// evaluation date and moves with it.
    pub fn moving(
        settings: &Rc<Settings>,
        settlement_days: i64,
        forward: Handle<dyn Quote>,
    ) -> Rc<Self> {
        let curve = Rc::new_cyclic(|weak: &Weak<FlatForward>| FlatForward {
            lazy: LazyState::with_gate(weak.clone(), settings.gate()),
            reference: ReferenceDate::Moving {
                settings: Rc::clone(settings),
                settlement_days,
            },
            forward,
            rate: Cell::new(f64::NAN),
        });
        settings.apply_to(&curve.lazy);
        curve.lazy.registrations().register_with_all([
            curve.forward.observable(),
            settings.evaluation_date_value().observable(),
        ]);
        curve
    }

    /// The cached forward rate, refreshed from the quote if stale.
    ///
    /// # Errors
    ///
    /// Fails when the quote handle is empty or the quote has no value.
    pub fn rate(&self) -> Result<f64, BindingError> {
        self.calculate()?;
        Ok(self.rate.get())
    }
}

impl Observer for FlatForward {
    fn update(&self) -> Result<(), BindingError> {
        self.lazy.update()
    }
}

impl LazyObject for FlatForward {
    fn lazy_state(&self) -> &LazyState {
        &self.lazy
    }

    fn perform_calculations(&self) -> Result<(), BindingError> {
        let rate = self.forward.current_link()?.value()?;
        debug!(observable = %self.lazy.observable().id(), rate, "flat forward rate refreshed");
        self.rate.set(rate);
        Ok(())
    }
}

impl Observed for FlatForward {
    fn observable(&self) -> &Rc<Observable> {
        self.lazy.observable()
    }
}

impl YieldCurve<f64> for FlatForward {
    fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError> {
        if t < 0.0 {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        let rate = self.rate()?;
        Ok((-rate * t).exp())
    }

    fn zero_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        if t < 0.0 {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        Ok(self.rate()?)
    }
}

impl YieldTermStructure for FlatForward {
    fn reference_date(&self) -> Result<NaiveDate, BindingError> {
        match &self.reference {
            ReferenceDate::Fixed(date) => Ok(*date),
            ReferenceDate::Moving {
                settings,
                settlement_days,
            } => Ok(settings.evaluation_date() + Duration::days(*settlement_days)),
        }
    }
}

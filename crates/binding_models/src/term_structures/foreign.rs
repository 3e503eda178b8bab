use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::patterns::{Observable, Observed, Observer, Registrations};
use binding_core::types::BindingError;
use chrono::NaiveDate;

use super::{implied_zero_rate, YieldCurve, YieldTermStructure};
use crate::error::MarketDataError;

type ReferenceDateFn = dyn Fn() -> Result<NaiveDate, BindingError>;
type DiscountFn = dyn Fn(f64) -> Result<f64, BindingError>;
type ZeroRateFn = dyn Fn(f64) -> Result<f64, BindingError>;

/// A yield term structure implemented by foreign code.
///
/// `referenceDate` and `discount` are required; `zeroRate` defaults to the
/// rate implied by `discount`. Notifications from whatever the builder was
/// told to [`observe`](ForeignYieldCurveBuilder::observe) are forwarded to
/// the curve's dependents.
pub struct ForeignYieldCurve {
    registrations: Registrations,
    observable: Rc<Observable>,
    reference_date: Override<ReferenceDateFn>,
    discount: Override<DiscountFn>,
    zero_rate: Override<ZeroRateFn>,
}

impl fmt::Debug for ForeignYieldCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignYieldCurve")
            .field("registrations", &self.registrations)
            .field("observable", &self.observable.id())
            .field("reference_date", &self.reference_date)
            .field("discount", &self.discount)
            .field("zero_rate", &self.zero_rate)
            .finish()
    }
}

impl ForeignYieldCurve {
    /// Start describing a foreign curve.
    pub fn builder() -> ForeignYieldCurveBuilder {
        ForeignYieldCurveBuilder {
            reference_date: Override::new(Self::CLASS, "referenceDate"),
            discount: Override::new(Self::CLASS, "discount"),
            zero_rate: Override::new(Self::CLASS, "zeroRate"),
            observed: Vec::new(),
        }
    }

    /// Observer-side registrations.
    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }
}

impl Observer for ForeignYieldCurve {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl Observed for ForeignYieldCurve {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl YieldCurve<f64> for ForeignYieldCurve {
    fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError> {
        if t < 0.0 {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        Ok((self.discount.required()?)(t)?)
    }

    fn zero_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        match self.zero_rate.get() {
            Some(f) => Ok(f(t)?),
            None => implied_zero_rate(self.discount_factor(t)?, t),
        }
    }
}

impl YieldTermStructure for ForeignYieldCurve {
    fn reference_date(&self) -> Result<NaiveDate, BindingError> {
        (self.reference_date.required()?)()
    }
}

impl ForeignClass for ForeignYieldCurve {
    const CLASS: &'static str = "YieldTermStructure";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("referenceDate"),
        MethodSpec::required("discount"),
        MethodSpec::defaulted("zeroRate"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "referenceDate" => self.reference_date.is_overridden(),
            "discount" => self.discount.is_overridden(),
            "zeroRate" => self.zero_rate.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignYieldCurve`].
pub struct ForeignYieldCurveBuilder {
    reference_date: Override<ReferenceDateFn>,
    discount: Override<DiscountFn>,
    zero_rate: Override<ZeroRateFn>,
    observed: Vec<Rc<Observable>>,
}

impl ForeignYieldCurveBuilder {
    /// Override `referenceDate`.
    pub fn reference_date(
        mut self,
        f: impl Fn() -> Result<NaiveDate, BindingError> + 'static,
    ) -> Self {
        self.reference_date.set(Box::new(f));
        self
    }

    /// Override `discount`.
    pub fn discount(mut self, f: impl Fn(f64) -> Result<f64, BindingError> + 'static) -> Self {
        self.discount.set(Box::new(f));
        self
    }

    /// Override `zeroRate`.
    pub fn zero_rate(mut self, f: impl Fn(f64) -> Result<f64, BindingError> + 'static) -> Self {
        self.zero_rate.set(Box::new(f));
        self
    }

    /// Register the curve with `target` once built.
    pub fn observe<T: Observed + ?Sized>(mut self, target: &T) -> Self {
        self.observed.push(Rc::clone(target.observable()));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignYieldCurve> {
        let Self {
            reference_date,
            discount,
            zero_rate,
            observed,
        } = self;
        let curve = Rc::new_cyclic(|weak: &Weak<ForeignYieldCurve>| ForeignYieldCurve {
            registrations: Registrations::new(weak.clone()),
            observable: Observable::new(),
            reference_date,
            discount,
            zero_rate,
        });
        curve.registrations.register_with_all(&observed);
        curve
    }
}

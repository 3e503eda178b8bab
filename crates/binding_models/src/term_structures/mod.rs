//! Yield term structures.
//!
//! [`YieldCurve`] is the numeric contract (discount factors and implied
//! rates by time). [`YieldTermStructure`] adds what the graph needs: an
//! observable, a reference date, and conversion from dates to times.
//!
//! - [`FlatForward`]: lazy curve driven by a rate quote
//! - [`ForeignYieldCurve`]: discount factors supplied by foreign code

mod flat_forward;
mod foreign;

pub use flat_forward::FlatForward;
pub use foreign::{ForeignYieldCurve, ForeignYieldCurveBuilder};

use binding_core::patterns::Observed;
use binding_core::types::BindingError;
use chrono::NaiveDate;
use num_traits::Float;

use crate::error::MarketDataError;

/// Days per year of the Actual/365 (Fixed) convention.
const DAYS_PER_YEAR: f64 = 365.0;

/// Generic yield curve trait for discount factor and rate calculations.
///
/// # Contract
///
/// - `discount_factor(t)` returns the discount factor D(t) for maturity t
/// - `zero_rate(t)` returns the continuously compounded zero rate r(t)
/// - `forward_rate(t1, t2)` returns the forward rate between t1 and t2
///
/// # Invariants
///
/// - D(0) = 1
/// - D(t) > 0 for all t >= 0
///
/// # Example
///
/// ```
/// use binding_models::error::MarketDataError;
/// use binding_models::term_structures::YieldCurve;
///
/// struct Flat(f64);
///
/// impl YieldCurve<f64> for Flat {
///     fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError> {
///         Ok((-self.0 * t).exp())
///     }
/// }
///
/// let curve = Flat(0.05);
/// assert!((curve.zero_rate(1.0).unwrap() - 0.05).abs() < 1e-12);
/// assert!((curve.forward_rate(1.0, 2.0).unwrap() - 0.05).abs() < 1e-12);
/// ```
pub trait YieldCurve<T: Float> {
    /// Return the discount factor for maturity `t`.
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidMaturity` if t < 0.
    fn discount_factor(&self, t: T) -> Result<T, MarketDataError>;

    /// Return the continuously compounded zero rate for maturity `t`.
    ///
    /// ```text
    /// r(t) = -ln(D(t)) / t
    /// ```
    fn zero_rate(&self, t: T) -> Result<T, MarketDataError> {
        implied_zero_rate(self.discount_factor(t)?, t)
    }

    /// Return the forward rate between t1 and t2.
    ///
    /// ```text
    /// f(t1, t2) = -ln(D(t2) / D(t1)) / (t2 - t1)
    /// ```
    fn forward_rate(&self, t1: T, t2: T) -> Result<T, MarketDataError> {
        let df1 = self.discount_factor(t1)?;
        let df2 = self.discount_factor(t2)?;
        implied_forward_rate(df1, df2, t2 - t1)
    }
}

/// Zero rate implied by discount factor `df` at time `t`.
///
/// # Errors
///
/// `MarketDataError::InvalidMaturity` if t <= 0.
pub fn implied_zero_rate<T: Float>(df: T, t: T) -> Result<T, MarketDataError> {
    if t <= T::zero() {
        return Err(MarketDataError::InvalidMaturity {
            t: t.to_f64().unwrap_or(0.0),
        });
    }
    Ok(-df.ln() / t)
}

/// Forward rate implied by discount factors `df1`, `df2` over `dt`.
///
/// # Errors
///
/// `MarketDataError::InvalidMaturity` if dt <= 0.
pub fn implied_forward_rate<T: Float>(df1: T, df2: T, dt: T) -> Result<T, MarketDataError> {
    if dt <= T::zero() {
        return Err(MarketDataError::InvalidMaturity {
            t: dt.to_f64().unwrap_or(0.0),
        });
    }
    Ok(-(df2 / df1).ln() / dt)
}

/// Year fraction between two dates under Actual/365 (Fixed).
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// A yield curve that lives in the notification graph.
///
/// Dependents observe it through a `Handle<dyn YieldTermStructure>`.
pub trait YieldTermStructure: Observed + YieldCurve<f64> {
    /// Date at which discount factors equal one.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn reference_date(&self) -> Result<NaiveDate, BindingError>;

    /// Time from the reference date to `date`, Actual/365 (Fixed).
    ///
    /// # Errors
    ///
    /// Propagates `reference_date` failures.
    fn time_from_reference(&self, date: NaiveDate) -> Result<f64, BindingError> {
        Ok(year_fraction(self.reference_date()?, date))
    }

    /// Discount factor for a payment on `date`.
    ///
    /// # Errors
    ///
    /// Fails for dates before the reference date.
    fn discount_date(&self, date: NaiveDate) -> Result<f64, BindingError> {
        let t = self.time_from_reference(date)?;
        Ok(self.discount_factor(t)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct MockCurve {
        rate: f64,
    }

    impl YieldCurve<f64> for MockCurve {
        fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError> {
            if t < 0.0 {
                return Err(MarketDataError::InvalidMaturity { t });
            }
            Ok((-self.rate * t).exp())
        }
    }

    #[test]
    fn test_default_zero_rate() {
        let curve = MockCurve { rate: 0.05 };
        assert_relative_eq!(curve.zero_rate(2.0).unwrap(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_rate_at_zero_fails() {
        let curve = MockCurve { rate: 0.05 };
        assert!(matches!(
            curve.zero_rate(0.0),
            Err(MarketDataError::InvalidMaturity { .. })
        ));
    }

    #[test]
    fn test_default_forward_rate() {
        let curve = MockCurve { rate: 0.03 };
        assert_relative_eq!(curve.forward_rate(0.5, 1.5).unwrap(), 0.03, epsilon = 1e-12);
        assert!(curve.forward_rate(1.5, 0.5).is_err());
    }

    #[test]
    fn test_generic_over_float() {
        struct F32Curve;
        impl YieldCurve<f32> for F32Curve {
            fn discount_factor(&self, t: f32) -> Result<f32, MarketDataError> {
                Ok((-0.1_f32 * t).exp())
            }
        }
        assert!((F32Curve.zero_rate(1.0).unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_year_fraction() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_relative_eq!(year_fraction(start, end), 366.0 / 365.0);
        assert_relative_eq!(year_fraction(end, start), -366.0 / 365.0);
    }
}

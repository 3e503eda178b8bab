//! Market data error types.
//!
//! Curve and calibration failures carry their numeric context here and
//! convert into [`BindingError`] at the graph boundary.

use binding_core::types::BindingError;
use thiserror::Error;

/// Market data operation errors.
///
/// # Variants
///
/// - `InvalidMaturity`: Negative time to maturity
/// - `InsufficientData`: Not enough data points
/// - `Binding`: Failure of the underlying graph (empty handle, failed
///   lazy calculation, missing override)
///
/// # Examples
///
/// ```
/// use binding_models::error::MarketDataError;
///
/// let err = MarketDataError::InvalidMaturity { t: -1.0 };
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Invalid maturity (negative time).
    #[error("Invalid maturity: t = {t}")]
    InvalidMaturity {
        /// The invalid maturity value
        t: f64,
    },

    /// Insufficient data.
    #[error("Insufficient data: got {got}, need {need}")]
    InsufficientData {
        /// Number of points provided
        got: usize,
        /// Minimum number of points required
        need: usize,
    },

    /// Error from the notification graph.
    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl From<MarketDataError> for BindingError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::Binding(inner) => inner,
            other => BindingError::Calculation(other.to_string()),
        }
    }
}

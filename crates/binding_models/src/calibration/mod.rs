//! Calibration helpers.
//!
//! A helper pairs a market value with the value a model assigns to the same
//! instrument. Calibration minimises the helpers' errors; this module only
//! defines the helpers and the error measure.

mod foreign;
mod quote_helper;

pub use foreign::{ForeignCalibrationHelper, ForeignCalibrationHelperBuilder};
pub use quote_helper::QuoteHelper;

use std::rc::Rc;

use binding_core::types::BindingError;

use crate::error::MarketDataError;

/// How a helper measures the distance between model and market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationErrorType {
    /// `(model - market) / market`
    #[default]
    RelativePrice,
    /// `model - market`
    Price,
}

/// Error between `model` and `market` under `kind`.
///
/// # Errors
///
/// [`BindingError::InvalidValue`] for a relative error against a zero
/// market value.
pub fn calibration_error(
    kind: CalibrationErrorType,
    market: f64,
    model: f64,
) -> Result<f64, BindingError> {
    match kind {
        CalibrationErrorType::Price => Ok(model - market),
        CalibrationErrorType::RelativePrice => {
            if market == 0.0 {
                return Err(BindingError::InvalidValue(
                    "relative error against a zero market value".to_string(),
                ));
            }
            Ok((model - market) / market)
        }
    }
}

/// One calibration instrument.
///
/// # Required Methods
///
/// - [`market_value`](CalibrationHelper::market_value)
/// - [`model_value`](CalibrationHelper::model_value)
///
/// # Provided Methods
///
/// - [`error_type`](CalibrationHelper::error_type): relative price error
/// - [`calibration_error`](CalibrationHelper::calibration_error)
pub trait CalibrationHelper {
    /// Observed market value.
    ///
    /// # Errors
    ///
    /// Fails when the market data is unavailable.
    fn market_value(&self) -> Result<f64, BindingError>;

    /// Value implied by the model being calibrated.
    ///
    /// # Errors
    ///
    /// Fails when the model cannot price the instrument.
    fn model_value(&self) -> Result<f64, BindingError>;

    /// Error measure used by [`calibration_error`](CalibrationHelper::calibration_error).
    fn error_type(&self) -> CalibrationErrorType {
        CalibrationErrorType::RelativePrice
    }

    /// Distance between model and market.
    ///
    /// # Errors
    ///
    /// Propagates value failures.
    fn calibration_error(&self) -> Result<f64, BindingError> {
        calibration_error(self.error_type(), self.market_value()?, self.model_value()?)
    }
}

/// Root mean square of the helpers' calibration errors.
///
/// # Errors
///
/// Fails on an empty set or when any helper fails.
pub fn rms_calibration_error(helpers: &[Rc<dyn CalibrationHelper>]) -> Result<f64, BindingError> {
    if helpers.is_empty() {
        return Err(MarketDataError::InsufficientData { got: 0, need: 1 }.into());
    }
    let mut sum = 0.0;
    for helper in helpers {
        let err = helper.calibration_error()?;
        sum += err * err;
    }
    Ok((sum / helpers.len() as f64).sqrt())
}

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::patterns::{Handle, LazyObject, LazyState, Observable, Observed, Observer};
use binding_core::types::BindingError;

use super::{CalibrationErrorType, CalibrationHelper};
use crate::quotes::Quote;

type ModelFn = dyn Fn() -> Result<f64, BindingError>;

/// Helper whose market value is read from a quote.
///
/// The quote is cached until it changes; the model value is asked for on
/// every call, since the model's parameters move during calibration.
pub struct QuoteHelper {
    lazy: LazyState,
    quote: Handle<dyn Quote>,
    market_value: Cell<f64>,
    model: Box<ModelFn>,
    error_type: CalibrationErrorType,
}

impl fmt::Debug for QuoteHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteHelper")
            .field("lazy", &self.lazy)
            .field("quote", &self.quote)
            .field("error_type", &self.error_type)
            .finish()
    }
}

impl QuoteHelper {
    /// Helper comparing `quote` with `model`.
    pub fn new(
        quote: Handle<dyn Quote>,
        error_type: CalibrationErrorType,
        model: impl Fn() -> Result<f64, BindingError> + 'static,
    ) -> Rc<Self> {
        let helper = Rc::new_cyclic(|weak: &Weak<QuoteHelper>| QuoteHelper {
            lazy: LazyState::new(weak.clone()),
            quote,
            market_value: Cell::new(f64::NAN),
            model: Box::new(model),
            error_type,
        });
        helper
            .lazy
            .registrations()
            .register_with(helper.quote.observable());
        helper
    }
}

impl Observer for QuoteHelper {
    fn update(&self) -> Result<(), BindingError> {
        self.lazy.update()
    }
}

impl LazyObject for QuoteHelper {
    fn lazy_state(&self) -> &LazyState {
        &self.lazy
    }

    fn perform_calculations(&self) -> Result<(), BindingError> {
        self.market_value.set(self.quote.current_link()?.value()?);
        Ok(())
    }
}

impl Observed for QuoteHelper {
    fn observable(&self) -> &Rc<Observable> {
        self.lazy.observable()
    }
}

impl CalibrationHelper for QuoteHelper {
    fn market_value(&self) -> Result<f64, BindingError> {
        self.calculate()?;
        Ok(self.market_value.get())
    }

    fn model_value(&self) -> Result<f64, BindingError> {
        (self.model)()
    }

    fn error_type(&self) -> CalibrationErrorType {
        self.error_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::rms_calibration_error;
    use crate::quotes::SimpleQuote;
    use approx::assert_relative_eq;

    #[test]
    fn test_market_value_cached_per_quote_change() {
        let quote = SimpleQuote::new(10.0);
        let model = Rc::new(Cell::new(11.0));
        let source = Rc::clone(&model);
        let helper = QuoteHelper::new(
            Handle::new(quote.clone() as Rc<dyn Quote>),
            CalibrationErrorType::RelativePrice,
            move || Ok(source.get()),
        );

        assert_relative_eq!(helper.calibration_error().unwrap(), 0.1);
        model.set(12.0);
        assert_relative_eq!(helper.calibration_error().unwrap(), 0.2);
        assert_eq!(helper.lazy_state().calculation_count(), 1);

        quote.set_value(12.0).unwrap();
        assert!(!helper.is_calculated());
        assert_relative_eq!(helper.calibration_error().unwrap(), 0.0);
        assert_eq!(helper.lazy_state().calculation_count(), 2);
    }

    #[test]
    fn test_rms_over_mixed_helpers() {
        let a = QuoteHelper::new(
            Handle::new(SimpleQuote::new(1.0) as Rc<dyn Quote>),
            CalibrationErrorType::Price,
            || Ok(2.0),
        );
        let b = QuoteHelper::new(
            Handle::new(SimpleQuote::new(1.0) as Rc<dyn Quote>),
            CalibrationErrorType::Price,
            || Ok(1.0),
        );
        let helpers: Vec<Rc<dyn CalibrationHelper>> = vec![a, b];
        assert_relative_eq!(rms_calibration_error(&helpers).unwrap(), 0.5_f64.sqrt());
    }

    #[test]
    fn test_empty_quote() {
        let helper = QuoteHelper::new(
            Handle::new(SimpleQuote::empty() as Rc<dyn Quote>),
            CalibrationErrorType::Price,
            || Ok(0.0),
        );
        assert!(matches!(
            helper.market_value(),
            Err(BindingError::InvalidValue(_))
        ));
    }
}

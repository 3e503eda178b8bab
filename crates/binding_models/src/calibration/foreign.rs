use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::patterns::{Observable, Observed, Observer, Registrations};
use binding_core::types::BindingError;

use super::{calibration_error, CalibrationErrorType, CalibrationHelper};

type ValueFn = dyn Fn() -> Result<f64, BindingError>;

/// A calibration helper implemented by foreign code.
///
/// The helper observes its market data through the builder's
/// [`observe`](ForeignCalibrationHelperBuilder::observe) and forwards
/// notifications to its own observers.
pub struct ForeignCalibrationHelper {
    registrations: Registrations,
    observable: Rc<Observable>,
    market_value: Override<ValueFn>,
    model_value: Override<ValueFn>,
    calibration_error: Override<ValueFn>,
    error_type: CalibrationErrorType,
}

impl fmt::Debug for ForeignCalibrationHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignCalibrationHelper")
            .field("registrations", &self.registrations)
            .field("observable", &self.observable.id())
            .field("market_value", &self.market_value)
            .field("model_value", &self.model_value)
            .field("calibration_error", &self.calibration_error)
            .field("error_type", &self.error_type)
            .finish()
    }
}

impl ForeignCalibrationHelper {
    /// Start describing a foreign helper.
    pub fn builder() -> ForeignCalibrationHelperBuilder {
        ForeignCalibrationHelperBuilder {
            market_value: Override::new(Self::CLASS, "marketValue"),
            model_value: Override::new(Self::CLASS, "modelValue"),
            calibration_error: Override::new(Self::CLASS, "calibrationError"),
            error_type: CalibrationErrorType::default(),
            observed: Vec::new(),
        }
    }

    /// Observer-side registrations.
    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }
}

impl Observer for ForeignCalibrationHelper {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl Observed for ForeignCalibrationHelper {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl CalibrationHelper for ForeignCalibrationHelper {
    fn market_value(&self) -> Result<f64, BindingError> {
        (self.market_value.required()?)()
    }

    fn model_value(&self) -> Result<f64, BindingError> {
        (self.model_value.required()?)()
    }

    fn error_type(&self) -> CalibrationErrorType {
        self.error_type
    }

    fn calibration_error(&self) -> Result<f64, BindingError> {
        match self.calibration_error.get() {
            Some(f) => f(),
            None => calibration_error(self.error_type, self.market_value()?, self.model_value()?),
        }
    }
}

impl ForeignClass for ForeignCalibrationHelper {
    const CLASS: &'static str = "CalibrationHelper";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("marketValue"),
        MethodSpec::required("modelValue"),
        MethodSpec::defaulted("calibrationError"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "marketValue" => self.market_value.is_overridden(),
            "modelValue" => self.model_value.is_overridden(),
            "calibrationError" => self.calibration_error.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignCalibrationHelper`].
pub struct ForeignCalibrationHelperBuilder {
    market_value: Override<ValueFn>,
    model_value: Override<ValueFn>,
    calibration_error: Override<ValueFn>,
    error_type: CalibrationErrorType,
    observed: Vec<Rc<Observable>>,
}

impl ForeignCalibrationHelperBuilder {
    /// Override `marketValue`.
    pub fn market_value(mut self, f: impl Fn() -> Result<f64, BindingError> + 'static) -> Self {
        self.market_value.set(Box::new(f));
        self
    }

    /// Override `modelValue`.
    pub fn model_value(mut self, f: impl Fn() -> Result<f64, BindingError> + 'static) -> Self {
        self.model_value.set(Box::new(f));
        self
    }

    /// Override `calibrationError`.
    pub fn calibration_error(
        mut self,
        f: impl Fn() -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.calibration_error.set(Box::new(f));
        self
    }

    /// Error measure for the default `calibrationError`.
    pub fn error_type(mut self, error_type: CalibrationErrorType) -> Self {
        self.error_type = error_type;
        self
    }

    /// Register the helper with `target` once built.
    pub fn observe<T: Observed + ?Sized>(mut self, target: &T) -> Self {
        self.observed.push(Rc::clone(target.observable()));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignCalibrationHelper> {
        let Self {
            market_value,
            model_value,
            calibration_error,
            error_type,
            observed,
        } = self;
        let helper = Rc::new_cyclic(|weak: &Weak<ForeignCalibrationHelper>| {
            ForeignCalibrationHelper {
                registrations: Registrations::new(weak.clone()),
                observable: Observable::new(),
                market_value,
                model_value,
                calibration_error,
                error_type,
            }
        });
        helper.registrations.register_with_all(&observed);
        helper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::{Quote, SimpleQuote};
    use approx::assert_relative_eq;
    use binding_core::bridge::ForeignObserver;
    use binding_core::patterns::Handle;
    use std::cell::Cell;

    #[test]
    fn test_default_error_uses_both_values() {
        let helper = ForeignCalibrationHelper::builder()
            .market_value(|| Ok(4.0))
            .model_value(|| Ok(5.0))
            .error_type(CalibrationErrorType::Price)
            .build();
        assert!(helper.missing_overrides().is_empty());
        assert_relative_eq!(helper.calibration_error().unwrap(), 1.0);
    }

    #[test]
    fn test_overridden_error() {
        let helper = ForeignCalibrationHelper::builder()
            .market_value(|| Ok(4.0))
            .model_value(|| Ok(5.0))
            .calibration_error(|| Ok(0.25))
            .build();
        assert_relative_eq!(helper.calibration_error().unwrap(), 0.25);
    }

    #[test]
    fn test_missing_model_value() {
        let helper = ForeignCalibrationHelper::builder()
            .market_value(|| Ok(4.0))
            .build();
        assert_eq!(helper.missing_overrides(), vec!["modelValue"]);
        assert_eq!(
            helper.calibration_error().unwrap_err(),
            BindingError::MissingOverride {
                class: "CalibrationHelper",
                method: "modelValue"
            }
        );
    }

    #[test]
    fn test_market_quote_change_reaches_helper_observers() {
        let price = SimpleQuote::new(4.0);
        let quote = Handle::new(price.clone() as Rc<dyn Quote>);
        let helper = {
            let link = quote.clone();
            ForeignCalibrationHelper::builder()
                .market_value(move || link.current_link()?.value())
                .model_value(|| Ok(5.0))
                .error_type(CalibrationErrorType::Price)
                .observe(&quote)
                .build()
        };
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let calibrator = ForeignObserver::builder()
            .update(move || {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .build();
        calibrator.registrations().register_with(helper.observable());

        price.set_value(4.5).unwrap();
        assert_eq!(hits.get(), 1);
        assert_relative_eq!(helper.calibration_error().unwrap(), 0.5);
    }
}

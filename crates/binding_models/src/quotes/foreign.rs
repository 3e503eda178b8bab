use std::fmt;
use std::rc::Rc;

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::patterns::{Observable, Observed};
use binding_core::types::BindingError;

use super::Quote;

type ValueFn = dyn Fn() -> Result<f64, BindingError>;
type IsValidFn = dyn Fn() -> bool;

/// A quote implemented by foreign code.
///
/// Foreign code signals a change by calling
/// `quote.observable().notify_observers()`.
pub struct ForeignQuote {
    observable: Rc<Observable>,
    value: Override<ValueFn>,
    is_valid: Override<IsValidFn>,
}

impl fmt::Debug for ForeignQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignQuote")
            .field("observable", &self.observable.id())
            .field("value", &self.value)
            .field("is_valid", &self.is_valid)
            .finish()
    }
}

impl ForeignQuote {
    /// Start describing a foreign quote.
    pub fn builder() -> ForeignQuoteBuilder {
        ForeignQuoteBuilder {
            value: Override::new(Self::CLASS, "value"),
            is_valid: Override::new(Self::CLASS, "isValid"),
        }
    }
}

impl Observed for ForeignQuote {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl Quote for ForeignQuote {
    fn value(&self) -> Result<f64, BindingError> {
        (self.value.required()?)()
    }

    fn is_valid(&self) -> bool {
        match self.is_valid.get() {
            Some(f) => f(),
            None => self.value().map(f64::is_finite).unwrap_or(false),
        }
    }
}

impl ForeignClass for ForeignQuote {
    const CLASS: &'static str = "Quote";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("value"),
        MethodSpec::defaulted("isValid"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "value" => self.value.is_overridden(),
            "isValid" => self.is_valid.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignQuote`].
pub struct ForeignQuoteBuilder {
    value: Override<ValueFn>,
    is_valid: Override<IsValidFn>,
}

impl ForeignQuoteBuilder {
    /// Override `value`.
    pub fn value(mut self, f: impl Fn() -> Result<f64, BindingError> + 'static) -> Self {
        self.value.set(Box::new(f));
        self
    }

    /// Override `isValid`.
    pub fn is_valid(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.is_valid.set(Box::new(f));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignQuote> {
        Rc::new(ForeignQuote {
            observable: Observable::new(),
            value: self.value,
            is_valid: self.is_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binding_core::patterns::Handle;
    use std::cell::Cell;

    #[test]
    fn test_value_is_required() {
        let quote = ForeignQuote::builder().build();
        assert_eq!(quote.missing_overrides(), vec!["value"]);
        assert_eq!(
            quote.value().unwrap_err(),
            BindingError::MissingOverride {
                class: "Quote",
                method: "value"
            }
        );
        // The defaulted method degrades instead of failing.
        assert!(!quote.is_valid());
    }

    #[test]
    fn test_is_valid_falls_through_to_default() {
        let quote = ForeignQuote::builder().value(|| Ok(42.0)).build();
        assert!(quote.missing_overrides().is_empty());
        assert!(!quote.is_overridden("isValid"));
        assert!(quote.is_valid());
    }

    #[test]
    fn test_is_valid_override_is_called() {
        let quote = ForeignQuote::builder()
            .value(|| Ok(42.0))
            .is_valid(|| false)
            .build();
        assert!(!quote.is_valid());
    }

    #[test]
    fn test_reached_through_trait_object() {
        let level = Rc::new(Cell::new(7.0));
        let source = Rc::clone(&level);
        let quote = ForeignQuote::builder().value(move || Ok(source.get())).build();
        let handle: Handle<dyn Quote> = Handle::new(quote);

        assert_eq!(handle.current_link().unwrap().value().unwrap(), 7.0);
        level.set(8.0);
        assert_eq!(handle.current_link().unwrap().value().unwrap(), 8.0);
    }

    #[test]
    fn test_foreign_error_propagates() {
        let quote = ForeignQuote::builder()
            .value(|| Err(BindingError::foreign("feed disconnected")))
            .build();
        assert_eq!(
            quote.value().unwrap_err().to_string(),
            "Foreign callback raised: feed disconnected"
        );
    }
}

//! Market quotes.
//!
//! A quote is the leaf of most dependency graphs: curves, helpers and
//! derived quotes observe it (usually through a handle) and are invalidated
//! when it changes.
//!
//! - [`SimpleQuote`]: a settable value
//! - [`DerivedQuote`]: a unary function of another quote
//! - [`CompositeQuote`]: a binary function of two quotes
//! - [`ForeignQuote`]: `value`/`isValid` supplied by foreign code

mod derived;
mod foreign;

pub use derived::{CompositeQuote, DerivedQuote};
pub use foreign::{ForeignQuote, ForeignQuoteBuilder};

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use binding_core::patterns::{Observable, Observed, UpdateGate};
use binding_core::types::BindingError;
use tracing::trace;

/// A market observable value.
///
/// # Required Methods
///
/// - [`value`](Quote::value)
///
/// # Provided Methods
///
/// - [`is_valid`](Quote::is_valid): whether `value` currently succeeds with a
///   finite number
pub trait Quote: Observed {
    /// Current value.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidValue`] when no value is available.
    fn value(&self) -> Result<f64, BindingError>;

    /// Whether a usable value is available.
    fn is_valid(&self) -> bool {
        self.value().map(f64::is_finite).unwrap_or(false)
    }
}

/// A quote whose value is set directly.
///
/// # Examples
///
/// ```
/// use binding_models::quotes::{Quote, SimpleQuote};
///
/// let quote = SimpleQuote::new(100.0);
/// assert_eq!(quote.set_value(105.0).unwrap(), 5.0);
/// assert_eq!(quote.value().unwrap(), 105.0);
/// ```
pub struct SimpleQuote {
    value: Cell<Option<f64>>,
    observable: Rc<Observable>,
}

impl fmt::Debug for SimpleQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleQuote")
            .field("value", &self.value.get())
            .field("observable", &self.observable.id())
            .finish()
    }
}

impl SimpleQuote {
    /// Quote holding `value`.
    pub fn new(value: f64) -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(Some(value)),
            observable: Observable::new(),
        })
    }

    /// Quote with no value yet.
    pub fn empty() -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(None),
            observable: Observable::new(),
        })
    }

    /// Quote whose notifications pass through `gate`.
    pub fn with_gate(value: Option<f64>, gate: &Rc<UpdateGate>) -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(value),
            observable: Observable::with_gate(gate),
        })
    }

    /// Set the value and notify observers if it changed.
    ///
    /// Returns the change `new - old`; setting the first value returns the
    /// value itself.
    ///
    /// # Errors
    ///
    /// Propagates observer failures. The new value is kept regardless.
    pub fn set_value(&self, value: f64) -> Result<f64, BindingError> {
        let previous = self.value.replace(Some(value));
        let diff = value - previous.unwrap_or(0.0);
        if previous == Some(value) {
            trace!(observable = %self.observable.id(), value, "quote unchanged");
            return Ok(diff);
        }
        trace!(observable = %self.observable.id(), value, diff, "quote changed");
        self.observable.notify_observers()?;
        Ok(diff)
    }

    /// Remove the value and notify observers.
    ///
    /// # Errors
    ///
    /// Propagates observer failures.
    pub fn reset(&self) -> Result<(), BindingError> {
        if self.value.replace(None).is_some() {
            self.observable.notify_observers()?;
        }
        Ok(())
    }
}

impl Observed for SimpleQuote {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl Quote for SimpleQuote {
    fn value(&self) -> Result<f64, BindingError> {
        self.value
            .get()
            .ok_or_else(|| BindingError::InvalidValue("SimpleQuote has no value".to_string()))
    }

    fn is_valid(&self) -> bool {
        self.value.get().is_some()
    }
}

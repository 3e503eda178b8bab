//! Quotes computed from other quotes.

use std::fmt;
use std::rc::{Rc, Weak};

use binding_core::patterns::{Handle, Observable, Observed, Observer, Registrations};
use binding_core::types::BindingError;

use super::Quote;

type UnaryFn = dyn Fn(f64) -> f64;
type BinaryFn = dyn Fn(f64, f64) -> f64;

/// Quote equal to `f(element)`.
///
/// Forwards every notification of `element`; the value is recomputed on
/// each call.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use binding_core::patterns::Handle;
/// use binding_models::quotes::{DerivedQuote, Quote, SimpleQuote};
///
/// let spot = SimpleQuote::new(100.0);
/// let handle: Handle<dyn Quote> = Handle::new(spot.clone());
/// let scaled = DerivedQuote::new(handle, |x| x / 100.0);
/// assert_eq!(scaled.value().unwrap(), 1.0);
/// ```
pub struct DerivedQuote {
    registrations: Registrations,
    observable: Rc<Observable>,
    element: Handle<dyn Quote>,
    f: Box<UnaryFn>,
}

impl fmt::Debug for DerivedQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedQuote")
            .field("observable", &self.observable.id())
            .field("element", &self.element)
            .finish()
    }
}

impl DerivedQuote {
    /// Quote applying `f` to the value behind `element`.
    pub fn new(element: Handle<dyn Quote>, f: impl Fn(f64) -> f64 + 'static) -> Rc<Self> {
        let quote = Rc::new_cyclic(|weak: &Weak<DerivedQuote>| DerivedQuote {
            registrations: Registrations::new(weak.clone()),
            observable: Observable::new(),
            element,
            f: Box::new(f),
        });
        quote
            .registrations
            .register_with(quote.element.observable());
        quote
    }
}

impl Observer for DerivedQuote {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl Observed for DerivedQuote {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl Quote for DerivedQuote {
    fn value(&self) -> Result<f64, BindingError> {
        let x = self.element.current_link()?.value()?;
        Ok((self.f)(x))
    }

    fn is_valid(&self) -> bool {
        self.element
            .current_link()
            .map(|q| q.is_valid())
            .unwrap_or(false)
    }
}

/// Quote equal to `f(first, second)`.
pub struct CompositeQuote {
    registrations: Registrations,
    observable: Rc<Observable>,
    first: Handle<dyn Quote>,
    second: Handle<dyn Quote>,
    f: Box<BinaryFn>,
}

impl fmt::Debug for CompositeQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeQuote")
            .field("observable", &self.observable.id())
            .field("first", &self.first)
            .field("second", &self.second)
            .finish()
    }
}

impl CompositeQuote {
    /// Quote combining the values behind `first` and `second` with `f`.
    pub fn new(
        first: Handle<dyn Quote>,
        second: Handle<dyn Quote>,
        f: impl Fn(f64, f64) -> f64 + 'static,
    ) -> Rc<Self> {
        let quote = Rc::new_cyclic(|weak: &Weak<CompositeQuote>| CompositeQuote {
            registrations: Registrations::new(weak.clone()),
            observable: Observable::new(),
            first,
            second,
            f: Box::new(f),
        });
        quote
            .registrations
            .register_with_all([quote.first.observable(), quote.second.observable()]);
        quote
    }
}

impl Observer for CompositeQuote {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

impl Observed for CompositeQuote {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl Quote for CompositeQuote {
    fn value(&self) -> Result<f64, BindingError> {
        let a = self.first.current_link()?.value()?;
        let b = self.second.current_link()?.value()?;
        Ok((self.f)(a, b))
    }

    fn is_valid(&self) -> bool {
        let valid = |h: &Handle<dyn Quote>| h.current_link().map(|q| q.is_valid()).unwrap_or(false);
        valid(&self.first) && valid(&self.second)
    }
}

//! A value whose assignment notifies observers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::observable::{Observable, Observed};
use super::settings::UpdateGate;
use crate::types::BindingError;

/// A shared value that notifies its observers on every assignment.
///
/// Assignment always notifies, even when the new value equals the old one:
/// observers treat the notification as "re-read", not as "differs".
///
/// # Example
///
/// ```
/// use binding_core::patterns::ObservableValue;
///
/// let value = ObservableValue::new(1.5_f64);
/// value.set(2.5).unwrap();
/// assert_eq!(value.get(), 2.5);
/// ```
pub struct ObservableValue<T> {
    value: RefCell<T>,
    observable: Rc<Observable>,
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("value", &*self.value.borrow())
            .field("observable", &self.observable.id())
            .finish()
    }
}

impl<T: Clone> ObservableValue<T> {
    /// Wrap `value` with an ungated observable.
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            observable: Observable::new(),
        }
    }

    /// Wrap `value` with an observable gated by `gate`.
    pub fn with_gate(value: T, gate: &Rc<UpdateGate>) -> Self {
        Self {
            value: RefCell::new(value),
            observable: Observable::with_gate(gate),
        }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Assign `value` and notify observers.
    ///
    /// # Errors
    ///
    /// Propagates observer failures; the new value is kept regardless.
    pub fn set(&self, value: T) -> Result<(), BindingError> {
        *self.value.borrow_mut() = value;
        self.observable.notify_observers()
    }
}

impl<T> Observed for ObservableValue<T> {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::observer::{Observer, Registrations};
    use std::cell::Cell;
    use std::rc::Weak;

    struct Tally {
        registrations: Registrations,
        hits: Cell<u32>,
    }

    impl Observer for Tally {
        fn update(&self) -> Result<(), BindingError> {
            self.hits.set(self.hits.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_set_notifies_even_when_equal() {
        let value = ObservableValue::new(3_i32);
        let tally = Rc::new_cyclic(|weak: &Weak<Tally>| Tally {
            registrations: Registrations::new(weak.clone()),
            hits: Cell::new(0),
        });
        tally.registrations.register_with(value.observable());

        value.set(4).unwrap();
        value.set(4).unwrap();
        assert_eq!(value.get(), 4);
        assert_eq!(tally.hits.get(), 2);
    }

    #[test]
    fn test_with_borrows() {
        let value = ObservableValue::new(vec![1, 2, 3]);
        assert_eq!(value.with(|v| v.len()), 3);
    }
}

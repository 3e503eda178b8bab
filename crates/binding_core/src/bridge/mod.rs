//! Override slots for foreign subclasses of abstract roles.
//!
//! # Design
//!
//! Every abstract role is a trait. Native implementations implement the
//! trait directly. A foreign subclass is represented by a `Foreign*` type
//! that also implements the trait, but whose methods consult an
//! [`Override`] slot filled in at construction time:
//!
//! - **Required** methods (no native default) fail with
//!   [`BindingError::MissingOverride`] when the slot is empty, at the moment
//!   the native side tries to call them.
//! - **Defaulted** methods call the override when present and fall through
//!   to the native default otherwise.
//! - **Special** methods map a native operator onto the name a caller expects
//!   (the payoff call operator becomes `call`).
//!
//! Callers hold `Rc<dyn Role>` and never know which kind they have.
//!
//! # Example
//!
//! ```
//! use binding_core::bridge::Override;
//! use binding_core::types::BindingError;
//!
//! type ValueFn = dyn Fn() -> Result<f64, BindingError>;
//!
//! let mut slot: Override<ValueFn> = Override::new("Quote", "value");
//! assert!(slot.required().err().unwrap().is_missing_override());
//!
//! slot.set(Box::new(|| Ok(101.5)));
//! assert_eq!((slot.required().unwrap())().unwrap(), 101.5);
//! ```

pub mod foreign;

pub use foreign::{ForeignLazyObject, ForeignLazyObjectBuilder, ForeignObserver, ForeignObserverBuilder};

use std::fmt;

use tracing::warn;

use crate::types::BindingError;

/// How a bridged method may be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// No native default; a foreign subclass must override it.
    Required,
    /// A native default exists; overriding is optional.
    Defaulted,
    /// A native operator exposed under a conventional name.
    Special {
        /// The native operator being mapped
        native: &'static str,
        /// Whether the operator has no native default
        required: bool,
    },
}

impl MethodKind {
    /// Whether a missing override is an error at dispatch time.
    pub fn is_required(&self) -> bool {
        match self {
            MethodKind::Required => true,
            MethodKind::Defaulted => false,
            MethodKind::Special { required, .. } => *required,
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Required => write!(f, "required"),
            MethodKind::Defaulted => write!(f, "defaulted"),
            MethodKind::Special { native, required } => {
                let status = if *required { "required" } else { "defaulted" };
                write!(f, "special ({native}, {status})")
            }
        }
    }
}

/// One overridable method of a bridged class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    /// Name as seen by the foreign subclass
    pub name: &'static str,
    /// Override rules
    pub kind: MethodKind,
}

impl MethodSpec {
    /// A method without a native default.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: MethodKind::Required,
        }
    }

    /// A method with a native default.
    pub const fn defaulted(name: &'static str) -> Self {
        Self {
            name,
            kind: MethodKind::Defaulted,
        }
    }

    /// A native operator exposed as `name`.
    pub const fn special(name: &'static str, native: &'static str, required: bool) -> Self {
        Self {
            name,
            kind: MethodKind::Special { native, required },
        }
    }
}

/// A foreign-subclassable type: its override table and which slots are
/// filled.
pub trait ForeignClass {
    /// Name of the abstract class being subclassed.
    const CLASS: &'static str;

    /// Every overridable method with its rules.
    const METHODS: &'static [MethodSpec];

    /// Whether the slot for `method` holds an override.
    fn is_overridden(&self, method: &str) -> bool;

    /// Required methods whose slots are empty.
    ///
    /// Lets a caller report the problem up front; dispatch still fails on
    /// its own when one of them is reached.
    fn missing_overrides(&self) -> Vec<&'static str> {
        Self::METHODS
            .iter()
            .filter(|spec| spec.kind.is_required() && !self.is_overridden(spec.name))
            .map(|spec| spec.name)
            .collect()
    }
}

/// An optional foreign implementation of one method.
///
/// `F` is the callback's trait-object type, e.g.
/// `dyn Fn(f64) -> Result<f64, BindingError>`.
pub struct Override<F: ?Sized> {
    class: &'static str,
    method: &'static str,
    callback: Option<Box<F>>,
}

impl<F: ?Sized> fmt::Debug for Override<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("class", &self.class)
            .field("method", &self.method)
            .field("overridden", &self.callback.is_some())
            .finish()
    }
}

impl<F: ?Sized> Override<F> {
    /// An empty slot for `class::method`.
    pub fn new(class: &'static str, method: &'static str) -> Self {
        Self {
            class,
            method,
            callback: None,
        }
    }

    /// Fill the slot.
    pub fn set(&mut self, callback: Box<F>) {
        self.callback = Some(callback);
    }

    /// Whether the slot is filled.
    pub fn is_overridden(&self) -> bool {
        self.callback.is_some()
    }

    /// Method name of this slot.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// The override, if any. Used for defaulted methods.
    pub fn get(&self) -> Option<&F> {
        self.callback.as_deref()
    }

    /// The override of a method without a native default.
    ///
    /// # Errors
    ///
    /// [`BindingError::MissingOverride`] when the slot is empty.
    pub fn required(&self) -> Result<&F, BindingError> {
        match self.callback.as_deref() {
            Some(callback) => Ok(callback),
            None => {
                warn!(class = self.class, method = self.method, "required override missing");
                Err(BindingError::MissingOverride {
                    class: self.class,
                    method: self.method,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Unary = dyn Fn(f64) -> Result<f64, BindingError>;

    struct Sample {
        scale: Override<Unary>,
        shift: Override<Unary>,
    }

    impl ForeignClass for Sample {
        const CLASS: &'static str = "Sample";
        const METHODS: &'static [MethodSpec] = &[
            MethodSpec::required("scale"),
            MethodSpec::defaulted("shift"),
            MethodSpec::special("call", "operator()", true),
        ];

        fn is_overridden(&self, method: &str) -> bool {
            match method {
                "scale" => self.scale.is_overridden(),
                "shift" => self.shift.is_overridden(),
                _ => false,
            }
        }
    }

    impl Sample {
        fn shift(&self, x: f64) -> Result<f64, BindingError> {
            match self.shift.get() {
                Some(f) => f(x),
                None => Ok(x),
            }
        }
    }

    #[test]
    fn test_missing_required_override() {
        let slot: Override<Unary> = Override::new("Sample", "scale");
        let err = slot.required().err().unwrap();
        assert_eq!(
            err,
            BindingError::MissingOverride {
                class: "Sample",
                method: "scale"
            }
        );
    }

    #[test]
    fn test_defaulted_falls_through() {
        let mut sample = Sample {
            scale: Override::new("Sample", "scale"),
            shift: Override::new("Sample", "shift"),
        };
        assert_eq!(sample.shift(3.0).unwrap(), 3.0);

        sample.shift.set(Box::new(|x: f64| Ok(x + 1.0)));
        assert_eq!(sample.shift(3.0).unwrap(), 4.0);
    }

    #[test]
    fn test_missing_overrides_lists_required_only() {
        let mut sample = Sample {
            scale: Override::new("Sample", "scale"),
            shift: Override::new("Sample", "shift"),
        };
        assert_eq!(sample.missing_overrides(), vec!["scale", "call"]);

        sample.scale.set(Box::new(|x: f64| Ok(2.0 * x)));
        assert_eq!(sample.missing_overrides(), vec!["call"]);
    }

    #[test]
    fn test_method_kind_display() {
        assert_eq!(MethodKind::Required.to_string(), "required");
        assert_eq!(MethodKind::Defaulted.to_string(), "defaulted");
        assert_eq!(
            MethodKind::Special {
                native: "operator()",
                required: true
            }
            .to_string(),
            "special (operator(), required)"
        );
    }
}

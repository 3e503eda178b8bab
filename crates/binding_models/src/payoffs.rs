//! Option payoffs.
//!
//! The native call operator of a payoff is exposed as [`Payoff::call`], so a
//! foreign subclass overrides `call` rather than an operator name.

use std::fmt;
use std::rc::Rc;

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::types::BindingError;

/// Type of a plain vanilla option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionType {
    /// Call option: max(S - K, 0)
    Call,
    /// Put option: max(K - S, 0)
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// Payoff of an option as a function of the underlying price.
///
/// # Required Methods
///
/// - [`name`](Payoff::name)
/// - [`call`](Payoff::call): the payoff function itself
///
/// # Provided Methods
///
/// - [`description`](Payoff::description): defaults to the name
pub trait Payoff {
    /// Short name of the payoff family.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn name(&self) -> Result<String, BindingError>;

    /// Human-readable description.
    ///
    /// # Errors
    ///
    /// Propagates `name` failures.
    fn description(&self) -> Result<String, BindingError> {
        self.name()
    }

    /// Payoff at underlying price `price`.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn call(&self, price: f64) -> Result<f64, BindingError>;
}

/// Call or put struck at `strike`.
///
/// # Examples
///
/// ```
/// use binding_models::payoffs::{OptionType, Payoff, PlainVanillaPayoff};
///
/// let payoff = PlainVanillaPayoff::new(OptionType::Call, 100.0);
/// assert_eq!(payoff.call(110.0).unwrap(), 10.0);
/// assert_eq!(payoff.call(90.0).unwrap(), 0.0);
/// assert_eq!(payoff.description().unwrap(), "Vanilla Call, 100 strike");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlainVanillaPayoff {
    option_type: OptionType,
    strike: f64,
}

impl PlainVanillaPayoff {
    /// Vanilla payoff of `option_type` struck at `strike`.
    pub fn new(option_type: OptionType, strike: f64) -> Self {
        Self {
            option_type,
            strike,
        }
    }

    /// The option type.
    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    /// The strike.
    pub fn strike(&self) -> f64 {
        self.strike
    }
}

impl Payoff for PlainVanillaPayoff {
    fn name(&self) -> Result<String, BindingError> {
        Ok("Vanilla".to_string())
    }

    fn description(&self) -> Result<String, BindingError> {
        Ok(format!(
            "{} {}, {} strike",
            self.name()?,
            self.option_type,
            self.strike
        ))
    }

    fn call(&self, price: f64) -> Result<f64, BindingError> {
        let intrinsic = match self.option_type {
            OptionType::Call => price - self.strike,
            OptionType::Put => self.strike - price,
        };
        Ok(intrinsic.max(0.0))
    }
}

type NameFn = dyn Fn() -> Result<String, BindingError>;
type CallFn = dyn Fn(f64) -> Result<f64, BindingError>;

/// A payoff implemented by foreign code.
pub struct ForeignPayoff {
    name: Override<NameFn>,
    description: Override<NameFn>,
    call: Override<CallFn>,
}

impl fmt::Debug for ForeignPayoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignPayoff")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("call", &self.call)
            .finish()
    }
}

impl ForeignPayoff {
    /// Start describing a foreign payoff.
    pub fn builder() -> ForeignPayoffBuilder {
        ForeignPayoffBuilder {
            name: Override::new(Self::CLASS, "name"),
            description: Override::new(Self::CLASS, "description"),
            call: Override::new(Self::CLASS, "call"),
        }
    }
}

impl Payoff for ForeignPayoff {
    fn name(&self) -> Result<String, BindingError> {
        (self.name.required()?)()
    }

    fn description(&self) -> Result<String, BindingError> {
        match self.description.get() {
            Some(f) => f(),
            None => self.name(),
        }
    }

    fn call(&self, price: f64) -> Result<f64, BindingError> {
        (self.call.required()?)(price)
    }
}

impl ForeignClass for ForeignPayoff {
    const CLASS: &'static str = "Payoff";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("name"),
        MethodSpec::defaulted("description"),
        MethodSpec::special("call", "operator()", true),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "name" => self.name.is_overridden(),
            "description" => self.description.is_overridden(),
            "call" => self.call.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignPayoff`].
pub struct ForeignPayoffBuilder {
    name: Override<NameFn>,
    description: Override<NameFn>,
    call: Override<CallFn>,
}

impl ForeignPayoffBuilder {
    /// Override `name`.
    pub fn name(mut self, f: impl Fn() -> Result<String, BindingError> + 'static) -> Self {
        self.name.set(Box::new(f));
        self
    }

    /// Override `description`.
    pub fn description(mut self, f: impl Fn() -> Result<String, BindingError> + 'static) -> Self {
        self.description.set(Box::new(f));
        self
    }

    /// Override the call operator.
    pub fn call(mut self, f: impl Fn(f64) -> Result<f64, BindingError> + 'static) -> Self {
        self.call.set(Box::new(f));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignPayoff> {
        Rc::new(ForeignPayoff {
            name: self.name,
            description: self.description,
            call: self.call,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vanilla_put() {
        let payoff = PlainVanillaPayoff::new(OptionType::Put, 100.0);
        assert_relative_eq!(payoff.call(80.0).unwrap(), 20.0);
        assert_eq!(payoff.call(120.0).unwrap(), 0.0);
        assert_eq!(payoff.strike(), 100.0);
        assert_eq!(payoff.option_type(), OptionType::Put);
    }

    #[test]
    fn test_foreign_payoff_call_is_dispatched() {
        let payoff: Rc<dyn Payoff> = ForeignPayoff::builder()
            .name(|| Ok("Digital".to_string()))
            .call(|s: f64| Ok(if s > 100.0 { 1.0 } else { 0.0 }))
            .build();
        assert_eq!(payoff.call(101.0).unwrap(), 1.0);
        assert_eq!(payoff.call(99.0).unwrap(), 0.0);
        assert_eq!(payoff.description().unwrap(), "Digital");
    }

    #[test]
    fn test_foreign_payoff_missing_call() {
        let payoff = ForeignPayoff::builder()
            .name(|| Ok("Broken".to_string()))
            .build();
        assert_eq!(payoff.missing_overrides(), vec!["call"]);
        assert_eq!(
            payoff.call(1.0).unwrap_err(),
            BindingError::MissingOverride {
                class: "Payoff",
                method: "call"
            }
        );
    }

    #[test]
    fn test_foreign_description_override() {
        let payoff = ForeignPayoff::builder()
            .name(|| Ok("Digital".to_string()))
            .description(|| Ok("Digital 100 cash-or-nothing".to_string()))
            .call(|_| Ok(0.0))
            .build();
        assert!(payoff.is_overridden("description"));
        assert_eq!(payoff.description().unwrap(), "Digital 100 cash-or-nothing");
    }

    #[test]
    fn test_special_method_kind() {
        let call = ForeignPayoff::METHODS
            .iter()
            .find(|spec| spec.name == "call")
            .unwrap();
        assert_eq!(call.kind.to_string(), "special (operator(), required)");
    }
}

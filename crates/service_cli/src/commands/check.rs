//! Check command implementation
//!
//! Lists every bridged class with its overridable methods, so a foreign
//! subclass author can see which slots must be filled.

use binding_core::bridge::{ForeignClass, ForeignLazyObject, ForeignObserver, MethodSpec};
use binding_models::calibration::ForeignCalibrationHelper;
use binding_models::instruments::{Cashflow, ForeignEngine};
use binding_models::payoffs::ForeignPayoff;
use binding_models::processes::ForeignProcess;
use binding_models::quotes::ForeignQuote;
use binding_models::term_structures::ForeignYieldCurve;

use crate::{CliError, Result};

fn entry<T: ForeignClass>() -> (&'static str, &'static [MethodSpec]) {
    (T::CLASS, T::METHODS)
}

/// Every bridged class with its override table.
fn classes() -> Vec<(&'static str, &'static [MethodSpec])> {
    vec![
        entry::<ForeignObserver>(),
        entry::<ForeignLazyObject>(),
        entry::<ForeignQuote>(),
        entry::<ForeignYieldCurve>(),
        entry::<ForeignEngine<Vec<Cashflow>>>(),
        entry::<ForeignPayoff>(),
        entry::<ForeignProcess>(),
        entry::<ForeignCalibrationHelper>(),
    ]
}

/// Run the check command
pub fn run(class: Option<&str>) -> Result<()> {
    let selected: Vec<_> = classes()
        .into_iter()
        .filter(|(name, _)| class.map_or(true, |wanted| wanted == *name))
        .collect();

    if selected.is_empty() {
        let known: Vec<_> = classes().into_iter().map(|(name, _)| name).collect();
        return Err(CliError::InvalidArgument(format!(
            "Unknown class: {}. Known: {}",
            class.unwrap_or_default(),
            known.join(", ")
        )));
    }

    for (name, methods) in selected {
        let required = methods.iter().filter(|m| m.kind.is_required()).count();
        println!("{} ({} required of {})", name, required, methods.len());
        for method in methods {
            println!("  {:<20} {}", method.name, method.kind);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_listed_once() {
        let names: Vec<_> = classes().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), 8);
        let mut unique = names.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_every_class_has_a_required_method() {
        for (name, methods) in classes() {
            assert!(
                methods.iter().any(|m| m.kind.is_required()),
                "{} has no required method",
                name
            );
        }
    }

    #[test]
    fn test_single_class() {
        assert!(run(Some("Quote")).is_ok());
        assert!(run(None).is_ok());
    }

    #[test]
    fn test_unknown_class() {
        assert!(matches!(run(Some("Swaption")), Err(CliError::InvalidArgument(_))));
    }
}

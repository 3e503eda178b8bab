//! Error types for the notification graph and the override bridge.
//!
//! This module provides:
//! - `BindingError`: every failure the foundation layer can surface
//!
//! Nothing here is retried. Errors travel back to the caller that mutated
//! the graph or asked for a derived quantity.

use thiserror::Error;

/// Categorised binding errors.
///
/// # Variants
/// - `MissingOverride`: a foreign subclass left a required method empty
/// - `NotificationFailed`: one or more observers failed during a cascade
/// - `EmptyHandle`: an empty handle was dereferenced
/// - `Calculation`: a lazy computation failed
/// - `InvalidValue`: a value was requested but none is available
/// - `Foreign`: a foreign callback reported its own failure
///
/// # Examples
/// ```
/// use binding_core::types::BindingError;
///
/// let err = BindingError::MissingOverride { class: "Quote", method: "value" };
/// assert_eq!(format!("{}", err), "Quote::value is required but was not overridden");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// A required method was invoked on a foreign subclass that did not
    /// provide an override.
    #[error("{class}::{method} is required but was not overridden")]
    MissingOverride {
        /// Name of the bridged abstract class
        class: &'static str,
        /// Name of the method as seen by the foreign subclass
        method: &'static str,
    },

    /// At least one observer failed while being notified.
    ///
    /// Delivery continues past a failing observer, so `errors` holds one
    /// entry per failure in delivery order. Failures of nested cascades are
    /// flattened into the same list.
    #[error("could not notify one or more observers: {}", join_errors(.errors))]
    NotificationFailed {
        /// Error of each failing observer
        errors: Vec<BindingError>,
    },

    /// An empty handle was dereferenced.
    #[error("empty Handle cannot be dereferenced")]
    EmptyHandle,

    /// A lazy computation failed.
    #[error("Calculation failed: {0}")]
    Calculation(String),

    /// A value was requested but none is available.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A foreign callback raised an error of its own.
    #[error("Foreign callback raised: {0}")]
    Foreign(String),
}

impl BindingError {
    /// Build a `Foreign` error from anything printable.
    ///
    /// Convenience for callbacks that wrap errors from the foreign side.
    pub fn foreign(message: impl std::fmt::Display) -> Self {
        BindingError::Foreign(message.to_string())
    }

    /// Whether this is, or a notification failure contains, a missing
    /// required override.
    pub fn is_missing_override(&self) -> bool {
        match self {
            BindingError::MissingOverride { .. } => true,
            BindingError::NotificationFailed { errors } => {
                errors.iter().any(BindingError::is_missing_override)
            }
            _ => false,
        }
    }

    /// Every `(class, method)` pair reported as a missing override, including
    /// those raised inside a notification cascade.
    pub fn missing_overrides(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            BindingError::MissingOverride { class, method } => vec![(*class, *method)],
            BindingError::NotificationFailed { errors } => errors
                .iter()
                .flat_map(BindingError::missing_overrides)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Append `self` to `errors`, splicing in the contents of a nested
    /// notification failure instead of nesting it.
    pub(crate) fn flatten_into(self, errors: &mut Vec<BindingError>) {
        match self {
            BindingError::NotificationFailed { errors: nested } => errors.extend(nested),
            other => errors.push(other),
        }
    }
}

fn join_errors(errors: &[BindingError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

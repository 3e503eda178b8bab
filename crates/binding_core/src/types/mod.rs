//! Shared types for the foundation layer.
//!
//! - [`error`]: `BindingError`

pub mod error;

pub use error::BindingError;

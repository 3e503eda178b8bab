//! # binding_core: Notification Graph and Override Bridge
//!
//! ## Layer 1 (Foundation) Role
//!
//! binding_core is the bottom layer of the workspace, providing:
//! - Observable/Observer registry with mandatory teardown (`patterns::observable`, `patterns::observer`)
//! - Lazy recalculation on top of the registry (`patterns::lazy`)
//! - Shared and relinkable handles (`patterns::handle`)
//! - Observable values, per-session settings and the update gate (`patterns::value`, `patterns::settings`)
//! - Override slots for foreign subclasses of abstract roles (`bridge`)
//! - Error types: `BindingError` (`types::error`)
//! - Session configuration: `SessionConfig` (`config`)
//!
//! ## Threading Model
//!
//! Everything here is single-threaded. Shared state lives in `Rc`, `Cell` and
//! `RefCell`, so the types are `!Send` and callers serialise access.
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use binding_core::patterns::{LazyObject, LazyState, Observable, Observer};
//! use binding_core::types::BindingError;
//!
//! struct Doubler {
//!     lazy: LazyState,
//!     input: Rc<Cell<f64>>,
//!     output: Cell<f64>,
//! }
//!
//! impl Observer for Doubler {
//!     fn update(&self) -> Result<(), BindingError> {
//!         self.lazy.update()
//!     }
//! }
//!
//! impl LazyObject for Doubler {
//!     fn lazy_state(&self) -> &LazyState {
//!         &self.lazy
//!     }
//!
//!     fn perform_calculations(&self) -> Result<(), BindingError> {
//!         self.output.set(2.0 * self.input.get());
//!         Ok(())
//!     }
//! }
//!
//! let source = Observable::new();
//! let input = Rc::new(Cell::new(21.0));
//! let doubler = Rc::new_cyclic(|weak: &std::rc::Weak<Doubler>| Doubler {
//!     lazy: LazyState::new(weak.clone()),
//!     input: Rc::clone(&input),
//!     output: Cell::new(0.0),
//! });
//! doubler.lazy_state().registrations().register_with(&source);
//!
//! doubler.calculate().unwrap();
//! assert_eq!(doubler.output.get(), 42.0);
//!
//! input.set(5.0);
//! source.notify_observers().unwrap();
//! assert!(!doubler.is_calculated());
//! doubler.calculate().unwrap();
//! assert_eq!(doubler.output.get(), 10.0);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod bridge;
pub mod config;
pub mod patterns;
pub mod types;

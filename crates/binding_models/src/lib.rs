//! # Binding Models (L2: Bridged Roles)
//!
//! Abstract roles of the wrapped library, each expressed as a trait with one
//! native implementation and one `Foreign*` implementation whose methods are
//! supplied through [`binding_core::bridge::Override`] slots.
//!
//! This crate provides:
//! - Quotes: `Quote`, `SimpleQuote`, `DerivedQuote`, `CompositeQuote`, `ForeignQuote`
//! - Term structures: `YieldCurve`, `YieldTermStructure`, `FlatForward`, `ForeignYieldCurve`
//! - Instruments: `Instrument`, `PricingEngine`, `FixedCashflows`, `DiscountingEngine`, `ForeignEngine`
//! - Payoffs: `Payoff`, `PlainVanillaPayoff`, `ForeignPayoff`
//! - Processes: `StochasticProcess1D`, `OrnsteinUhlenbeckProcess`, `ForeignProcess`
//! - Calibration: `CalibrationHelper`, `QuoteHelper`, `ForeignCalibrationHelper`
//!
//! ## Design Principles
//!
//! - **Trait objects at the seams**: dependents hold `Rc<dyn Role>` or
//!   `Handle<dyn Role>` and cannot tell native from foreign implementations
//! - **Lazy derived objects**: curves, instruments and helpers cache their
//!   results and recompute on the first query after a notification
//! - **Builder pattern** for foreign implementations

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod calibration;
pub mod error;
pub mod instruments;
pub mod payoffs;
pub mod processes;
pub mod quotes;
pub mod term_structures;

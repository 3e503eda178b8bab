//! The notification graph and everything built directly on it.
//!
//! # Components
//!
//! - [`observable`]: `Observable`, `Observed`, identities
//! - [`observer`]: `Observer`, `Registrations`
//! - [`lazy`]: `LazyObject`, `LazyState`, `LazyForwarding`
//! - [`handle`]: `Handle`, `RelinkableHandle`
//! - [`value`]: `ObservableValue`
//! - [`settings`]: `Settings`, `UpdateGate`
//!
//! Dependency order: observable/observer (leaf) → lazy → domain objects.

pub mod handle;
pub mod lazy;
pub mod observable;
pub mod observer;
pub mod settings;
pub mod value;

pub use handle::{Handle, RelinkableHandle};
pub use lazy::{LazyForwarding, LazyObject, LazyState};
pub use observable::{Observable, ObservableId, Observed, ObserverId};
pub use observer::{Observer, Registrations};
pub use settings::{Settings, UpdateGate};
pub use value::ObservableValue;

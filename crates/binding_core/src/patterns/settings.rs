//! Per-session settings and the update gate.
//!
//! Nothing here is a process-wide singleton. A session creates one
//! [`Settings`] and passes it to whatever needs the evaluation date or the
//! gate; two sessions in one process never see each other's state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use super::lazy::{LazyForwarding, LazyState};
use super::observable::{deliver, Registration};
use super::value::ObservableValue;
use crate::config::SessionConfig;
use crate::types::BindingError;

/// Switch that suspends notification delivery for gated observables.
///
/// With updates disabled, a notification is either dropped or, when the
/// gate was disabled in deferred mode, remembered once per observer and
/// delivered when updates are enabled again.
pub struct UpdateGate {
    updates_enabled: Cell<bool>,
    updates_deferred: Cell<bool>,
    deferred: RefCell<Vec<Registration>>,
}

impl fmt::Debug for UpdateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateGate")
            .field("updates_enabled", &self.updates_enabled.get())
            .field("updates_deferred", &self.updates_deferred.get())
            .field("deferred_count", &self.deferred.borrow().len())
            .finish()
    }
}

impl UpdateGate {
    /// A gate with updates enabled.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            updates_enabled: Cell::new(true),
            updates_deferred: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        })
    }

    /// Stop delivering notifications. With `deferred`, the affected
    /// observers are notified once each on [`enable_updates`](Self::enable_updates).
    pub fn disable_updates(&self, deferred: bool) {
        self.updates_enabled.set(false);
        self.updates_deferred.set(deferred);
        debug!(deferred, "updates disabled");
    }

    /// Resume delivery and flush deferred observers.
    ///
    /// # Errors
    ///
    /// Returns the aggregated failures of the flushed observers.
    pub fn enable_updates(&self) -> Result<(), BindingError> {
        self.updates_enabled.set(true);
        self.updates_deferred.set(false);
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        if pending.is_empty() {
            return Ok(());
        }
        debug!(pending = pending.len(), "flushing deferred notifications");
        deliver(&pending)
    }

    /// Whether notifications are currently delivered.
    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled.get()
    }

    /// Whether suppressed notifications are being remembered.
    pub fn updates_deferred(&self) -> bool {
        self.updates_deferred.get()
    }

    /// Number of observers waiting for a deferred notification.
    pub fn deferred_count(&self) -> usize {
        self.deferred.borrow().len()
    }

    pub(crate) fn hold(&self, snapshot: Vec<Registration>) {
        if !self.updates_deferred.get() {
            return;
        }
        let mut deferred = self.deferred.borrow_mut();
        for registration in snapshot {
            if !deferred.iter().any(|r| r.id == registration.id) {
                deferred.push(registration);
            }
        }
    }
}

/// Session-wide settings shared by the objects of one graph.
pub struct Settings {
    gate: Rc<UpdateGate>,
    evaluation_date: ObservableValue<Option<NaiveDate>>,
    include_reference_date_events: Cell<bool>,
    forwarding: Cell<LazyForwarding>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("evaluation_date", &self.evaluation_date.get())
            .field(
                "include_reference_date_events",
                &self.include_reference_date_events.get(),
            )
            .field("forwarding", &self.forwarding.get())
            .field("gate", &self.gate)
            .finish()
    }
}

impl Settings {
    /// Fresh settings: evaluation date follows the system clock, updates
    /// enabled, lazy objects always forward notifications.
    pub fn new() -> Rc<Self> {
        let gate = UpdateGate::new();
        Rc::new(Self {
            evaluation_date: ObservableValue::with_gate(None, &gate),
            gate,
            include_reference_date_events: Cell::new(false),
            forwarding: Cell::new(LazyForwarding::Always),
        })
    }

    /// Settings initialised from a validated session configuration.
    pub fn from_config(config: &SessionConfig) -> Rc<Self> {
        let gate = UpdateGate::new();
        let forwarding = if config.forward_first_notification_only {
            LazyForwarding::FirstOnly
        } else {
            LazyForwarding::Always
        };
        let settings = Rc::new(Self {
            evaluation_date: ObservableValue::with_gate(config.evaluation_date, &gate),
            gate,
            include_reference_date_events: Cell::new(config.include_reference_date_events),
            forwarding: Cell::new(forwarding),
        });
        info!(
            evaluation_date = %settings.evaluation_date(),
            forwarding = ?settings.forwarding.get(),
            "session settings initialised"
        );
        settings
    }

    /// The gate shared by every observable created through these settings.
    pub fn gate(&self) -> &Rc<UpdateGate> {
        &self.gate
    }

    /// The evaluation date, or today's date when none was set.
    pub fn evaluation_date(&self) -> NaiveDate {
        self.evaluation_date
            .get()
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// The observable evaluation date. Term structures whose reference date
    /// moves with the evaluation date register with it.
    pub fn evaluation_date_value(&self) -> &ObservableValue<Option<NaiveDate>> {
        &self.evaluation_date
    }

    /// Pin the evaluation date and notify dependents.
    ///
    /// # Errors
    ///
    /// Propagates observer failures.
    pub fn set_evaluation_date(&self, date: NaiveDate) -> Result<(), BindingError> {
        debug!(%date, "evaluation date set");
        self.evaluation_date.set(Some(date))
    }

    /// Go back to following the system clock and notify dependents.
    ///
    /// # Errors
    ///
    /// Propagates observer failures.
    pub fn reset_evaluation_date(&self) -> Result<(), BindingError> {
        self.evaluation_date.set(None)
    }

    /// Whether events falling on the reference date count as not yet
    /// happened.
    pub fn include_reference_date_events(&self) -> bool {
        self.include_reference_date_events.get()
    }

    /// See [`include_reference_date_events`](Self::include_reference_date_events).
    pub fn set_include_reference_date_events(&self, include: bool) {
        self.include_reference_date_events.set(include);
    }

    /// Default forwarding policy for lazy objects of this session.
    pub fn forwarding(&self) -> LazyForwarding {
        self.forwarding.get()
    }

    /// Change the default forwarding policy. Already configured objects keep
    /// theirs until [`apply_to`](Self::apply_to) is called again.
    pub fn set_forwarding(&self, forwarding: LazyForwarding) {
        self.forwarding.set(forwarding);
    }

    /// Configure `state` with the session's forwarding policy.
    pub fn apply_to(&self, state: &LazyState) {
        match self.forwarding.get() {
            LazyForwarding::Always => state.always_forward_notifications(),
            LazyForwarding::FirstOnly => state.forward_first_notification_only(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::observable::Observed;
    use crate::patterns::observer::{Observer, Registrations};
    use std::rc::Weak;

    struct Tally {
        registrations: Registrations,
        hits: Cell<u32>,
    }

    impl Tally {
        fn new() -> Rc<Self> {
            Rc::new_cyclic(|weak: &Weak<Tally>| Tally {
                registrations: Registrations::new(weak.clone()),
                hits: Cell::new(0),
            })
        }
    }

    impl Observer for Tally {
        fn update(&self) -> Result<(), BindingError> {
            self.hits.set(self.hits.get() + 1);
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_evaluation_date_notifies() {
        let settings = Settings::new();
        let tally = Tally::new();
        tally
            .registrations
            .register_with(settings.evaluation_date_value().observable());

        settings.set_evaluation_date(date(2024, 6, 3)).unwrap();
        assert_eq!(settings.evaluation_date(), date(2024, 6, 3));
        assert_eq!(tally.hits.get(), 1);

        settings.reset_evaluation_date().unwrap();
        assert_eq!(tally.hits.get(), 2);
    }

    #[test]
    fn test_disabled_updates_are_dropped() {
        let settings = Settings::new();
        let tally = Tally::new();
        tally
            .registrations
            .register_with(settings.evaluation_date_value().observable());

        settings.gate().disable_updates(false);
        settings.set_evaluation_date(date(2024, 1, 2)).unwrap();
        assert_eq!(tally.hits.get(), 0);
        assert_eq!(settings.gate().deferred_count(), 0);

        settings.gate().enable_updates().unwrap();
        assert_eq!(tally.hits.get(), 0);
    }

    #[test]
    fn test_deferred_updates_flush_once() {
        let settings = Settings::new();
        let tally = Tally::new();
        tally
            .registrations
            .register_with(settings.evaluation_date_value().observable());

        settings.gate().disable_updates(true);
        settings.set_evaluation_date(date(2024, 1, 2)).unwrap();
        settings.set_evaluation_date(date(2024, 1, 3)).unwrap();
        assert_eq!(tally.hits.get(), 0);
        assert_eq!(settings.gate().deferred_count(), 1);

        settings.gate().enable_updates().unwrap();
        assert_eq!(tally.hits.get(), 1);
        assert_eq!(settings.gate().deferred_count(), 0);
        assert!(settings.gate().updates_enabled());
    }

    #[test]
    fn test_from_config() {
        let config = SessionConfig {
            evaluation_date: Some(date(2025, 3, 14)),
            include_reference_date_events: true,
            forward_first_notification_only: true,
            ..Default::default()
        };
        let settings = Settings::from_config(&config);
        assert_eq!(settings.evaluation_date(), date(2025, 3, 14));
        assert!(settings.include_reference_date_events());
        assert_eq!(settings.forwarding(), LazyForwarding::FirstOnly);
    }
}

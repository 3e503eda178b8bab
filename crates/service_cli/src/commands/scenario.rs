//! Scenario command implementation
//!
//! Wires quote → flat curve → discounting engine → instrument, then drives
//! the graph the way a session would: a rate bump, a deferred batch of
//! updates and an evaluation date move. After each step it reports the NPV
//! and how many times each lazy object has recalculated.

use std::rc::Rc;

use chrono::{Days, Months, NaiveDate};
use tracing::info;

use binding_core::config::SessionConfig;
use binding_core::patterns::{Handle, LazyObject, Settings};
use binding_models::instruments::{Cashflow, DiscountingEngine, FixedCashflows, Instrument};
use binding_models::quotes::{Quote, SimpleQuote};
use binding_models::term_structures::{FlatForward, YieldTermStructure};

use crate::{CliError, Result};

/// Annual coupons on a notional of 100, with the notional paid at the end.
fn coupon_strip(start: NaiveDate, years: u32, coupon: f64) -> Result<FixedCashflows> {
    let mut flows = Vec::with_capacity(years as usize);
    for k in 1..=years {
        let date = start
            .checked_add_months(Months::new(12 * k))
            .ok_or_else(|| CliError::InvalidArgument(format!("{} years is out of range", years)))?;
        let amount = if k == years {
            100.0 * (1.0 + coupon)
        } else {
            100.0 * coupon
        };
        flows.push(Cashflow::new(date, amount));
    }
    Ok(FixedCashflows::new(flows))
}

fn report(step: &str, npv: f64, curve: &FlatForward, instrument: &Instrument<FixedCashflows>) {
    println!(
        "  {:<28} npv = {:>12.6}   curve calcs = {}   instrument calcs = {}",
        step,
        npv,
        curve.lazy_state().calculation_count(),
        instrument.lazy_state().calculation_count()
    );
}

/// Run the scenario command
pub fn run(
    config: &SessionConfig,
    rate: f64,
    bumped: f64,
    settlement_days: i64,
    years: u32,
    coupon: f64,
) -> Result<()> {
    if years == 0 {
        return Err(CliError::InvalidArgument(
            "at least one coupon year is required".to_string(),
        ));
    }
    if settlement_days < 0 {
        return Err(CliError::InvalidArgument(format!(
            "settlement days must be non-negative, got {}",
            settlement_days
        )));
    }

    let settings = Settings::from_config(config);
    let start = settings.evaluation_date();
    info!(%start, rate, years, "building scenario graph");

    let quote = SimpleQuote::with_gate(Some(rate), settings.gate());
    let curve = FlatForward::moving(
        &settings,
        settlement_days,
        Handle::new(quote.clone() as Rc<dyn Quote>),
    );
    let engine = DiscountingEngine::new(
        Handle::new(curve.clone() as Rc<dyn YieldTermStructure>),
        &settings,
    );
    let instrument = Instrument::new(coupon_strip(start, years, coupon)?, &settings);
    instrument.set_pricing_engine(engine)?;

    println!("Scenario as of {} ({} coupons of {:.2}%)", start, years, coupon * 100.0);

    let npv = instrument.npv()?;
    report(&format!("rate {:.4}", rate), npv, &curve, &instrument);
    let npv = instrument.npv()?;
    report("repeat query", npv, &curve, &instrument);

    quote.set_value(bumped)?;
    let npv = instrument.npv()?;
    report(&format!("bumped to {:.4}", bumped), npv, &curve, &instrument);

    // Several changes inside a deferred batch cost one recalculation.
    settings.gate().disable_updates(true);
    quote.set_value(rate)?;
    quote.set_value(bumped)?;
    quote.set_value(rate)?;
    info!(
        deferred = settings.gate().deferred_count(),
        calculated = instrument.is_calculated(),
        "updates deferred"
    );
    settings.gate().enable_updates()?;
    let npv = instrument.npv()?;
    report("deferred batch released", npv, &curve, &instrument);

    let next = start
        .checked_add_days(Days::new(1))
        .ok_or_else(|| CliError::InvalidArgument(format!("cannot move past {}", start)))?;
    settings.set_evaluation_date(next)?;
    let npv = instrument.npv()?;
    report(&format!("evaluation date {}", next), npv, &curve, &instrument);

    println!(
        "  curve reference date {}   expired = {}",
        curve.reference_date()?,
        instrument.is_expired()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_coupon_strip() {
        let strip = coupon_strip(date(2024, 1, 31), 3, 0.05).unwrap();
        let flows = strip.cashflows();
        assert_eq!(flows.len(), 3);
        assert_eq!(flows[0].date, date(2025, 1, 31));
        assert_eq!(flows[2].date, date(2027, 1, 31));
        assert_eq!(flows[0].amount, 5.0);
        assert_eq!(flows[2].amount, 105.0);
    }

    #[test]
    fn test_run_with_pinned_date() {
        let config = SessionConfig {
            evaluation_date: Some(date(2024, 1, 2)),
            ..SessionConfig::default()
        };
        assert!(run(&config, 0.05, 0.04, 2, 5, 0.05).is_ok());
    }

    #[test]
    fn test_rejects_empty_strip() {
        let config = SessionConfig::default();
        assert!(matches!(
            run(&config, 0.05, 0.04, 0, 0, 0.05),
            Err(CliError::InvalidArgument(_))
        ));
    }
}

//! Pre-built Test Fixtures
//!
//! Ready-to-use, predictable test data for the billing engine. Amounts
//! and dates are fixed so assertions can use exact values.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Actor, DateRange, FixedClock, Money, StaffId, Timezone};
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn consultation_fee() -> Money {
        Money::new(dec!(30.00))
    }

    pub fn lab_fee() -> Money {
        Money::new(dec!(80.00))
    }

    pub fn ward_fee() -> Money {
        Money::new(dec!(500.00))
    }

    pub fn deposit() -> Money {
        Money::new(dec!(300.00))
    }

    pub fn credit_limit() -> Money {
        Money::new(dec!(1000.00))
    }
}

/// Fixture for acting users
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn cashier() -> Actor {
        Actor::new(StaffId::new(), "K. Boateng")
    }

    pub fn finance_officer() -> Actor {
        Actor::new(StaffId::new(), "F. Adjei")
    }

    pub fn clinician() -> Actor {
        Actor::new(StaffId::new(), "Dr. A. Mensah")
    }
}

/// Fixture for instants, clocks and ranges
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The reference instant most tests pin their clock to
    pub fn opening_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    /// A clock pinned to [`Self::opening_time`]
    pub fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Self::opening_time()))
    }

    pub fn opening_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    /// The whole month around the reference instant
    pub fn june() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap()
    }

    pub fn hospital_timezone() -> Timezone {
        Timezone::new(chrono_tz::Africa::Accra)
    }
}

/// Fixture for reasons that satisfy the minimum-length rule
pub struct ReasonFixtures;

impl ReasonFixtures {
    pub fn discount() -> &'static str {
        "Corporate client discount scheme"
    }

    pub fn waiver() -> &'static str {
        "Indigent patient, social welfare approval"
    }

    pub fn void() -> &'static str {
        "Cashier keyed the wrong patient"
    }

    pub fn refund() -> &'static str {
        "Test not performed, machine fault"
    }

    pub fn override_grant() -> &'static str {
        "Emergency case, payment to follow"
    }

    pub fn too_short() -> &'static str {
        "typo"
    }
}

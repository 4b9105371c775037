//! Billing configuration
//!
//! Loaded once at startup (defaults overlaid with `BILLING_`-prefixed
//! environment variables) and passed to the ledger immutably. Nothing
//! reads configuration after construction.

use core_kernel::Timezone;
use serde::{Deserialize, Serialize};

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Whether check-in flows create charges automatically
    pub auto_billing_enabled: bool,
    /// NHIS consultation fee is billed once per patient lifetime
    pub nhis_consultation_fee_once_per_lifetime: bool,
    /// Service-access override window when the caller gives none
    pub default_override_duration_hours: i64,
    /// Hospital-local timezone for receipt and report day boundaries
    pub timezone: Timezone,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            auto_billing_enabled: true,
            nhis_consultation_fee_once_per_lifetime: true,
            default_override_duration_hours: 2,
            timezone: Timezone::default(),
        }
    }
}

impl BillingConfig {
    /// Loads configuration from defaults plus the environment
    ///
    /// `BILLING_AUTO_BILLING_ENABLED=false` disables automatic charge
    /// creation, and so on for each field.
    pub fn load() -> Result<Self, BillingError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&BillingConfig::default())?)
            .add_source(config::Environment::with_prefix("BILLING"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

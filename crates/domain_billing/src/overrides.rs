//! Service-access and billing overrides
//!
//! A service-access override lets one check-in receive one service type
//! for a limited window without paying first. A billing override converts
//! a specific pending charge into an owing charge that stays collectible.

use chrono::{DateTime, Utc};
use core_kernel::{BillingOverrideId, ChargeId, CheckinId, ServiceOverrideId, StaffId};
use serde::{Deserialize, Serialize};

use crate::charge::ServiceType;

/// Time-limited permission to proceed with a service before payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccessOverride {
    pub id: ServiceOverrideId,
    pub checkin_id: CheckinId,
    pub service_type: ServiceType,
    pub authorized_by: StaffId,
    pub reason: String,
    pub is_active: bool,
    pub authorized_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ServiceAccessOverride {
    /// Active and not yet expired at `now`
    ///
    /// Expiry is purely time-based; nothing flips `is_active` when the
    /// window passes, so both conditions must be checked.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Status of a billing override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideStatus {
    Active,
    Revoked,
}

/// Authorization for a specific charge to be owed instead of paid up front
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingOverride {
    pub id: BillingOverrideId,
    pub charge_id: ChargeId,
    pub checkin_id: CheckinId,
    pub service_type: ServiceType,
    pub authorized_by: StaffId,
    pub reason: String,
    pub status: OverrideStatus,
    pub authorized_at: DateTime<Utc>,
}

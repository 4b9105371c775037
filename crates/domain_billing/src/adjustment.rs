//! Bill adjustments
//!
//! Every discount or waiver leaves an immutable [`BillAdjustment`] snapshot
//! next to the audit entry, so the pre-adjustment amount is recoverable
//! without replaying the trail.

use chrono::{DateTime, Utc};
use core_kernel::{AdjustmentId, ChargeId, Money, StaffId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of adjustment applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    DiscountPercentage,
    DiscountFixed,
    Waiver,
}

impl fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdjustmentType::DiscountPercentage => "discount_percentage",
            AdjustmentType::DiscountFixed => "discount_fixed",
            AdjustmentType::Waiver => "waiver",
        };
        write!(f, "{}", name)
    }
}

/// Caller's description of a discount
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscountKind {
    /// Percentage of the current amount, in (0, 100]
    Percentage(Decimal),
    /// Absolute reduction, in (0, amount]
    Fixed(Money),
}

/// Immutable record of one adjustment or waiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillAdjustment {
    pub id: AdjustmentId,
    pub charge_id: ChargeId,
    pub adjustment_type: AdjustmentType,
    pub original_amount: Money,
    pub adjustment_amount: Money,
    pub final_amount: Money,
    pub adjusted_by: StaffId,
    pub reason: String,
    pub adjusted_at: DateTime<Utc>,
}

impl BillAdjustment {
    pub fn new(
        charge_id: ChargeId,
        adjustment_type: AdjustmentType,
        original_amount: Money,
        adjustment_amount: Money,
        adjusted_by: StaffId,
        reason: impl Into<String>,
        adjusted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AdjustmentId::new_v7(),
            charge_id,
            adjustment_type,
            original_amount,
            adjustment_amount,
            final_amount: original_amount - adjustment_amount,
            adjusted_by,
            reason: reason.into(),
            adjusted_at,
        }
    }
}

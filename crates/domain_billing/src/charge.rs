//! Charges and the charge state machine
//!
//! A charge is the unit of billing: one service rendered to one patient
//! during one check-in. Its status walks a fixed state machine; every
//! transition is validated by [`ChargeStatus::can_transition_to`] and no
//! path ever returns to `Pending`.

use chrono::{DateTime, Utc};
use core_kernel::{ChargeId, CheckinId, Money, PatientId, StaffId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BillingError;

/// The service category a charge bills for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Consultation,
    Laboratory,
    Pharmacy,
    Radiology,
    Ward,
    Procedure,
    Other,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceType::Consultation => "consultation",
            ServiceType::Laboratory => "laboratory",
            ServiceType::Pharmacy => "pharmacy",
            ServiceType::Radiology => "radiology",
            ServiceType::Ward => "ward",
            ServiceType::Procedure => "procedure",
            ServiceType::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// How a settlement was tendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Insurance,
    BankTransfer,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Insurance => "insurance",
            PaymentMethod::BankTransfer => "bank_transfer",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle status of a charge
///
/// `Waived`, `Voided` and `Refunded` are terminal. `Paid` can move back
/// to `Partial` only through a partial refund. `Partial` may remain
/// `Partial` across repeated installments and partial refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Partial,
    Paid,
    Owing,
    Waived,
    Voided,
    Refunded,
}

impl ChargeStatus {
    /// Whether this status may transition to `target`
    pub fn can_transition_to(&self, target: ChargeStatus) -> bool {
        use ChargeStatus::*;
        matches!(
            (self, target),
            (Pending, Partial)
                | (Pending, Paid)
                | (Pending, Owing)
                | (Pending, Waived)
                | (Pending, Voided)
                | (Partial, Partial)
                | (Partial, Paid)
                | (Partial, Voided)
                | (Partial, Refunded)
                | (Paid, Partial)
                | (Paid, Voided)
                | (Paid, Refunded)
                | (Owing, Partial)
                | (Owing, Paid)
                | (Owing, Voided)
        )
    }

    /// Whether money can still be collected against this status
    pub fn is_collectible(&self) -> bool {
        matches!(
            self,
            ChargeStatus::Pending | ChargeStatus::Owing | ChargeStatus::Partial
        )
    }

    /// Whether a payment has been recorded and not voided
    pub fn is_settled(&self) -> bool {
        matches!(self, ChargeStatus::Paid | ChargeStatus::Partial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChargeStatus::Waived | ChargeStatus::Voided | ChargeStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Partial => "partial",
            ChargeStatus::Paid => "paid",
            ChargeStatus::Owing => "owing",
            ChargeStatus::Waived => "waived",
            ChargeStatus::Voided => "voided",
            ChargeStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for charge creation
#[derive(Debug, Clone)]
pub struct NewCharge {
    pub checkin_id: CheckinId,
    pub patient_id: PatientId,
    pub department: Option<String>,
    pub service_type: ServiceType,
    pub description: String,
    pub amount: Money,
    pub is_insurance_claim: bool,
    pub insurance_covered_amount: Money,
    pub patient_copay_amount: Money,
    pub notes: Option<String>,
}

impl NewCharge {
    /// A plain cash-patient charge with no insurance split
    pub fn uninsured(
        checkin_id: CheckinId,
        patient_id: PatientId,
        service_type: ServiceType,
        description: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            checkin_id,
            patient_id,
            department: None,
            service_type,
            description: description.into(),
            amount,
            is_insurance_claim: false,
            insurance_covered_amount: Money::zero(),
            patient_copay_amount: Money::zero(),
            notes: None,
        }
    }
}

/// A billable service charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub checkin_id: CheckinId,
    pub patient_id: PatientId,
    pub department: Option<String>,
    pub service_type: ServiceType,
    pub description: String,
    /// Current billable amount (reduced by adjustments)
    pub amount: Money,
    /// Pre-adjustment amount, set once on the first adjustment or waiver
    pub original_amount: Option<Money>,
    pub paid_amount: Money,
    pub adjustment_amount: Money,
    pub status: ChargeStatus,
    pub is_insurance_claim: bool,
    pub insurance_covered_amount: Money,
    pub patient_copay_amount: Money,
    pub is_waived: bool,
    pub waived_by: Option<StaffId>,
    pub waived_at: Option<DateTime<Utc>>,
    pub waiver_reason: Option<String>,
    pub receipt_number: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub processed_by: Option<StaffId>,
    pub charged_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Charge {
    pub fn new(input: NewCharge, status: ChargeStatus, charged_at: DateTime<Utc>) -> Self {
        Self {
            id: ChargeId::new_v7(),
            checkin_id: input.checkin_id,
            patient_id: input.patient_id,
            department: input.department,
            service_type: input.service_type,
            description: input.description,
            amount: input.amount,
            original_amount: None,
            paid_amount: Money::zero(),
            adjustment_amount: Money::zero(),
            status,
            is_insurance_claim: input.is_insurance_claim,
            insurance_covered_amount: input.insurance_covered_amount,
            patient_copay_amount: input.patient_copay_amount,
            is_waived: false,
            waived_by: None,
            waived_at: None,
            waiver_reason: None,
            receipt_number: None,
            payment_method: None,
            processed_by: None,
            charged_at,
            paid_at: None,
            notes: input.notes,
        }
    }

    /// What the patient owes on this charge in total
    ///
    /// Insurance claims bill the patient only the copay; the covered
    /// portion is claimed from the insurer outside this engine.
    pub fn patient_due(&self) -> Money {
        if self.is_insurance_claim {
            self.patient_copay_amount
        } else {
            self.amount
        }
    }

    /// What remains to collect from the patient
    pub fn remaining_due(&self) -> Money {
        (self.patient_due() - self.paid_amount).floor_at_zero()
    }

    /// Moves to a new status, rejecting transitions the state machine
    /// does not allow
    pub fn transition(&mut self, target: ChargeStatus) -> Result<(), BillingError> {
        if !self.status.can_transition_to(target) {
            return Err(BillingError::state_conflict(format!(
                "Charge {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }
        self.status = target;
        Ok(())
    }

    /// Records the pre-adjustment amount, keeping the first value
    pub fn snapshot_original_amount(&mut self) {
        if self.original_amount.is_none() {
            self.original_amount = Some(self.amount);
        }
    }
}

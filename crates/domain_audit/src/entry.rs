//! Audit entries and actions

use chrono::{DateTime, Utc};
use core_kernel::{Actor, AuditEntryId, ChargeId, PatientId, StaffId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diff::AuditDiff;

/// The kind of state-changing action being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ChargeCreated,
    Payment,
    Void,
    Refund,
    Adjustment,
    Waiver,
    Override,
    Deposit,
    Withdrawal,
    AccountPayment,
    AccountAdjustment,
    CreditLimitChange,
    CreditTagAdded,
    CreditTagRemoved,
    ReceiptPrinted,
    StatementGenerated,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::ChargeCreated => "charge_created",
            AuditAction::Payment => "payment",
            AuditAction::Void => "void",
            AuditAction::Refund => "refund",
            AuditAction::Adjustment => "adjustment",
            AuditAction::Waiver => "waiver",
            AuditAction::Override => "override",
            AuditAction::Deposit => "deposit",
            AuditAction::Withdrawal => "withdrawal",
            AuditAction::AccountPayment => "account_payment",
            AuditAction::AccountAdjustment => "account_adjustment",
            AuditAction::CreditLimitChange => "credit_limit_change",
            AuditAction::CreditTagAdded => "credit_tag_added",
            AuditAction::CreditTagRemoved => "credit_tag_removed",
            AuditAction::ReceiptPrinted => "receipt_printed",
            AuditAction::StatementGenerated => "statement_generated",
        };
        write!(f, "{}", name)
    }
}

/// One immutable row in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    /// Who performed the action
    pub user_id: StaffId,
    pub user_name: String,
    /// Set for charge-level actions
    pub charge_id: Option<ChargeId>,
    /// Set for patient-level actions
    pub patient_id: Option<PatientId>,
    /// Typed before/after diff
    pub diff: AuditDiff,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// JSON projection of the "before" state, for the storage column
    pub fn old_values(&self) -> serde_json::Value {
        self.diff.old_values()
    }

    /// JSON projection of the "after" state, for the storage column
    pub fn new_values(&self) -> serde_json::Value {
        self.diff.new_values()
    }
}

/// Input to [`crate::AuditTrail::log`]
///
/// Built by the operation that performs the mutation; the trail assigns
/// the id and timestamp.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub actor: Actor,
    pub charge_id: Option<ChargeId>,
    pub patient_id: Option<PatientId>,
    pub diff: AuditDiff,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, actor: Actor, diff: AuditDiff) -> Self {
        Self {
            action,
            actor,
            charge_id: None,
            patient_id: None,
            diff,
            reason: None,
            ip_address: None,
        }
    }

    pub fn for_charge(mut self, charge_id: ChargeId) -> Self {
        self.charge_id = Some(charge_id);
        self
    }

    pub fn for_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

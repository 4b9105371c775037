//! Typed before/after diffs for audit entries
//!
//! Each action kind carries exactly the fields that changed, as a tagged
//! variant. Statuses are recorded by name so the trail does not depend on
//! the billing domain's types. `old_values()`/`new_values()` project the
//! variant into the generic JSON columns used by storage.

use chrono::NaiveDate;
use core_kernel::Money;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What changed, per action kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDiff {
    /// Charge created (initial state only; there is no "before")
    ChargeCreated {
        amount: Money,
        status: String,
    },
    /// Discount applied to a pending charge
    Adjustment {
        original_amount: Money,
        adjustment_amount: Money,
        final_amount: Money,
    },
    /// Charge waived in full
    Waiver {
        original_amount: Money,
        final_amount: Money,
    },
    /// Charge settled against a payment
    Settlement {
        amount_paid: Money,
        old_status: String,
        new_status: String,
        receipt_number: Option<String>,
    },
    /// Settled payment voided
    Void {
        old_status: String,
        new_status: String,
    },
    /// Settled payment refunded (fully or partially)
    Refund {
        refund_amount: Money,
        old_paid_amount: Money,
        new_paid_amount: Money,
        old_status: String,
        new_status: String,
    },
    /// Charge marked owing under a billing override
    Override {
        old_status: String,
        new_status: String,
    },
    /// Credit tag granted or withdrawn
    CreditTag {
        credit_limit: Money,
    },
    /// Patient account balance movement
    AccountBalance {
        transaction_type: String,
        amount: Money,
        balance_before: Money,
        balance_after: Money,
    },
    /// A receipt was printed
    ReceiptPrinted {
        receipt_number: String,
    },
    /// A patient statement was generated
    StatementGenerated {
        period_start: NaiveDate,
        period_end: NaiveDate,
    },
}

impl AuditDiff {
    /// The "before" projection for the storage `old_values` column
    pub fn old_values(&self) -> Value {
        match self {
            AuditDiff::ChargeCreated { .. } => Value::Null,
            AuditDiff::Adjustment {
                original_amount, ..
            } => json!({ "amount": original_amount }),
            AuditDiff::Waiver {
                original_amount, ..
            } => json!({ "amount": original_amount, "status": "pending" }),
            AuditDiff::Settlement { old_status, .. } => json!({ "status": old_status }),
            AuditDiff::Void { old_status, .. } => json!({ "status": old_status }),
            AuditDiff::Refund {
                old_paid_amount,
                old_status,
                ..
            } => json!({ "paid_amount": old_paid_amount, "status": old_status }),
            AuditDiff::Override { old_status, .. } => json!({ "status": old_status }),
            AuditDiff::CreditTag { .. } => Value::Null,
            AuditDiff::AccountBalance { balance_before, .. } => {
                json!({ "balance": balance_before })
            }
            AuditDiff::ReceiptPrinted { .. } => Value::Null,
            AuditDiff::StatementGenerated { .. } => Value::Null,
        }
    }

    /// The "after" projection for the storage `new_values` column
    pub fn new_values(&self) -> Value {
        match self {
            AuditDiff::ChargeCreated { amount, status } => {
                json!({ "amount": amount, "status": status })
            }
            AuditDiff::Adjustment {
                adjustment_amount,
                final_amount,
                ..
            } => json!({ "adjustment_amount": adjustment_amount, "amount": final_amount }),
            AuditDiff::Waiver { final_amount, .. } => {
                json!({ "amount": final_amount, "status": "waived" })
            }
            AuditDiff::Settlement {
                amount_paid,
                new_status,
                receipt_number,
                ..
            } => json!({
                "paid_amount": amount_paid,
                "status": new_status,
                "receipt_number": receipt_number,
            }),
            AuditDiff::Void { new_status, .. } => json!({ "status": new_status }),
            AuditDiff::Refund {
                refund_amount,
                new_paid_amount,
                new_status,
                ..
            } => json!({
                "refund_amount": refund_amount,
                "paid_amount": new_paid_amount,
                "status": new_status,
            }),
            AuditDiff::Override { new_status, .. } => json!({ "status": new_status }),
            AuditDiff::CreditTag { credit_limit } => json!({ "credit_limit": credit_limit }),
            AuditDiff::AccountBalance {
                transaction_type,
                amount,
                balance_after,
                ..
            } => json!({
                "transaction_type": transaction_type,
                "amount": amount,
                "balance": balance_after,
            }),
            AuditDiff::ReceiptPrinted { receipt_number } => {
                json!({ "receipt_number": receipt_number })
            }
            AuditDiff::StatementGenerated {
                period_start,
                period_end,
            } => json!({ "period_start": period_start, "period_end": period_end }),
        }
    }
}

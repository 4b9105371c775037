//! Patient accounts and account transactions
//!
//! The account balance is signed: positive is a deposit held on the
//! patient's behalf, negative is money the patient owes. Credit privilege
//! (a positive limit or a credit tag) is an eligibility signal read at
//! service time; it is never auto-deducted.

use chrono::{DateTime, Utc};
use core_kernel::{AccountId, ChargeId, Money, PatientId, StaffId, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A patient's deposit/credit account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientAccount {
    pub id: AccountId,
    pub patient_id: PatientId,
    /// Signed balance: positive = deposit held, negative = owed
    pub balance: Money,
    pub credit_limit: Money,
    pub credit_tagged: bool,
    pub credit_authorized_by: Option<StaffId>,
    pub credit_authorized_at: Option<DateTime<Utc>>,
    pub credit_reason: Option<String>,
    pub is_active: bool,
    pub opened_at: DateTime<Utc>,
}

impl PatientAccount {
    pub fn open(patient_id: PatientId, opened_at: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new_v7(),
            patient_id,
            balance: Money::zero(),
            credit_limit: Money::zero(),
            credit_tagged: false,
            credit_authorized_by: None,
            credit_authorized_at: None,
            credit_reason: None,
            is_active: true,
            opened_at,
        }
    }

    /// Deposit held for the patient (zero when the balance is owed)
    pub fn deposit_balance(&self) -> Money {
        self.balance.floor_at_zero()
    }

    /// What the patient owes the hospital (zero when in deposit)
    pub fn amount_owed(&self) -> Money {
        (-self.balance).floor_at_zero()
    }

    /// Credit headroom left before the limit is exhausted
    pub fn remaining_credit(&self) -> Money {
        (self.credit_limit - self.amount_owed()).floor_at_zero()
    }

    /// Whether the patient may receive service on credit
    pub fn has_credit_privilege(&self) -> bool {
        self.is_active && (self.credit_tagged || self.credit_limit.is_positive())
    }

    /// Read-only projection for display and service checks
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            patient_id: self.patient_id,
            balance: self.balance,
            deposit_balance: self.deposit_balance(),
            amount_owed: self.amount_owed(),
            credit_limit: self.credit_limit,
            remaining_credit: self.remaining_credit(),
            has_credit_privilege: self.has_credit_privilege(),
        }
    }
}

/// Snapshot of an account's derived figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub patient_id: PatientId,
    pub balance: Money,
    pub deposit_balance: Money,
    pub amount_owed: Money,
    pub credit_limit: Money,
    pub remaining_credit: Money,
    pub has_credit_privilege: bool,
}

/// The kind of account movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Payment,
    Adjustment,
    Withdrawal,
    ChargeDeduction,
    CreditLimitChange,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Payment => "payment",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::ChargeDeduction => "charge_deduction",
            TransactionType::CreditLimitChange => "credit_limit_change",
        };
        write!(f, "{}", name)
    }
}

/// One immutable account movement
///
/// `balance_after` is the account balance at the instant after this
/// transaction; replaying transactions in order reproduces the balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub patient_id: PatientId,
    pub transaction_type: TransactionType,
    /// Signed movement applied to the balance
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    /// Set for deductions applied against a specific charge
    pub charge_id: Option<ChargeId>,
    pub processed_by: StaffId,
    pub notes: Option<String>,
    pub transacted_at: DateTime<Utc>,
}

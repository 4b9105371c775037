//! End-of-day cash reconciliation
//!
//! A finance officer counts a cashier's physical drawer and records it
//! against the system's settled-cash total for that day. Any variance
//! must be explained, and a cashier's day can only be reconciled once.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{
    Actor, AuthorizationContext, Money, Permission, ReconciliationId, StaffId,
};
use domain_billing::BillingLedger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::ReportError;

/// Variance between the counted drawer and the system total
pub fn calculate_variance(system_total: Money, physical_count: Money) -> Money {
    physical_count - system_total
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Balanced,
    Variance,
}

/// One cashier-day reconciliation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub id: ReconciliationId,
    pub cashier_id: StaffId,
    pub finance_officer_id: StaffId,
    pub reconciliation_date: NaiveDate,
    pub system_total: Money,
    pub physical_count: Money,
    pub variance: Money,
    pub variance_reason: Option<String>,
    pub status: ReconciliationStatus,
    pub reconciled_at: DateTime<Utc>,
}

/// Input for an explicit-total reconciliation
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    pub cashier_id: StaffId,
    pub reconciliation_date: NaiveDate,
    pub system_total: Money,
    pub physical_count: Money,
    pub variance_reason: Option<String>,
}

/// Holds reconciliation records, one per cashier per day
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    records: HashMap<(StaffId, NaiveDate), Reconciliation>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reconciliation with a caller-supplied system total
    pub fn create_reconciliation(
        &mut self,
        ctx: &dyn AuthorizationContext,
        officer: &Actor,
        input: NewReconciliation,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationId, ReportError> {
        if !ctx.has(Permission::ReconcileCash) {
            return Err(ReportError::Unauthorized(Permission::ReconcileCash));
        }
        let key = (input.cashier_id, input.reconciliation_date);
        if self.records.contains_key(&key) {
            warn!(cashier = %input.cashier_id, date = %input.reconciliation_date, "duplicate reconciliation rejected");
            return Err(ReportError::state_conflict(format!(
                "Cashier {} has already been reconciled for {}",
                input.cashier_id, input.reconciliation_date
            )));
        }

        let variance = calculate_variance(input.system_total, input.physical_count);
        let reason = input
            .variance_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        if !variance.is_zero() && reason.is_none() {
            return Err(ReportError::validation(
                "A variance reason is required when the count does not balance",
            ));
        }
        let status = if variance.is_zero() {
            ReconciliationStatus::Balanced
        } else {
            ReconciliationStatus::Variance
        };

        let id = ReconciliationId::new_v7();
        self.records.insert(
            key,
            Reconciliation {
                id,
                cashier_id: input.cashier_id,
                finance_officer_id: officer.id,
                reconciliation_date: input.reconciliation_date,
                system_total: input.system_total,
                physical_count: input.physical_count,
                variance,
                variance_reason: reason,
                status,
                reconciled_at: now,
            },
        );
        info!(
            cashier = %input.cashier_id,
            date = %input.reconciliation_date,
            %variance,
            status = ?status,
            "cashier reconciled"
        );
        Ok(id)
    }

    /// Reconciles a cashier against the ledger's own settled-cash total
    ///
    /// The system total comes from the ledger, not the caller, so a
    /// mistyped figure cannot mask a shortage.
    pub fn reconcile_cashier(
        &mut self,
        ctx: &dyn AuthorizationContext,
        officer: &Actor,
        ledger: &BillingLedger,
        cashier_id: StaffId,
        date: NaiveDate,
        physical_count: Money,
        variance_reason: Option<String>,
    ) -> Result<ReconciliationId, ReportError> {
        let system_total = ledger.settled_cash_total(cashier_id, date);
        self.create_reconciliation(
            ctx,
            officer,
            NewReconciliation {
                cashier_id,
                reconciliation_date: date,
                system_total,
                physical_count,
                variance_reason,
            },
            ledger.now(),
        )
    }

    pub fn record_for(&self, cashier_id: StaffId, date: NaiveDate) -> Option<&Reconciliation> {
        self.records.get(&(cashier_id, date))
    }

    pub fn records(&self) -> impl Iterator<Item = &Reconciliation> {
        self.records.values()
    }
}

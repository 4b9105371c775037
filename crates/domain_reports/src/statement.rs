//! Patient statements
//!
//! A statement is a pure read over the ledger: charges and payments
//! within the period, bracketed by an opening balance derived from
//! pre-period activity. The arithmetic is exact:
//! `closing = opening + total_charges - total_paid`.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{AuthorizationContext, DateRange, Money, PatientId, Permission};
use domain_billing::{BillingLedger, Charge, ChargeStatus, PaymentMethod, ServiceType};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementCharge {
    pub charge_id: core_kernel::ChargeId,
    pub date: NaiveDate,
    pub service_type: ServiceType,
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPayment {
    pub charge_id: core_kernel::ChargeId,
    pub date: NaiveDate,
    pub receipt_number: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementData {
    pub patient_id: PatientId,
    pub period: DateRange,
    pub opening_balance: Money,
    pub charges: Vec<StatementCharge>,
    pub payments: Vec<StatementPayment>,
    pub total_charges: Money,
    pub total_paid: Money,
    pub closing_balance: Money,
    pub generated_at: DateTime<Utc>,
}

/// What the patient effectively owes on a charge for statement purposes
///
/// Voided and waived charges contribute nothing.
fn effective_due(charge: &Charge) -> Money {
    match charge.status {
        ChargeStatus::Voided | ChargeStatus::Waived => Money::zero(),
        _ => charge.patient_due(),
    }
}

/// Builds a statement for one patient over an inclusive period
pub fn patient_statement(
    ctx: &dyn AuthorizationContext,
    ledger: &BillingLedger,
    patient_id: PatientId,
    period: DateRange,
) -> Result<StatementData, ReportError> {
    if !ctx.has(Permission::ViewReports) {
        return Err(ReportError::Unauthorized(Permission::ViewReports));
    }

    let tz = ledger.config().timezone;
    let mut opening_balance = Money::zero();
    let mut charges = Vec::new();
    let mut payments = Vec::new();
    let mut total_charges = Money::zero();
    let mut total_paid = Money::zero();

    for charge in ledger.charges_for_patient(patient_id) {
        if charge.status == ChargeStatus::Voided {
            continue;
        }
        let charged_on = tz.local_date(charge.charged_at);
        if charged_on < period.start {
            opening_balance += effective_due(charge);
        } else if period.contains(charged_on) {
            let amount = effective_due(charge);
            total_charges += amount;
            charges.push(StatementCharge {
                charge_id: charge.id,
                date: charged_on,
                service_type: charge.service_type,
                description: charge.description.clone(),
                amount,
            });
        }

        if let Some(paid_at) = charge.paid_at {
            if charge.paid_amount.is_zero() {
                continue;
            }
            let paid_on = tz.local_date(paid_at);
            if paid_on < period.start {
                opening_balance -= charge.paid_amount;
            } else if period.contains(paid_on) {
                total_paid += charge.paid_amount;
                payments.push(StatementPayment {
                    charge_id: charge.id,
                    date: paid_on,
                    receipt_number: charge.receipt_number.clone(),
                    payment_method: charge.payment_method,
                    amount: charge.paid_amount,
                });
            }
        }
    }

    Ok(StatementData {
        patient_id,
        period,
        opening_balance,
        closing_balance: opening_balance + total_charges - total_paid,
        charges,
        payments,
        total_charges,
        total_paid,
        generated_at: ledger.now(),
    })
}

//! Accounts-receivable aging
//!
//! Outstanding charges are bucketed by how long they have been unpaid,
//! counted in hospital-local days from the charge date. Boundaries are
//! inclusive on the low side: day 30 is still current, day 31 ages into
//! the next bucket.

use chrono::NaiveDate;
use core_kernel::{AuthorizationContext, Money, PatientId, Permission};
use domain_billing::BillingLedger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days30,
    Days60,
    Days90Plus,
}

/// The bucket for a given age in days
pub fn bucket_for(days_outstanding: i64) -> AgingBucket {
    if days_outstanding <= 30 {
        AgingBucket::Current
    } else if days_outstanding <= 60 {
        AgingBucket::Days30
    } else if days_outstanding <= 90 {
        AgingBucket::Days60
    } else {
        AgingBucket::Days90Plus
    }
}

/// Outstanding money split across the four buckets
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgingBuckets {
    pub current: Money,
    pub days_30: Money,
    pub days_60: Money,
    pub days_90_plus: Money,
}

impl AgingBuckets {
    pub fn add(&mut self, bucket: AgingBucket, amount: Money) {
        match bucket {
            AgingBucket::Current => self.current += amount,
            AgingBucket::Days30 => self.days_30 += amount,
            AgingBucket::Days60 => self.days_60 += amount,
            AgingBucket::Days90Plus => self.days_90_plus += amount,
        }
    }

    pub fn total(&self) -> Money {
        self.current + self.days_30 + self.days_60 + self.days_90_plus
    }
}

/// One patient's aged receivables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientAging {
    pub patient_id: PatientId,
    pub buckets: AgingBuckets,
    pub total_outstanding: Money,
}

/// The aging report as of a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub patients: Vec<PatientAging>,
    pub summary: AgingBuckets,
    pub total_outstanding: Money,
}

/// Builds the aging report over every outstanding charge in the ledger
pub fn aging_report(
    ctx: &dyn AuthorizationContext,
    ledger: &BillingLedger,
    as_of: NaiveDate,
) -> Result<AgingReport, ReportError> {
    if !ctx.has(Permission::ViewReports) {
        return Err(ReportError::Unauthorized(Permission::ViewReports));
    }

    let tz = ledger.config().timezone;
    let mut per_patient: BTreeMap<PatientId, AgingBuckets> = BTreeMap::new();
    for charge in ledger.charges() {
        if !charge.status.is_collectible() {
            continue;
        }
        let due = charge.remaining_due();
        if !due.is_positive() {
            continue;
        }
        let age = (as_of - tz.local_date(charge.charged_at)).num_days();
        per_patient
            .entry(charge.patient_id)
            .or_default()
            .add(bucket_for(age), due);
    }

    let mut summary = AgingBuckets::default();
    let patients: Vec<PatientAging> = per_patient
        .into_iter()
        .map(|(patient_id, buckets)| {
            summary.add(AgingBucket::Current, buckets.current);
            summary.add(AgingBucket::Days30, buckets.days_30);
            summary.add(AgingBucket::Days60, buckets.days_60);
            summary.add(AgingBucket::Days90Plus, buckets.days_90_plus);
            PatientAging {
                patient_id,
                buckets,
                total_outstanding: buckets.total(),
            }
        })
        .collect();

    Ok(AgingReport {
        as_of,
        total_outstanding: summary.total(),
        summary,
        patients,
    })
}

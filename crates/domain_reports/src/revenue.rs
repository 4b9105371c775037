//! Revenue reporting
//!
//! Revenue counts fully paid charges only, keyed by the hospital-local
//! day they were paid. Grouped figures always partition the summary:
//! group totals sum to the report total and group counts to the report
//! count, whichever dimension is chosen.

use core_kernel::{AuthorizationContext, DateRange, Money, Permission};
use domain_billing::{BillingLedger, Charge, ChargeStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ReportError;

/// Dimension to group revenue by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueGroupBy {
    Date,
    Department,
    ServiceType,
    Cashier,
    PaymentMethod,
}

/// One group's slice of the revenue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueGroup {
    pub key: String,
    pub total: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub total: Money,
    pub count: usize,
    /// Mean paid amount per charge, zero when there were none
    pub average: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueReport {
    pub range: DateRange,
    pub group_by: RevenueGroupBy,
    pub groups: Vec<RevenueGroup>,
    pub summary: RevenueSummary,
}

/// Builds the revenue report for an inclusive date range
pub fn revenue_report(
    ctx: &dyn AuthorizationContext,
    ledger: &BillingLedger,
    range: DateRange,
    group_by: RevenueGroupBy,
) -> Result<RevenueReport, ReportError> {
    if !ctx.has(Permission::ViewReports) {
        return Err(ReportError::Unauthorized(Permission::ViewReports));
    }

    let tz = ledger.config().timezone;
    let mut grouped: BTreeMap<String, (Money, usize)> = BTreeMap::new();
    let mut total = Money::zero();
    let mut count = 0usize;

    for charge in ledger.charges() {
        if charge.status != ChargeStatus::Paid {
            continue;
        }
        let Some(paid_at) = charge.paid_at else {
            continue;
        };
        if !range.contains(tz.local_date(paid_at)) {
            continue;
        }

        let key = group_key(charge, group_by, tz);
        let entry = grouped.entry(key).or_insert((Money::zero(), 0));
        entry.0 += charge.paid_amount;
        entry.1 += 1;
        total += charge.paid_amount;
        count += 1;
    }

    let average = if count == 0 {
        Money::zero()
    } else {
        total
            .divide(Decimal::from(count as u64))
            .expect("count is nonzero")
    };

    Ok(RevenueReport {
        range,
        group_by,
        groups: grouped
            .into_iter()
            .map(|(key, (total, count))| RevenueGroup { key, total, count })
            .collect(),
        summary: RevenueSummary {
            total,
            count,
            average,
        },
    })
}

fn group_key(charge: &Charge, group_by: RevenueGroupBy, tz: core_kernel::Timezone) -> String {
    match group_by {
        RevenueGroupBy::Date => charge
            .paid_at
            .map(|at| tz.local_date(at).to_string())
            .unwrap_or_default(),
        RevenueGroupBy::Department => charge
            .department
            .clone()
            .unwrap_or_else(|| "unassigned".to_string()),
        RevenueGroupBy::ServiceType => charge.service_type.to_string(),
        RevenueGroupBy::Cashier => charge
            .processed_by
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        RevenueGroupBy::PaymentMethod => charge
            .payment_method
            .map(|m| m.to_string())
            .unwrap_or_else(|| "deposit".to_string()),
    }
}

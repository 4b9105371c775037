//! Reports Domain - reconciliation, aging, revenue and statements
//!
//! Everything in this crate is a read over [`domain_billing::BillingLedger`]
//! except reconciliation, which records one immutable result per cashier
//! per day.

pub mod aging;
pub mod error;
pub mod reconciliation;
pub mod revenue;
pub mod statement;

pub use aging::{aging_report, bucket_for, AgingBucket, AgingBuckets, AgingReport, PatientAging};
pub use error::ReportError;
pub use reconciliation::{
    calculate_variance, NewReconciliation, Reconciliation, ReconciliationEngine,
    ReconciliationStatus,
};
pub use revenue::{revenue_report, RevenueGroup, RevenueGroupBy, RevenueReport, RevenueSummary};
pub use statement::{patient_statement, StatementCharge, StatementData, StatementPayment};

//! Billing Domain - charges, payments, patient accounts and overrides
//!
//! The entry point is [`BillingLedger`], an aggregate that owns every
//! billing record plus the audit trail and exposes each operation as one
//! atomic unit. Charges move through a fixed state machine
//! ([`ChargeStatus`]); money is exact decimal ([`core_kernel::Money`]);
//! every successful mutation is audited, and nothing is audited on
//! failure.

pub mod account;
pub mod adjustment;
pub mod charge;
pub mod config;
pub mod error;
pub mod ledger;
pub mod overrides;
pub mod receipt;

pub use account::{AccountSummary, AccountTransaction, PatientAccount, TransactionType};
pub use adjustment::{AdjustmentType, BillAdjustment, DiscountKind};
pub use charge::{Charge, ChargeStatus, NewCharge, PaymentMethod, ServiceType};
pub use config::BillingConfig;
pub use error::BillingError;
pub use ledger::{calculate_change, BillingLedger, SettlementOutcome};
pub use overrides::{BillingOverride, OverrideStatus, ServiceAccessOverride};
pub use receipt::{is_valid_receipt_number, ReceiptNumberGenerator};

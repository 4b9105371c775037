//! Core Kernel - shared types for the billing engine
//!
//! This crate provides the foundation the domain crates build on:
//!
//! - `money`: precise decimal money arithmetic (no floating point)
//! - `identifiers`: strongly-typed UUID identifiers
//! - `temporal`: clock abstraction and hospital-local day boundaries
//! - `auth`: explicit authorization capability passed into every operation

pub mod auth;
pub mod identifiers;
pub mod money;
pub mod temporal;

pub use auth::{Actor, AuthorizationContext, Permission, PermissionSet};
pub use identifiers::{
    AccountId, AdjustmentId, AuditEntryId, BillingOverrideId, ChargeId, CheckinId, PatientId,
    ReconciliationId, ServiceOverrideId, StaffId, TransactionId,
};
pub use money::{Money, MoneyError, Rate};
pub use temporal::{Clock, DateRange, FixedClock, SystemClock, Timezone};

//! Authorization capability
//!
//! Every mutating billing operation receives an [`AuthorizationContext`]
//! and checks it before touching any state. There is no ambient
//! current-user singleton: the capability object and the acting user's
//! identity are threaded through explicitly, and a denial short-circuits
//! before any mutation or audit write.

use crate::identifiers::StaffId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Fine-grained billing permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create charges and collect payments
    CollectPayments,
    /// Apply discounts to pending charges
    AdjustCharges,
    /// Waive charges entirely
    WaiveCharges,
    /// Void settled payments
    VoidPayments,
    /// Refund settled payments
    RefundPayments,
    /// Authorize service-access and billing overrides
    AuthorizeOverrides,
    /// Deposit/withdraw/adjust patient accounts
    ManageAccounts,
    /// Grant credit limits and credit tags
    ManageCredit,
    /// Reconcile cashier drawers
    ReconcileCash,
    /// Read aging/revenue reports and statements
    ViewReports,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::CollectPayments => "billing.collect",
            Permission::AdjustCharges => "billing.adjust",
            Permission::WaiveCharges => "billing.waive",
            Permission::VoidPayments => "billing.void",
            Permission::RefundPayments => "billing.refund",
            Permission::AuthorizeOverrides => "billing.override",
            Permission::ManageAccounts => "billing.accounts",
            Permission::ManageCredit => "billing.credit",
            Permission::ReconcileCash => "billing.reconcile",
            Permission::ViewReports => "billing.reports",
        };
        write!(f, "{}", name)
    }
}

/// Capability object answering "may this caller do X?"
///
/// Implementations live with the surrounding application (role storage is
/// out of scope here); the domain only ever asks `has`.
pub trait AuthorizationContext {
    fn has(&self, permission: Permission) -> bool;
}

/// Simple set-backed authorization context
///
/// Useful for tests and for callers that resolve a user's permissions up
/// front.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    granted: HashSet<Permission>,
}

impl PermissionSet {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            granted: granted.into_iter().collect(),
        }
    }

    /// Grants every permission
    pub fn allow_all() -> Self {
        Self::new([
            Permission::CollectPayments,
            Permission::AdjustCharges,
            Permission::WaiveCharges,
            Permission::VoidPayments,
            Permission::RefundPayments,
            Permission::AuthorizeOverrides,
            Permission::ManageAccounts,
            Permission::ManageCredit,
            Permission::ReconcileCash,
            Permission::ViewReports,
        ])
    }

    /// Grants nothing
    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, permission: Permission) {
        self.granted.insert(permission);
    }

    pub fn revoke(&mut self, permission: Permission) {
        self.granted.remove(&permission);
    }
}

impl AuthorizationContext for PermissionSet {
    fn has(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

/// The user performing an operation
///
/// Threaded through every call so audit entries can record who acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: StaffId,
    pub name: String,
}

impl Actor {
    pub fn new(id: StaffId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

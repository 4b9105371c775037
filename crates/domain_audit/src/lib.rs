//! Audit Domain - append-only record of every state-changing action
//!
//! Every mutation to a charge or patient account is matched by exactly one
//! audit entry written inside the same atomic unit as the mutation itself.
//! The trail exposes no update or delete operation; history can only grow.
//!
//! Diffs are typed per action kind ([`AuditDiff`]) and are projected to
//! generic JSON `old_values`/`new_values` bags only at the persistence
//! boundary.

pub mod diff;
pub mod entry;
pub mod trail;

pub use diff::AuditDiff;
pub use entry::{AuditAction, AuditEntry, AuditRecord};
pub use trail::AuditTrail;

//! The append-only audit trail

use chrono::{DateTime, Utc};
use core_kernel::{AuditEntryId, ChargeId, PatientId};
use tracing::debug;

use crate::entry::{AuditAction, AuditEntry, AuditRecord};

/// Append-only log of every state-changing billing action
///
/// # Invariants
///
/// - Entries are never updated or deleted; the only mutation is `log`
/// - Entries are ordered by creation
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, returning its id
    ///
    /// Called by every mutating operation inside the same atomic unit as
    /// the mutation it describes.
    pub fn log(&mut self, record: AuditRecord, at: DateTime<Utc>) -> AuditEntryId {
        let id = AuditEntryId::new_v7();
        debug!(action = %record.action, actor = %record.actor.id, "audit entry appended");

        self.entries.push(AuditEntry {
            id,
            action: record.action,
            user_id: record.actor.id,
            user_name: record.actor.name,
            charge_id: record.charge_id,
            patient_id: record.patient_id,
            diff: record.diff,
            reason: record.reason,
            ip_address: record.ip_address,
            created_at: at,
        });

        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in creation order
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn get(&self, id: AuditEntryId) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries for one charge, in creation order
    pub fn for_charge(&self, charge_id: ChargeId) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.charge_id == Some(charge_id))
            .collect()
    }

    /// Entries for one patient, in creation order
    pub fn for_patient(&self, patient_id: PatientId) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.patient_id == Some(patient_id))
            .collect()
    }

    /// Entries with a given action, in creation order
    pub fn by_action(&self, action: AuditAction) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == action)
            .collect()
    }

    /// The most recent entry, if any
    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }
}

//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults,
//! so tests only spell out the fields they care about.

use core_kernel::{Actor, CheckinId, FixedClock, Money, PatientId, PermissionSet, StaffId};
use domain_billing::{BillingConfig, BillingLedger, NewCharge, ServiceType};
use fake::faker::name::en::Name;
use fake::Fake;
use std::sync::Arc;

use crate::fixtures::{MoneyFixtures, TemporalFixtures};

/// Builder for [`NewCharge`] inputs
pub struct ChargeBuilder {
    checkin_id: CheckinId,
    patient_id: PatientId,
    department: Option<String>,
    service_type: ServiceType,
    description: String,
    amount: Money,
    is_insurance_claim: bool,
    insurance_covered_amount: Money,
    patient_copay_amount: Money,
}

impl Default for ChargeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargeBuilder {
    pub fn new() -> Self {
        Self {
            checkin_id: CheckinId::new(),
            patient_id: PatientId::new(),
            department: None,
            service_type: ServiceType::Laboratory,
            description: "Full blood count".to_string(),
            amount: MoneyFixtures::lab_fee(),
            is_insurance_claim: false,
            insurance_covered_amount: Money::zero(),
            patient_copay_amount: Money::zero(),
        }
    }

    pub fn for_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = patient_id;
        self
    }

    pub fn on_checkin(mut self, checkin_id: CheckinId) -> Self {
        self.checkin_id = checkin_id;
        self
    }

    pub fn service(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the charge as an insurance claim with the given split
    pub fn insured(mut self, covered: Money, copay: Money) -> Self {
        self.is_insurance_claim = true;
        self.insurance_covered_amount = covered;
        self.patient_copay_amount = copay;
        self.amount = covered + copay;
        self
    }

    pub fn build(self) -> NewCharge {
        NewCharge {
            checkin_id: self.checkin_id,
            patient_id: self.patient_id,
            department: self.department,
            service_type: self.service_type,
            description: self.description,
            amount: self.amount,
            is_insurance_claim: self.is_insurance_claim,
            insurance_covered_amount: self.insurance_covered_amount,
            patient_copay_amount: self.patient_copay_amount,
            notes: None,
        }
    }
}

/// Builder for a ledger wired to a pinned clock
pub struct LedgerBuilder {
    config: BillingConfig,
    clock: Arc<FixedClock>,
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self {
            config: BillingConfig::default(),
            clock: TemporalFixtures::clock(),
        }
    }

    pub fn with_config(mut self, config: BillingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<FixedClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn auto_billing_disabled(mut self) -> Self {
        self.config.auto_billing_enabled = false;
        self
    }

    /// Builds the ledger, handing back the clock for time travel
    pub fn build(self) -> (BillingLedger, Arc<FixedClock>) {
        let clock = self.clock.clone();
        (BillingLedger::new(self.config, self.clock), clock)
    }
}

/// A random staff actor with a plausible name
pub fn random_actor() -> Actor {
    let name: String = Name().fake();
    Actor::new(StaffId::new(), name)
}

/// A ledger with one patient account already holding a deposit
pub fn ledger_with_deposit(deposit: Money) -> (BillingLedger, Arc<FixedClock>, PatientId) {
    let (mut ledger, clock) = LedgerBuilder::new().build();
    let ctx = PermissionSet::allow_all();
    let actor = crate::fixtures::ActorFixtures::cashier();
    let patient = PatientId::new();

    ledger
        .open_account(&ctx, &actor, patient)
        .expect("fresh patient has no account yet");
    ledger
        .deposit(&ctx, &actor, patient, deposit, None)
        .expect("deposit is positive");
    (ledger, clock, patient)
}

//! End-to-end billing flows against the ledger aggregate

use chrono::{Duration, TimeZone, Utc};
use core_kernel::{Actor, CheckinId, FixedClock, Money, PatientId, PermissionSet, StaffId};
use domain_audit::AuditAction;
use domain_billing::{
    is_valid_receipt_number, BillingConfig, BillingError, BillingLedger, ChargeStatus,
    DiscountKind, NewCharge, OverrideStatus, PaymentMethod, ServiceType, TransactionType,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ))
}

fn ledger_with_clock(clock: Arc<FixedClock>) -> BillingLedger {
    BillingLedger::new(BillingConfig::default(), clock)
}

fn charge_input(patient: PatientId, amount: Decimal) -> NewCharge {
    NewCharge::uninsured(
        CheckinId::new(),
        patient,
        ServiceType::Pharmacy,
        "Dispensed amoxicillin",
        Money::new(amount),
    )
}

#[test]
fn full_lifecycle_charge_to_paid_to_refunded() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");
    let patient = PatientId::new();

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(patient, dec!(120)))
        .unwrap();
    ledger
        .adjust_charge(
            &ctx,
            &actor,
            id,
            DiscountKind::Fixed(Money::new(dec!(20))),
            "Returned half the prescription",
        )
        .unwrap();
    let outcome = ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(100)), PaymentMethod::Cash)
        .unwrap();
    assert!(is_valid_receipt_number(&outcome.receipt_number));

    ledger
        .refund_payment(&ctx, &actor, id, None, "Prescription dispensed twice", None)
        .unwrap();

    let charge = ledger.charge(id).unwrap();
    assert_eq!(charge.status, ChargeStatus::Refunded);
    assert_eq!(charge.amount, Money::new(dec!(100)));
    assert_eq!(charge.original_amount, Some(Money::new(dec!(120))));
    assert!(charge.paid_amount.is_zero());

    // one entry per mutation: created, adjusted, paid, refunded
    let actions: Vec<AuditAction> = ledger
        .audit()
        .for_charge(id)
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::ChargeCreated,
            AuditAction::Adjustment,
            AuditAction::Payment,
            AuditAction::Refund,
        ]
    );
}

#[test]
fn voided_charge_is_frozen() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(60)))
        .unwrap();
    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(60)), PaymentMethod::Card)
        .unwrap();
    ledger
        .void_payment(&ctx, &actor, id, "Payment taken on the wrong visit", None)
        .unwrap();

    let err = ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(60)), PaymentMethod::Card)
        .unwrap_err();
    assert!(matches!(err, BillingError::StateConflict { .. }));

    let err = ledger
        .refund_payment(&ctx, &actor, id, None, "Refund after void attempt", None)
        .unwrap_err();
    assert!(matches!(err, BillingError::StateConflict { .. }));
}

#[test]
fn owing_charge_collected_later_under_override() {
    let clock = fixed_clock();
    let mut ledger = ledger_with_clock(clock.clone());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");
    let patient = PatientId::new();

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(patient, dec!(200)))
        .unwrap();
    ledger
        .create_billing_override(&ctx, &actor, id, "Emergency admission, guardian absent")
        .unwrap();
    assert_eq!(ledger.charge(id).unwrap().status, ChargeStatus::Owing);

    // the debt is settled two days later
    clock.advance(Duration::days(2));
    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(200)), PaymentMethod::MobileMoney)
        .unwrap();
    assert_eq!(ledger.charge(id).unwrap().status, ChargeStatus::Paid);
}

#[test]
fn service_override_expires_by_time() {
    let clock = fixed_clock();
    let mut ledger = ledger_with_clock(clock.clone());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "Dr. A. Mensah");
    let patient = PatientId::new();
    let checkin = CheckinId::new();

    // an unpaid charge blocks further service on the visit
    let mut input = charge_input(patient, dec!(90));
    input.checkin_id = checkin;
    ledger.create_charge(&ctx, &actor, input).unwrap();
    assert!(!ledger.can_proceed_with_service(patient, checkin, ServiceType::Pharmacy));

    ledger
        .activate_service_override(
            &ctx,
            &actor,
            checkin,
            ServiceType::Pharmacy,
            "Clinician requested urgent dispensing",
            None,
        )
        .unwrap();
    assert!(ledger.can_proceed_with_service(patient, checkin, ServiceType::Pharmacy));
    // only the named service type is unlocked
    assert!(!ledger.can_proceed_with_service(patient, checkin, ServiceType::Laboratory));

    // default window is two hours
    clock.advance(Duration::hours(2) + Duration::seconds(1));
    assert!(!ledger.can_proceed_with_service(patient, checkin, ServiceType::Pharmacy));
    assert!(ledger.active_service_overrides(checkin).is_empty());
}

#[test]
fn duplicate_active_service_override_rejected() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "Dr. A. Mensah");
    let checkin = CheckinId::new();

    ledger
        .activate_service_override(
            &ctx,
            &actor,
            checkin,
            ServiceType::Radiology,
            "Suspected fracture, imaging first",
            None,
        )
        .unwrap();
    let err = ledger
        .activate_service_override(
            &ctx,
            &actor,
            checkin,
            ServiceType::Radiology,
            "Second authorization attempt",
            None,
        )
        .unwrap_err();
    assert!(matches!(err, BillingError::StateConflict { .. }));
}

#[test]
fn deactivated_override_can_be_reissued() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "Dr. A. Mensah");
    let checkin = CheckinId::new();

    let id = ledger
        .activate_service_override(
            &ctx,
            &actor,
            checkin,
            ServiceType::Ward,
            "Admission while relatives arrange funds",
            None,
        )
        .unwrap();
    ledger.deactivate_service_override(&ctx, &actor, id).unwrap();
    assert!(ledger.active_service_overrides(checkin).is_empty());

    ledger
        .activate_service_override(
            &ctx,
            &actor,
            checkin,
            ServiceType::Ward,
            "Re-authorized by the medical director",
            None,
        )
        .unwrap();
    assert_eq!(ledger.active_service_overrides(checkin).len(), 1);
}

#[test]
fn account_transactions_replay_to_balance() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");
    let patient = PatientId::new();

    ledger.open_account(&ctx, &actor, patient).unwrap();
    ledger
        .deposit(&ctx, &actor, patient, Money::new(dec!(300)), None)
        .unwrap();
    ledger
        .withdraw(&ctx, &actor, patient, Money::new(dec!(40)), None)
        .unwrap();
    ledger
        .create_charge(&ctx, &actor, charge_input(patient, dec!(110)))
        .unwrap();

    let mut replayed = Money::zero();
    for txn in ledger.transactions_for(patient) {
        assert_eq!(txn.balance_before, replayed);
        if txn.transaction_type != TransactionType::CreditLimitChange {
            replayed += txn.amount;
        }
        assert_eq!(txn.balance_after, replayed);
    }
    assert_eq!(replayed, ledger.account(patient).unwrap().balance);
    assert_eq!(replayed, Money::new(dec!(150)));
}

#[test]
fn receipt_numbers_unique_and_increasing_across_a_day() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let mut receipts = Vec::new();
    for _ in 0..100 {
        let id = ledger
            .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(10)))
            .unwrap();
        let outcome = ledger
            .settle_charges(&ctx, &actor, &[id], Money::new(dec!(10)), PaymentMethod::Cash)
            .unwrap();
        receipts.push(outcome.receipt_number);
    }

    for pair in receipts.windows(2) {
        assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
    }
    for r in &receipts {
        assert!(is_valid_receipt_number(r));
    }
    let unique: std::collections::HashSet<_> = receipts.iter().collect();
    assert_eq!(unique.len(), receipts.len());
}

#[test]
fn receipt_day_rolls_over_with_local_midnight() {
    let clock = fixed_clock();
    let mut ledger = ledger_with_clock(clock.clone());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(10)))
        .unwrap();
    let first = ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(10)), PaymentMethod::Cash)
        .unwrap();
    assert_eq!(first.receipt_number, "RCP-20250601-0001");

    clock.advance(Duration::days(1));
    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(10)))
        .unwrap();
    let next = ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(10)), PaymentMethod::Cash)
        .unwrap();
    assert_eq!(next.receipt_number, "RCP-20250602-0001");
}

#[test]
fn installments_keep_charge_partial_until_cleared() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(100)))
        .unwrap();
    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(30)), PaymentMethod::Cash)
        .unwrap();
    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(40)), PaymentMethod::Cash)
        .unwrap();

    let charge = ledger.charge(id).unwrap();
    assert_eq!(charge.status, ChargeStatus::Partial);
    assert_eq!(charge.paid_amount, Money::new(dec!(70)));

    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(30)), PaymentMethod::Cash)
        .unwrap();
    assert_eq!(ledger.charge(id).unwrap().status, ChargeStatus::Paid);
}

#[test]
fn partial_refund_of_partial_charge_stays_partial() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(100)))
        .unwrap();
    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(60)), PaymentMethod::Cash)
        .unwrap();
    let refunded = ledger
        .refund_payment(
            &ctx,
            &actor,
            id,
            Some(Money::new(dec!(20))),
            "Overcharged on the dispensed quantity",
            None,
        )
        .unwrap();
    assert_eq!(refunded, Money::new(dec!(20)));

    let charge = ledger.charge(id).unwrap();
    assert_eq!(charge.status, ChargeStatus::Partial);
    assert_eq!(charge.paid_amount, Money::new(dec!(40)));
}

#[test]
fn rejected_batch_leaves_every_charge_untouched() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");
    let patient = PatientId::new();

    let good = ledger
        .create_charge(&ctx, &actor, charge_input(patient, dec!(100)))
        .unwrap();
    let waived = ledger
        .create_charge(&ctx, &actor, charge_input(patient, dec!(50)))
        .unwrap();
    ledger
        .waive_charge(&ctx, &actor, waived, "Indigent patient fund approval")
        .unwrap();
    let audit_before = ledger.audit().len();

    let err = ledger
        .settle_charges(
            &ctx,
            &actor,
            &[good, waived],
            Money::new(dec!(100)),
            PaymentMethod::Cash,
        )
        .unwrap_err();
    assert!(matches!(err, BillingError::StateConflict { .. }));

    let charge = ledger.charge(good).unwrap();
    assert_eq!(charge.status, ChargeStatus::Pending);
    assert!(charge.paid_amount.is_zero());
    assert!(charge.receipt_number.is_none());
    assert_eq!(ledger.audit().len(), audit_before);
}

#[test]
fn full_settlement_retires_billing_override() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "K. Boateng");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(150)))
        .unwrap();
    ledger
        .create_billing_override(&ctx, &actor, id, "Ward admission before payment")
        .unwrap();

    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(50)), PaymentMethod::Cash)
        .unwrap();
    assert!(ledger
        .billing_overrides_for(id)
        .iter()
        .all(|o| o.status == OverrideStatus::Active));

    ledger
        .settle_charges(&ctx, &actor, &[id], Money::new(dec!(100)), PaymentMethod::Cash)
        .unwrap();
    assert_eq!(ledger.charge(id).unwrap().status, ChargeStatus::Paid);
    assert!(ledger
        .billing_overrides_for(id)
        .iter()
        .all(|o| o.status == OverrideStatus::Revoked));
}

#[test]
fn waive_records_full_adjustment_on_charge() {
    let mut ledger = ledger_with_clock(fixed_clock());
    let ctx = PermissionSet::allow_all();
    let actor = Actor::new(StaffId::new(), "F. Adjei");

    let id = ledger
        .create_charge(&ctx, &actor, charge_input(PatientId::new(), dec!(100)))
        .unwrap();
    ledger
        .waive_charge(&ctx, &actor, id, "Staff dependant fee exemption")
        .unwrap();

    let charge = ledger.charge(id).unwrap();
    assert_eq!(charge.status, ChargeStatus::Waived);
    assert_eq!(charge.amount, Money::new(dec!(100)));
    assert_eq!(charge.adjustment_amount, Money::new(dec!(100)));
}

proptest! {
    // allocations always conserve the tendered amount and never overpay a charge
    #[test]
    fn settlement_allocation_conserves_amount(
        amounts in prop::collection::vec(1_000i64..200_000i64, 1..6),
        paid_fraction in 1u32..=100u32,
    ) {
        let mut ledger = ledger_with_clock(fixed_clock());
        let ctx = PermissionSet::allow_all();
        let actor = Actor::new(StaffId::new(), "K. Boateng");
        let patient = PatientId::new();

        let mut ids = Vec::new();
        let mut total_due = Money::zero();
        for minor in &amounts {
            let amount = Money::from_minor(*minor);
            total_due += amount;
            let id = ledger
                .create_charge(&ctx, &actor, NewCharge::uninsured(
                    CheckinId::new(),
                    patient,
                    ServiceType::Laboratory,
                    "Assorted tests",
                    amount,
                ))
                .unwrap();
            ids.push(id);
        }

        let paid = total_due.multiply(Decimal::new(paid_fraction as i64, 2));
        prop_assume!(paid.is_positive());
        let outcome = ledger
            .settle_charges(&ctx, &actor, &ids, paid, PaymentMethod::Cash)
            .unwrap();

        let allocated: Money = outcome.allocations.iter().map(|(_, a)| *a).sum();
        prop_assert_eq!(allocated, paid);
        for (id, allocation) in &outcome.allocations {
            let charge = ledger.charge(*id).unwrap();
            prop_assert!(*allocation <= charge.patient_due());
            prop_assert!(charge.paid_amount <= charge.patient_due());
        }
    }
}

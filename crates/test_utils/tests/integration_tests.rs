//! Cross-crate flows: a day at the cash office

use chrono::Duration;
use core_kernel::{Money, PatientId, PermissionSet};
use domain_audit::AuditAction;
use domain_billing::{
    calculate_change, BillingError, ChargeStatus, DiscountKind, PaymentMethod, ServiceType,
};
use domain_reports::{
    aging_report, patient_statement, revenue_report, ReconciliationEngine, ReconciliationStatus,
    RevenueGroupBy,
};
use rust_decimal_macros::dec;
use test_utils::{
    assert_audited, assert_charge_status, assert_transactions_replay, init_test_tracing,
    ActorFixtures, ChargeBuilder, LedgerBuilder, MoneyFixtures, ReasonFixtures, TemporalFixtures,
};

#[test]
fn cash_office_day_end_to_end() {
    init_test_tracing();
    let (mut ledger, clock) = LedgerBuilder::new().build();
    let ctx = PermissionSet::allow_all();
    let cashier = ActorFixtures::cashier();
    let officer = ActorFixtures::finance_officer();
    let patient = PatientId::new();

    // morning: two charges raised, one discounted
    let consult = ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .service(ServiceType::Consultation)
                .department("OPD")
                .amount(MoneyFixtures::consultation_fee())
                .described("OPD consultation")
                .build(),
        )
        .unwrap();
    let lab = ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .department("Laboratory")
                .build(),
        )
        .unwrap();
    ledger
        .adjust_charge(
            &ctx,
            &cashier,
            lab,
            DiscountKind::Percentage(dec!(25)),
            ReasonFixtures::discount(),
        )
        .unwrap();

    // both settled on one receipt, tendered in cash with change
    let due = ledger.total_outstanding(patient);
    assert_eq!(due, Money::new(dec!(90.00)));
    let change = calculate_change(Money::new(dec!(100.00)), due).unwrap();
    assert_eq!(change, Money::new(dec!(10.00)));
    let outcome = ledger
        .settle_charges(&ctx, &cashier, &[consult, lab], due, PaymentMethod::Cash)
        .unwrap();

    assert_charge_status(ledger.charge(consult).unwrap(), ChargeStatus::Paid);
    assert_charge_status(ledger.charge(lab).unwrap(), ChargeStatus::Paid);
    assert_eq!(
        ledger.charge(consult).unwrap().receipt_number,
        Some(outcome.receipt_number.clone())
    );

    // afternoon: day-end reconciliation balances against the drawer
    clock.advance(Duration::hours(8));
    let mut engine = ReconciliationEngine::new();
    engine
        .reconcile_cashier(
            &ctx,
            &officer,
            &ledger,
            cashier.id,
            ledger.today(),
            Money::new(dec!(90.00)),
            None,
        )
        .unwrap();
    assert_eq!(
        engine
            .record_for(cashier.id, ledger.today())
            .unwrap()
            .status,
        ReconciliationStatus::Balanced
    );

    // the whole day is on the audit trail
    assert_audited(ledger.audit(), consult, AuditAction::ChargeCreated, 1);
    assert_audited(ledger.audit(), consult, AuditAction::Payment, 1);
    assert_audited(ledger.audit(), lab, AuditAction::Adjustment, 1);
    assert_audited(ledger.audit(), lab, AuditAction::Payment, 1);
}

#[test]
fn deposit_consumed_before_cash_is_asked() {
    init_test_tracing();
    let (mut ledger, _clock, patient) =
        test_utils::ledger_with_deposit(Money::new(dec!(100.00)));
    let ctx = PermissionSet::allow_all();
    let cashier = ActorFixtures::cashier();

    // deposit covers the first charge fully, the second partially
    let first = ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .amount(Money::new(dec!(60.00)))
                .build(),
        )
        .unwrap();
    let second = ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .amount(Money::new(dec!(70.00)))
                .build(),
        )
        .unwrap();

    assert_charge_status(ledger.charge(first).unwrap(), ChargeStatus::Paid);
    assert_charge_status(ledger.charge(second).unwrap(), ChargeStatus::Partial);
    assert_eq!(ledger.total_outstanding(patient), Money::new(dec!(30.00)));

    let account = ledger.account(patient).unwrap();
    assert!(account.balance.is_zero());
    assert_transactions_replay(&ledger.transactions_for(patient), account.balance);

    // the remainder is settled in cash
    ledger
        .settle_charges(
            &ctx,
            &cashier,
            &[second],
            Money::new(dec!(30.00)),
            PaymentMethod::Cash,
        )
        .unwrap();
    assert_charge_status(ledger.charge(second).unwrap(), ChargeStatus::Paid);
}

#[test]
fn insured_patient_with_override_and_refund() {
    init_test_tracing();
    let (mut ledger, _clock) = LedgerBuilder::new().build();
    let ctx = PermissionSet::allow_all();
    let cashier = ActorFixtures::cashier();
    let clinician = ActorFixtures::clinician();
    let patient = PatientId::new();

    let claim = ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .service(ServiceType::Radiology)
                .insured(Money::new(dec!(150.00)), Money::new(dec!(50.00)))
                .described("Chest x-ray")
                .build(),
        )
        .unwrap();

    // billing override lets the patient proceed owing the copay
    ledger
        .create_billing_override(&ctx, &clinician, claim, ReasonFixtures::override_grant())
        .unwrap();
    assert_charge_status(ledger.charge(claim).unwrap(), ChargeStatus::Owing);

    // copay collected later, then refunded after the scan is cancelled
    ledger
        .settle_charges(
            &ctx,
            &cashier,
            &[claim],
            Money::new(dec!(50.00)),
            PaymentMethod::MobileMoney,
        )
        .unwrap();
    let refunded = ledger
        .refund_payment(&ctx, &cashier, claim, None, ReasonFixtures::refund(), None)
        .unwrap();
    assert_eq!(refunded, Money::new(dec!(50.00)));
    assert_charge_status(ledger.charge(claim).unwrap(), ChargeStatus::Refunded);

    // the insurance split survives the whole lifecycle untouched
    let charge = ledger.charge(claim).unwrap();
    assert_eq!(charge.insurance_covered_amount, Money::new(dec!(150.00)));
    assert_eq!(charge.amount, Money::new(dec!(200.00)));
}

#[test]
fn permission_denial_is_inert_everywhere() {
    init_test_tracing();
    let (mut ledger, _clock) = LedgerBuilder::new().build();
    let all = PermissionSet::allow_all();
    let none = PermissionSet::deny_all();
    let cashier = ActorFixtures::cashier();
    let patient = PatientId::new();

    let id = ledger
        .create_charge(
            &all,
            &cashier,
            ChargeBuilder::new().for_patient(patient).build(),
        )
        .unwrap();
    let before = ledger.audit().len();

    let denied: Vec<BillingError> = vec![
        ledger
            .adjust_charge(
                &none,
                &cashier,
                id,
                DiscountKind::Percentage(dec!(10)),
                ReasonFixtures::discount(),
            )
            .unwrap_err(),
        ledger
            .waive_charge(&none, &cashier, id, ReasonFixtures::waiver())
            .unwrap_err(),
        ledger
            .settle_charges(&none, &cashier, &[id], Money::new(dec!(10)), PaymentMethod::Cash)
            .unwrap_err(),
        ledger.open_account(&none, &cashier, patient).unwrap_err(),
    ];
    for err in denied {
        assert!(matches!(err, BillingError::Unauthorized(_)));
    }

    assert_eq!(ledger.audit().len(), before);
    assert_charge_status(ledger.charge(id).unwrap(), ChargeStatus::Pending);
}

#[test]
fn month_of_activity_reports_consistently() {
    init_test_tracing();
    let (mut ledger, clock) = LedgerBuilder::new().build();
    let ctx = PermissionSet::allow_all();
    let cashier = ActorFixtures::cashier();
    let patient = PatientId::new();

    for (day, amount, method) in [
        (0i64, dec!(40.00), PaymentMethod::Cash),
        (3, dec!(80.00), PaymentMethod::Card),
        (10, dec!(25.00), PaymentMethod::Cash),
    ] {
        clock.set(TemporalFixtures::opening_time() + Duration::days(day));
        let id = ledger
            .create_charge(
                &ctx,
                &cashier,
                ChargeBuilder::new()
                    .for_patient(patient)
                    .amount(Money::new(amount))
                    .build(),
            )
            .unwrap();
        ledger
            .settle_charges(&ctx, &cashier, &[id], Money::new(amount), method)
            .unwrap();
    }
    // one charge stays outstanding for aging
    clock.set(TemporalFixtures::opening_time() + Duration::days(12));
    ledger
        .create_charge(
            &ctx,
            &cashier,
            ChargeBuilder::new()
                .for_patient(patient)
                .amount(Money::new(dec!(100.00)))
                .build(),
        )
        .unwrap();

    let revenue = revenue_report(
        &ctx,
        &ledger,
        TemporalFixtures::june(),
        RevenueGroupBy::PaymentMethod,
    )
    .unwrap();
    assert_eq!(revenue.summary.total, Money::new(dec!(145.00)));
    assert_eq!(revenue.summary.count, 3);

    let aging = aging_report(&ctx, &ledger, ledger.today()).unwrap();
    assert_eq!(aging.total_outstanding, Money::new(dec!(100.00)));

    let statement = patient_statement(&ctx, &ledger, patient, TemporalFixtures::june()).unwrap();
    assert_eq!(statement.total_charges, Money::new(dec!(245.00)));
    assert_eq!(statement.total_paid, Money::new(dec!(145.00)));
    assert_eq!(statement.closing_balance, Money::new(dec!(100.00)));

    // generating the statement is itself audited
    ledger
        .log_statement_generated(
            &ctx,
            &cashier,
            patient,
            TemporalFixtures::june().start,
            TemporalFixtures::june().end,
        )
        .unwrap();
    assert_eq!(
        ledger
            .audit()
            .by_action(AuditAction::StatementGenerated)
            .len(),
        1
    );
}

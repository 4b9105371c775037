//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful error
//! messages than standard assertions.

use core_kernel::{ChargeId, Money};
use domain_audit::{AuditAction, AuditTrail};
use domain_billing::{AccountTransaction, ChargeStatus, Charge, TransactionType};

/// Asserts a charge is in the expected status
pub fn assert_charge_status(charge: &Charge, expected: ChargeStatus) {
    assert_eq!(
        charge.status, expected,
        "Charge {} expected {} but is {}",
        charge.id, expected, charge.status
    );
}

/// Asserts the trail holds exactly `count` entries of `action` for a charge
pub fn assert_audited(trail: &AuditTrail, charge_id: ChargeId, action: AuditAction, count: usize) {
    let found = trail
        .for_charge(charge_id)
        .iter()
        .filter(|e| e.action == action)
        .count();
    assert_eq!(
        found, count,
        "Charge {charge_id} expected {count} {action} audit entries, found {found}"
    );
}

/// Asserts a transaction list replays cleanly: each `balance_before`
/// matches the previous `balance_after`, and signed amounts add up
pub fn assert_transactions_replay(transactions: &[&AccountTransaction], final_balance: Money) {
    let mut running = Money::zero();
    for txn in transactions {
        assert_eq!(
            txn.balance_before, running,
            "Transaction {} balance_before {} does not chain from {}",
            txn.id, txn.balance_before, running
        );
        if txn.transaction_type != TransactionType::CreditLimitChange {
            running += txn.amount;
        }
        assert_eq!(
            txn.balance_after, running,
            "Transaction {} balance_after {} does not match replay {}",
            txn.id, txn.balance_after, running
        );
    }
    assert_eq!(
        running, final_balance,
        "Replayed balance {running} does not match account balance {final_balance}"
    );
}

/// Asserts money equality with both values in the failure message
pub fn assert_money_eq(actual: Money, expected: Money, what: &str) {
    assert_eq!(actual, expected, "{what}: expected {expected}, got {actual}");
}

//! Property-Based Test Generators
//!
//! Proptest strategies for random test data that keeps domain
//! invariants intact.

use core_kernel::Money;
use domain_billing::{PaymentMethod, ServiceType};
use proptest::prelude::*;

/// Strategy for positive amounts in minor units (pesewas)
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for Money values that may be negative
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (-100_000_000i64..100_000_000i64).prop_map(Money::from_minor)
}

/// Strategy for every service type
pub fn service_type_strategy() -> impl Strategy<Value = ServiceType> {
    prop_oneof![
        Just(ServiceType::Consultation),
        Just(ServiceType::Laboratory),
        Just(ServiceType::Pharmacy),
        Just(ServiceType::Radiology),
        Just(ServiceType::Ward),
        Just(ServiceType::Procedure),
        Just(ServiceType::Other),
    ]
}

/// Strategy for every payment method
pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::MobileMoney),
        Just(PaymentMethod::Insurance),
        Just(PaymentMethod::BankTransfer),
    ]
}

/// Strategy for reasons that pass the 10-character minimum
pub fn reason_strategy() -> impl Strategy<Value = String> {
    "[a-z]{4,10}( [a-z]{3,10}){2,5}"
}

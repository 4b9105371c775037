//! The billing ledger aggregate
//!
//! [`BillingLedger`] owns the charges, adjustments, patient accounts,
//! overrides, receipt numbering and the audit trail, and exposes every
//! billing operation as a single atomic unit: an operation either
//! completes (mutation plus audit entry) or returns an error having
//! changed nothing observable. Authorization is checked before anything
//! else; a denial produces no mutation and no audit entry.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core_kernel::{
    Actor, AuthorizationContext, BillingOverrideId, ChargeId, CheckinId, Clock, Money, PatientId,
    Permission, Rate, ServiceOverrideId, StaffId, TransactionId,
};
use domain_audit::{AuditAction, AuditDiff, AuditRecord, AuditTrail};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::{AccountTransaction, PatientAccount, TransactionType};
use crate::adjustment::{AdjustmentType, BillAdjustment, DiscountKind};
use crate::charge::{Charge, ChargeStatus, NewCharge, PaymentMethod, ServiceType};
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::overrides::{BillingOverride, OverrideStatus, ServiceAccessOverride};
use crate::receipt::ReceiptNumberGenerator;

/// Result of a batch settlement
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub receipt_number: String,
    pub amount_paid: Money,
    pub total_due: Money,
    /// Amount allocated per charge, in the order the charges were given
    pub allocations: Vec<(ChargeId, Money)>,
}

/// Change owed to the patient for a cash tender
pub fn calculate_change(tendered: Money, due: Money) -> Result<Money, BillingError> {
    if tendered < due {
        return Err(BillingError::validation_field(
            "tendered",
            format!("Tendered {tendered} is less than the amount due {due}"),
        ));
    }
    Ok(tendered - due)
}

pub struct BillingLedger {
    config: BillingConfig,
    clock: Arc<dyn Clock>,
    charges: HashMap<ChargeId, Charge>,
    adjustments: Vec<BillAdjustment>,
    accounts: HashMap<PatientId, PatientAccount>,
    transactions: Vec<AccountTransaction>,
    service_overrides: Vec<ServiceAccessOverride>,
    billing_overrides: Vec<BillingOverride>,
    receipts: ReceiptNumberGenerator,
    audit: AuditTrail,
}

impl BillingLedger {
    pub fn new(config: BillingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            charges: HashMap::new(),
            adjustments: Vec::new(),
            accounts: HashMap::new(),
            transactions: Vec::new(),
            service_overrides: Vec::new(),
            billing_overrides: Vec::new(),
            receipts: ReceiptNumberGenerator::new(),
            audit: AuditTrail::new(),
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The hospital-local calendar date of the current instant
    pub fn today(&self) -> NaiveDate {
        self.config.timezone.local_date(self.clock.now())
    }

    // ---------------------------------------------------------------
    // Charges

    /// Creates a charge explicitly
    ///
    /// Credit-eligible patients get an `owing` charge and proceed without
    /// upfront payment; everyone else starts `pending`. Any deposit
    /// balance on the patient's account is applied immediately.
    pub fn create_charge(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        input: NewCharge,
    ) -> Result<ChargeId, BillingError> {
        require(ctx, Permission::CollectPayments)?;
        self.validate_new_charge(&input)?;

        let now = self.clock.now();
        let status = if self
            .accounts
            .get(&input.patient_id)
            .is_some_and(PatientAccount::has_credit_privilege)
        {
            ChargeStatus::Owing
        } else {
            ChargeStatus::Pending
        };

        let charge = Charge::new(input, status, now);
        let charge_id = charge.id;
        let patient_id = charge.patient_id;
        let amount = charge.amount;

        self.charges.insert(charge_id, charge);
        self.audit.log(
            AuditRecord::new(
                AuditAction::ChargeCreated,
                actor.clone(),
                AuditDiff::ChargeCreated {
                    amount,
                    status: status.as_str().to_string(),
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id),
            now,
        );
        info!(%charge_id, %patient_id, %amount, status = %status, "charge created");

        self.apply_deposit_balance(actor, charge_id)?;
        Ok(charge_id)
    }

    /// Creates a charge on behalf of a check-in flow
    ///
    /// Returns `None` without creating anything when automatic billing is
    /// switched off in configuration.
    pub fn auto_create_charge(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        input: NewCharge,
    ) -> Result<Option<ChargeId>, BillingError> {
        if !self.config.auto_billing_enabled {
            return Ok(None);
        }
        self.create_charge(ctx, actor, input).map(Some)
    }

    fn validate_new_charge(&self, input: &NewCharge) -> Result<(), BillingError> {
        if !input.amount.is_positive() {
            return Err(BillingError::validation_field(
                "amount",
                "Charge amount must be greater than zero",
            ));
        }
        if input.is_insurance_claim {
            if input.insurance_covered_amount.is_negative()
                || input.patient_copay_amount.is_negative()
            {
                return Err(BillingError::validation(
                    "Insurance split amounts must not be negative",
                ));
            }
            if input.insurance_covered_amount + input.patient_copay_amount != input.amount {
                return Err(BillingError::validation(
                    "Insurance covered amount plus copay must equal the charge amount",
                ));
            }
            if self.config.nhis_consultation_fee_once_per_lifetime
                && input.service_type == ServiceType::Consultation
                && self.charges.values().any(|c| {
                    c.patient_id == input.patient_id
                        && c.is_insurance_claim
                        && c.service_type == ServiceType::Consultation
                        && c.status != ChargeStatus::Voided
                })
            {
                return Err(BillingError::state_conflict(
                    "NHIS consultation fee has already been billed for this patient",
                ));
            }
        }
        Ok(())
    }

    /// Consumes the patient's deposit balance against a freshly created
    /// charge, oldest money first
    fn apply_deposit_balance(
        &mut self,
        actor: &Actor,
        charge_id: ChargeId,
    ) -> Result<(), BillingError> {
        let now = self.clock.now();
        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        let patient_id = charge.patient_id;
        let due = charge.remaining_due();

        let Some(account) = self.accounts.get(&patient_id) else {
            return Ok(());
        };
        let deduction = account.deposit_balance().min(due);
        if !deduction.is_positive() {
            return Ok(());
        }

        let account = self.accounts.get_mut(&patient_id).expect("account exists");
        let balance_before = account.balance;
        account.balance -= deduction;
        let balance_after = account.balance;
        let account_id = account.id;

        let charge = self.charges.get_mut(&charge_id).expect("charge exists");
        let old_status = charge.status;
        charge.paid_amount += deduction;
        let new_status = if charge.remaining_due().is_zero() {
            ChargeStatus::Paid
        } else {
            ChargeStatus::Partial
        };
        charge.transition(new_status)?;
        charge.paid_at = Some(now);
        charge.processed_by = Some(actor.id);

        self.transactions.push(AccountTransaction {
            id: TransactionId::new_v7(),
            account_id,
            patient_id,
            transaction_type: TransactionType::ChargeDeduction,
            amount: -deduction,
            balance_before,
            balance_after,
            charge_id: Some(charge_id),
            processed_by: actor.id,
            notes: None,
            transacted_at: now,
        });
        self.audit.log(
            AuditRecord::new(
                AuditAction::Payment,
                actor.clone(),
                AuditDiff::Settlement {
                    amount_paid: deduction,
                    old_status: old_status.as_str().to_string(),
                    new_status: new_status.as_str().to_string(),
                    receipt_number: None,
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id)
            .with_reason("Deposit balance applied"),
            now,
        );
        self.audit.log(
            AuditRecord::new(
                AuditAction::AccountPayment,
                actor.clone(),
                AuditDiff::AccountBalance {
                    transaction_type: TransactionType::ChargeDeduction.to_string(),
                    amount: -deduction,
                    balance_before,
                    balance_after,
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id),
            now,
        );
        info!(%charge_id, %patient_id, %deduction, "deposit balance applied to charge");
        Ok(())
    }

    /// Applies a discount to a pending charge
    pub fn adjust_charge(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
        discount: DiscountKind,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::AdjustCharges)?;
        validate_reason(reason)?;

        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        if charge.status != ChargeStatus::Pending {
            return Err(BillingError::state_conflict(format!(
                "Only pending charges can be adjusted; charge {} is {}",
                charge_id, charge.status
            )));
        }

        let (adjustment_type, adjustment_amount) = match discount {
            DiscountKind::Percentage(pct) => {
                if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                    return Err(BillingError::validation_field(
                        "percentage",
                        "Discount percentage must be above 0 and at most 100",
                    ));
                }
                (
                    AdjustmentType::DiscountPercentage,
                    Rate::from_percentage(pct).apply(&charge.amount),
                )
            }
            DiscountKind::Fixed(fixed) => {
                if !fixed.is_positive() || fixed > charge.amount {
                    return Err(BillingError::validation_field(
                        "amount",
                        "Fixed discount must be above 0 and at most the charge amount",
                    ));
                }
                (AdjustmentType::DiscountFixed, fixed)
            }
        };

        let now = self.clock.now();
        let charge = self.charges.get_mut(&charge_id).expect("charge exists");
        charge.snapshot_original_amount();
        let original_amount = charge.amount;
        charge.amount = charge.amount - adjustment_amount;
        charge.adjustment_amount += adjustment_amount;
        let final_amount = charge.amount;
        let patient_id = charge.patient_id;

        self.adjustments.push(BillAdjustment::new(
            charge_id,
            adjustment_type,
            original_amount,
            adjustment_amount,
            actor.id,
            reason,
            now,
        ));
        self.audit.log(
            AuditRecord::new(
                AuditAction::Adjustment,
                actor.clone(),
                AuditDiff::Adjustment {
                    original_amount,
                    adjustment_amount,
                    final_amount,
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%charge_id, %adjustment_amount, %final_amount, "charge adjusted");
        Ok(())
    }

    /// Waives a pending charge in full
    pub fn waive_charge(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::WaiveCharges)?;
        validate_reason(reason)?;

        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        if charge.status != ChargeStatus::Pending {
            return Err(BillingError::state_conflict(format!(
                "Only pending charges can be waived; charge {} is {}",
                charge_id, charge.status
            )));
        }

        let now = self.clock.now();
        let charge = self.charges.get_mut(&charge_id).expect("charge exists");
        charge.snapshot_original_amount();
        let original_amount = charge.amount;
        charge.transition(ChargeStatus::Waived)?;
        charge.adjustment_amount += original_amount;
        charge.is_waived = true;
        charge.waived_by = Some(actor.id);
        charge.waived_at = Some(now);
        charge.waiver_reason = Some(reason.to_string());
        let patient_id = charge.patient_id;

        self.adjustments.push(BillAdjustment::new(
            charge_id,
            AdjustmentType::Waiver,
            original_amount,
            original_amount,
            actor.id,
            reason,
            now,
        ));
        self.audit.log(
            AuditRecord::new(
                AuditAction::Waiver,
                actor.clone(),
                AuditDiff::Waiver {
                    original_amount,
                    final_amount: Money::zero(),
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%charge_id, %original_amount, "charge waived");
        Ok(())
    }

    /// Settles a batch of charges against one tender
    ///
    /// The amount is allocated sequentially across the charges in the
    /// order given; insurance charges absorb only their copay. One
    /// receipt number covers the whole batch. Paying more than the batch
    /// total is rejected.
    pub fn settle_charges(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_ids: &[ChargeId],
        amount_paid: Money,
        method: PaymentMethod,
    ) -> Result<SettlementOutcome, BillingError> {
        require(ctx, Permission::CollectPayments)?;
        if charge_ids.is_empty() {
            return Err(BillingError::validation("No charges selected for payment"));
        }
        if !amount_paid.is_positive() {
            return Err(BillingError::validation_field(
                "amount_paid",
                "Payment amount must be greater than zero",
            ));
        }
        let mut seen = HashSet::new();
        if !charge_ids.iter().all(|id| seen.insert(*id)) {
            return Err(BillingError::validation(
                "The same charge appears more than once in the batch",
            ));
        }

        let mut total_due = Money::zero();
        for id in charge_ids {
            let charge = self
                .charges
                .get(id)
                .ok_or(BillingError::ChargeNotFound(*id))?;
            if !charge.status.is_collectible() {
                return Err(BillingError::state_conflict(format!(
                    "Charge {} is {} and cannot be paid",
                    id, charge.status
                )));
            }
            total_due += charge.remaining_due();
        }
        if amount_paid > total_due {
            return Err(BillingError::validation_field(
                "amount_paid",
                format!("Payment {amount_paid} exceeds the amount due {total_due}"),
            ));
        }

        // Allocation plan, computed and transition-checked before any
        // mutation so a rejected batch leaves every charge untouched.
        let mut remaining = amount_paid;
        let mut plan = Vec::with_capacity(charge_ids.len());
        for id in charge_ids {
            let charge = self.charges.get(id).expect("validated above");
            let allocation = remaining.min(charge.remaining_due());
            if !allocation.is_positive() {
                plan.push((*id, Money::zero(), None));
                continue;
            }
            remaining -= allocation;
            let new_status = if allocation == charge.remaining_due() {
                ChargeStatus::Paid
            } else {
                ChargeStatus::Partial
            };
            if !charge.status.can_transition_to(new_status) {
                return Err(BillingError::state_conflict(format!(
                    "Charge {} cannot move from {} to {}",
                    id, charge.status, new_status
                )));
            }
            plan.push((*id, allocation, Some(new_status)));
        }

        let now = self.clock.now();
        let receipt_number = self.receipts.next(self.config.timezone.local_date(now));
        let mut allocations = Vec::with_capacity(plan.len());

        for (id, allocation, new_status) in plan {
            let Some(new_status) = new_status else {
                allocations.push((id, Money::zero()));
                continue;
            };
            let charge = self.charges.get_mut(&id).expect("validated above");
            let old_status = charge.status;
            charge.paid_amount += allocation;
            // Transition checked in the planning pass
            charge.status = new_status;
            charge.paid_at = Some(now);
            charge.processed_by = Some(actor.id);
            charge.receipt_number = Some(receipt_number.clone());
            charge.payment_method = Some(method);
            let patient_id = charge.patient_id;

            if new_status == ChargeStatus::Paid {
                self.retire_billing_overrides(id);
            }
            self.audit.log(
                AuditRecord::new(
                    AuditAction::Payment,
                    actor.clone(),
                    AuditDiff::Settlement {
                        amount_paid: allocation,
                        old_status: old_status.as_str().to_string(),
                        new_status: new_status.as_str().to_string(),
                        receipt_number: Some(receipt_number.clone()),
                    },
                )
                .for_charge(id)
                .for_patient(patient_id),
                now,
            );
            allocations.push((id, allocation));
        }

        info!(
            receipt = %receipt_number,
            %amount_paid,
            charges = charge_ids.len(),
            method = %method,
            "payment settled"
        );
        Ok(SettlementOutcome {
            receipt_number,
            amount_paid,
            total_due,
            allocations,
        })
    }

    /// Voids a settled payment, preserving all recorded amounts
    pub fn void_payment(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
        reason: &str,
        ip_address: Option<&str>,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::VoidPayments)?;
        validate_reason(reason)?;

        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        if !charge.status.is_settled() {
            warn!(%charge_id, status = %charge.status, "void rejected");
            return Err(BillingError::state_conflict(format!(
                "Only paid or partially paid charges can be voided; charge {} is {}",
                charge_id, charge.status
            )));
        }

        let now = self.clock.now();
        let charge = self.charges.get_mut(&charge_id).expect("charge exists");
        let old_status = charge.status;
        charge.transition(ChargeStatus::Voided)?;
        let patient_id = charge.patient_id;

        let mut record = AuditRecord::new(
            AuditAction::Void,
            actor.clone(),
            AuditDiff::Void {
                old_status: old_status.as_str().to_string(),
                new_status: ChargeStatus::Voided.as_str().to_string(),
            },
        )
        .for_charge(charge_id)
        .for_patient(patient_id)
        .with_reason(reason);
        if let Some(ip) = ip_address {
            record = record.with_ip(ip);
        }
        self.audit.log(record, now);
        info!(%charge_id, from = %old_status, "payment voided");
        Ok(())
    }

    /// Refunds part or all of a settled payment
    ///
    /// With no amount given the full paid amount is refunded. The charge
    /// becomes `refunded` when nothing paid remains, otherwise `partial`.
    pub fn refund_payment(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
        amount: Option<Money>,
        reason: &str,
        ip_address: Option<&str>,
    ) -> Result<Money, BillingError> {
        require(ctx, Permission::RefundPayments)?;
        validate_reason(reason)?;

        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        if !charge.status.is_settled() {
            warn!(%charge_id, status = %charge.status, "refund rejected");
            return Err(BillingError::state_conflict(format!(
                "Only paid or partially paid charges can be refunded; charge {} is {}",
                charge_id, charge.status
            )));
        }
        let refund = amount.unwrap_or(charge.paid_amount);
        if !refund.is_positive() || refund > charge.paid_amount {
            return Err(BillingError::validation_field(
                "amount",
                format!(
                    "Refund must be above 0 and at most the paid amount {}",
                    charge.paid_amount
                ),
            ));
        }

        let now = self.clock.now();
        let charge = self.charges.get_mut(&charge_id).expect("charge exists");
        let old_status = charge.status;
        let old_paid = charge.paid_amount;
        charge.paid_amount = (charge.paid_amount - refund).floor_at_zero();
        let new_status = if charge.paid_amount.is_zero() {
            ChargeStatus::Refunded
        } else {
            ChargeStatus::Partial
        };
        charge.transition(new_status)?;
        let new_paid = charge.paid_amount;
        let patient_id = charge.patient_id;

        let mut record = AuditRecord::new(
            AuditAction::Refund,
            actor.clone(),
            AuditDiff::Refund {
                refund_amount: refund,
                old_paid_amount: old_paid,
                new_paid_amount: new_paid,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            },
        )
        .for_charge(charge_id)
        .for_patient(patient_id)
        .with_reason(reason);
        if let Some(ip) = ip_address {
            record = record.with_ip(ip);
        }
        self.audit.log(record, now);
        info!(%charge_id, %refund, to = %new_status, "payment refunded");
        Ok(refund)
    }

    // ---------------------------------------------------------------
    // Patient accounts

    /// Opens an empty account for a patient
    pub fn open_account(
        &mut self,
        ctx: &dyn AuthorizationContext,
        _actor: &Actor,
        patient_id: PatientId,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageAccounts)?;
        if self.accounts.contains_key(&patient_id) {
            return Err(BillingError::state_conflict(format!(
                "Patient {patient_id} already has an account"
            )));
        }
        let now = self.clock.now();
        self.accounts
            .insert(patient_id, PatientAccount::open(patient_id, now));
        info!(%patient_id, "account opened");
        Ok(())
    }

    /// Adds money to the patient's deposit balance
    pub fn deposit(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        amount: Money,
        notes: Option<String>,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageAccounts)?;
        if !amount.is_positive() {
            return Err(BillingError::validation_field(
                "amount",
                "Deposit amount must be greater than zero",
            ));
        }
        self.move_balance(
            actor,
            patient_id,
            TransactionType::Deposit,
            AuditAction::Deposit,
            amount,
            notes,
        )
    }

    /// Returns deposit money to the patient
    pub fn withdraw(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        amount: Money,
        notes: Option<String>,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageAccounts)?;
        if !amount.is_positive() {
            return Err(BillingError::validation_field(
                "amount",
                "Withdrawal amount must be greater than zero",
            ));
        }
        let account = self
            .accounts
            .get(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        if amount > account.deposit_balance() {
            return Err(BillingError::validation_field(
                "amount",
                format!(
                    "Withdrawal {amount} exceeds the deposit balance {}",
                    account.deposit_balance()
                ),
            ));
        }
        self.move_balance(
            actor,
            patient_id,
            TransactionType::Withdrawal,
            AuditAction::Withdrawal,
            -amount,
            notes,
        )
    }

    /// Pays down what the patient owes on the account
    pub fn process_account_payment(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        amount: Money,
        notes: Option<String>,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageAccounts)?;
        if !amount.is_positive() {
            return Err(BillingError::validation_field(
                "amount",
                "Payment amount must be greater than zero",
            ));
        }
        let account = self
            .accounts
            .get(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        if amount > account.amount_owed() {
            return Err(BillingError::validation_field(
                "amount",
                format!(
                    "Payment {amount} exceeds the amount owed {}",
                    account.amount_owed()
                ),
            ));
        }
        self.move_balance(
            actor,
            patient_id,
            TransactionType::Payment,
            AuditAction::AccountPayment,
            amount,
            notes,
        )
    }

    /// Applies a signed correction to the account balance
    ///
    /// The correction may not push the patient's debt past their credit
    /// limit.
    pub fn make_account_adjustment(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        amount: Money,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageAccounts)?;
        validate_reason(reason)?;
        if amount.is_zero() {
            return Err(BillingError::validation_field(
                "amount",
                "Adjustment amount must not be zero",
            ));
        }
        let account = self
            .accounts
            .get(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        let new_owed = (-(account.balance + amount)).floor_at_zero();
        if new_owed > account.credit_limit {
            return Err(BillingError::validation(format!(
                "Adjustment would put the patient {new_owed} in debt, past the credit limit {}",
                account.credit_limit
            )));
        }
        self.move_balance(
            actor,
            patient_id,
            TransactionType::Adjustment,
            AuditAction::AccountAdjustment,
            amount,
            Some(reason.to_string()),
        )
    }

    fn move_balance(
        &mut self,
        actor: &Actor,
        patient_id: PatientId,
        transaction_type: TransactionType,
        action: AuditAction,
        amount: Money,
        notes: Option<String>,
    ) -> Result<(), BillingError> {
        let now = self.clock.now();
        let account = self
            .accounts
            .get_mut(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        let balance_before = account.balance;
        account.balance += amount;
        let balance_after = account.balance;
        let account_id = account.id;

        self.transactions.push(AccountTransaction {
            id: TransactionId::new_v7(),
            account_id,
            patient_id,
            transaction_type,
            amount,
            balance_before,
            balance_after,
            charge_id: None,
            processed_by: actor.id,
            notes: notes.clone(),
            transacted_at: now,
        });
        let mut record = AuditRecord::new(
            action,
            actor.clone(),
            AuditDiff::AccountBalance {
                transaction_type: transaction_type.to_string(),
                amount,
                balance_before,
                balance_after,
            },
        )
        .for_patient(patient_id);
        if let Some(notes) = notes {
            record = record.with_reason(notes);
        }
        self.audit.log(record, now);
        info!(%patient_id, kind = %transaction_type, %amount, "account balance moved");
        Ok(())
    }

    /// Sets the patient's credit limit
    pub fn set_credit_limit(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        limit: Money,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageCredit)?;
        validate_reason(reason)?;
        if limit.is_negative() {
            return Err(BillingError::validation_field(
                "limit",
                "Credit limit must not be negative",
            ));
        }
        let now = self.clock.now();
        let account = self
            .accounts
            .get_mut(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        let delta = limit - account.credit_limit;
        account.credit_limit = limit;
        account.credit_authorized_by = Some(actor.id);
        account.credit_authorized_at = Some(now);
        account.credit_reason = Some(reason.to_string());
        let balance = account.balance;
        let account_id = account.id;

        self.transactions.push(AccountTransaction {
            id: TransactionId::new_v7(),
            account_id,
            patient_id,
            transaction_type: TransactionType::CreditLimitChange,
            amount: delta,
            balance_before: balance,
            balance_after: balance,
            charge_id: None,
            processed_by: actor.id,
            notes: Some(reason.to_string()),
            transacted_at: now,
        });
        self.audit.log(
            AuditRecord::new(
                AuditAction::CreditLimitChange,
                actor.clone(),
                AuditDiff::CreditTag {
                    credit_limit: limit,
                },
            )
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%patient_id, %limit, "credit limit set");
        Ok(())
    }

    /// Grants the credit tag
    pub fn add_credit_tag(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageCredit)?;
        validate_reason(reason)?;
        let now = self.clock.now();
        let account = self
            .accounts
            .get_mut(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        if account.credit_tagged {
            return Err(BillingError::state_conflict(format!(
                "Patient {patient_id} is already credit tagged"
            )));
        }
        account.credit_tagged = true;
        account.credit_authorized_by = Some(actor.id);
        account.credit_authorized_at = Some(now);
        account.credit_reason = Some(reason.to_string());
        let credit_limit = account.credit_limit;

        self.audit.log(
            AuditRecord::new(
                AuditAction::CreditTagAdded,
                actor.clone(),
                AuditDiff::CreditTag { credit_limit },
            )
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%patient_id, "credit tag added");
        Ok(())
    }

    /// Withdraws the credit tag
    pub fn remove_credit_tag(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        reason: &str,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ManageCredit)?;
        validate_reason(reason)?;
        let now = self.clock.now();
        let account = self
            .accounts
            .get_mut(&patient_id)
            .ok_or(BillingError::AccountNotFound(patient_id))?;
        if !account.credit_tagged {
            return Err(BillingError::state_conflict(format!(
                "Patient {patient_id} is not credit tagged"
            )));
        }
        account.credit_tagged = false;
        let credit_limit = account.credit_limit;

        self.audit.log(
            AuditRecord::new(
                AuditAction::CreditTagRemoved,
                actor.clone(),
                AuditDiff::CreditTag { credit_limit },
            )
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%patient_id, "credit tag removed");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Overrides

    /// Authorizes one service type for one check-in without upfront payment
    pub fn activate_service_override(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        checkin_id: CheckinId,
        service_type: ServiceType,
        reason: &str,
        duration_hours: Option<i64>,
    ) -> Result<ServiceOverrideId, BillingError> {
        require(ctx, Permission::AuthorizeOverrides)?;
        validate_reason(reason)?;

        let now = self.clock.now();
        if self
            .service_overrides
            .iter()
            .any(|o| o.checkin_id == checkin_id && o.service_type == service_type && o.is_current(now))
        {
            warn!(%checkin_id, service = %service_type, "duplicate service override rejected");
            return Err(BillingError::state_conflict(format!(
                "An active {service_type} override already exists for this check-in"
            )));
        }

        let hours = duration_hours.unwrap_or(self.config.default_override_duration_hours);
        let id = ServiceOverrideId::new_v7();
        self.service_overrides.push(ServiceAccessOverride {
            id,
            checkin_id,
            service_type,
            authorized_by: actor.id,
            reason: reason.to_string(),
            is_active: true,
            authorized_at: now,
            expires_at: now + Duration::hours(hours),
        });
        self.audit.log(
            AuditRecord::new(
                AuditAction::Override,
                actor.clone(),
                AuditDiff::Override {
                    old_status: "inactive".to_string(),
                    new_status: "active".to_string(),
                },
            )
            .with_reason(reason),
            now,
        );
        info!(%checkin_id, service = %service_type, hours, "service override activated");
        Ok(id)
    }

    /// Shuts an override off before it expires
    pub fn deactivate_service_override(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        id: ServiceOverrideId,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::AuthorizeOverrides)?;
        let now = self.clock.now();
        let Some(entry) = self.service_overrides.iter_mut().find(|o| o.id == id) else {
            return Err(BillingError::validation(format!(
                "Service override {id} does not exist"
            )));
        };
        if !entry.is_active {
            return Err(BillingError::state_conflict(format!(
                "Service override {id} is already inactive"
            )));
        }
        entry.is_active = false;

        self.audit.log(
            AuditRecord::new(
                AuditAction::Override,
                actor.clone(),
                AuditDiff::Override {
                    old_status: "active".to_string(),
                    new_status: "inactive".to_string(),
                },
            ),
            now,
        );
        info!(override_id = %id, "service override deactivated");
        Ok(())
    }

    /// Overrides that currently grant service for a check-in
    pub fn active_service_overrides(&self, checkin_id: CheckinId) -> Vec<&ServiceAccessOverride> {
        let now = self.clock.now();
        self.service_overrides
            .iter()
            .filter(|o| o.checkin_id == checkin_id && o.is_current(now))
            .collect()
    }

    /// Converts a pending charge into an owing one under authorization
    pub fn create_billing_override(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
        reason: &str,
    ) -> Result<BillingOverrideId, BillingError> {
        require(ctx, Permission::AuthorizeOverrides)?;
        validate_reason(reason)?;
        self.ensure_overridable(charge_id)?;
        self.apply_billing_override(actor, charge_id, reason)
    }

    /// Batch form: every charge is validated before any is touched
    pub fn create_billing_overrides(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_ids: &[ChargeId],
        reason: &str,
    ) -> Result<Vec<BillingOverrideId>, BillingError> {
        require(ctx, Permission::AuthorizeOverrides)?;
        validate_reason(reason)?;
        if charge_ids.is_empty() {
            return Err(BillingError::validation("No charges selected for override"));
        }
        for id in charge_ids {
            self.ensure_overridable(*id)?;
        }
        charge_ids
            .iter()
            .map(|id| self.apply_billing_override(actor, *id, reason))
            .collect()
    }

    fn ensure_overridable(&self, charge_id: ChargeId) -> Result<(), BillingError> {
        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        if charge.status != ChargeStatus::Pending {
            return Err(BillingError::state_conflict(format!(
                "Only pending charges can be overridden; charge {} is {}",
                charge_id, charge.status
            )));
        }
        Ok(())
    }

    fn apply_billing_override(
        &mut self,
        actor: &Actor,
        charge_id: ChargeId,
        reason: &str,
    ) -> Result<BillingOverrideId, BillingError> {
        let now = self.clock.now();
        let charge = self
            .charges
            .get_mut(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        let old_status = charge.status;
        charge.transition(ChargeStatus::Owing)?;
        let checkin_id = charge.checkin_id;
        let service_type = charge.service_type;
        let patient_id = charge.patient_id;

        let id = BillingOverrideId::new_v7();
        self.billing_overrides.push(BillingOverride {
            id,
            charge_id,
            checkin_id,
            service_type,
            authorized_by: actor.id,
            reason: reason.to_string(),
            status: OverrideStatus::Active,
            authorized_at: now,
        });
        self.audit.log(
            AuditRecord::new(
                AuditAction::Override,
                actor.clone(),
                AuditDiff::Override {
                    old_status: old_status.as_str().to_string(),
                    new_status: ChargeStatus::Owing.as_str().to_string(),
                },
            )
            .for_charge(charge_id)
            .for_patient(patient_id)
            .with_reason(reason),
            now,
        );
        info!(%charge_id, "billing override created");
        Ok(id)
    }

    /// Marks a settled charge's active billing overrides as spent
    fn retire_billing_overrides(&mut self, charge_id: ChargeId) {
        for ov in self
            .billing_overrides
            .iter_mut()
            .filter(|o| o.charge_id == charge_id && o.status == OverrideStatus::Active)
        {
            ov.status = OverrideStatus::Revoked;
            info!(%charge_id, override_id = %ov.id, "billing override retired");
        }
    }

    /// Whether service may proceed for this check-in and service type
    pub fn can_proceed_with_service(
        &self,
        patient_id: PatientId,
        checkin_id: CheckinId,
        service_type: ServiceType,
    ) -> bool {
        self.service_block_reason(patient_id, checkin_id, service_type)
            .is_none()
    }

    /// Why service is blocked, or `None` when it may proceed
    pub fn service_block_reason(
        &self,
        patient_id: PatientId,
        checkin_id: CheckinId,
        service_type: ServiceType,
    ) -> Option<String> {
        let now = self.clock.now();
        if self
            .service_overrides
            .iter()
            .any(|o| o.checkin_id == checkin_id && o.service_type == service_type && o.is_current(now))
        {
            return None;
        }
        if let Some(account) = self.accounts.get(&patient_id) {
            if account.has_credit_privilege()
                && (account.credit_tagged || account.remaining_credit().is_positive())
            {
                return None;
            }
        }
        let unpaid: Money = self
            .charges
            .values()
            .filter(|c| c.checkin_id == checkin_id && c.status.is_collectible())
            .map(Charge::remaining_due)
            .sum();
        if unpaid.is_positive() {
            Some(format!("Unpaid charges of {unpaid} on this visit"))
        } else {
            None
        }
    }

    // ---------------------------------------------------------------
    // Receipts

    /// Resumes receipt numbering above persisted sequences
    pub fn seed_receipts(&self, date: NaiveDate, last_sequence: u32) {
        self.receipts.seed(date, last_sequence);
    }

    /// True when no persisted charge carries this receipt number
    pub fn is_unique_receipt_number(&self, candidate: &str) -> bool {
        !self
            .charges
            .values()
            .any(|c| c.receipt_number.as_deref() == Some(candidate))
    }

    /// Records that a receipt was printed for a charge
    pub fn log_receipt_print(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        charge_id: ChargeId,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::CollectPayments)?;
        let charge = self
            .charges
            .get(&charge_id)
            .ok_or(BillingError::ChargeNotFound(charge_id))?;
        let Some(receipt_number) = charge.receipt_number.clone() else {
            return Err(BillingError::state_conflict(format!(
                "Charge {charge_id} has no receipt to print"
            )));
        };
        let patient_id = charge.patient_id;
        let now = self.clock.now();

        self.audit.log(
            AuditRecord::new(
                AuditAction::ReceiptPrinted,
                actor.clone(),
                AuditDiff::ReceiptPrinted { receipt_number },
            )
            .for_charge(charge_id)
            .for_patient(patient_id),
            now,
        );
        Ok(())
    }

    /// Records that a patient statement was generated
    pub fn log_statement_generated(
        &mut self,
        ctx: &dyn AuthorizationContext,
        actor: &Actor,
        patient_id: PatientId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<(), BillingError> {
        require(ctx, Permission::ViewReports)?;
        let now = self.clock.now();
        self.audit.log(
            AuditRecord::new(
                AuditAction::StatementGenerated,
                actor.clone(),
                AuditDiff::StatementGenerated {
                    period_start,
                    period_end,
                },
            )
            .for_patient(patient_id),
            now,
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries

    pub fn charge(&self, id: ChargeId) -> Option<&Charge> {
        self.charges.get(&id)
    }

    pub fn charges(&self) -> impl Iterator<Item = &Charge> {
        self.charges.values()
    }

    pub fn charges_for_patient(&self, patient_id: PatientId) -> Vec<&Charge> {
        let mut found: Vec<&Charge> = self
            .charges
            .values()
            .filter(|c| c.patient_id == patient_id)
            .collect();
        found.sort_by_key(|c| (c.charged_at, c.id));
        found
    }

    /// Collectible charges with money still owed, oldest first
    pub fn outstanding_charges(&self, patient_id: PatientId) -> Vec<&Charge> {
        self.charges_for_patient(patient_id)
            .into_iter()
            .filter(|c| c.status.is_collectible() && c.remaining_due().is_positive())
            .collect()
    }

    pub fn total_outstanding(&self, patient_id: PatientId) -> Money {
        self.outstanding_charges(patient_id)
            .iter()
            .map(|c| c.remaining_due())
            .sum()
    }

    pub fn adjustments_for(&self, charge_id: ChargeId) -> Vec<&BillAdjustment> {
        self.adjustments
            .iter()
            .filter(|a| a.charge_id == charge_id)
            .collect()
    }

    pub fn account(&self, patient_id: PatientId) -> Option<&PatientAccount> {
        self.accounts.get(&patient_id)
    }

    pub fn transactions_for(&self, patient_id: PatientId) -> Vec<&AccountTransaction> {
        self.transactions
            .iter()
            .filter(|t| t.patient_id == patient_id)
            .collect()
    }

    pub fn billing_overrides_for(&self, charge_id: ChargeId) -> Vec<&BillingOverride> {
        self.billing_overrides
            .iter()
            .filter(|o| o.charge_id == charge_id)
            .collect()
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Cash settled by one cashier on one hospital-local day
    pub fn settled_cash_total(&self, cashier: StaffId, date: NaiveDate) -> Money {
        self.collections_by_method(cashier, date)
            .get(&PaymentMethod::Cash)
            .copied()
            .unwrap_or_else(Money::zero)
    }

    /// A cashier's day of collections broken down by payment method
    pub fn collections_by_method(
        &self,
        cashier: StaffId,
        date: NaiveDate,
    ) -> HashMap<PaymentMethod, Money> {
        let tz = self.config.timezone;
        let mut totals: HashMap<PaymentMethod, Money> = HashMap::new();
        for charge in self.charges.values() {
            let (Some(method), Some(paid_at)) = (charge.payment_method, charge.paid_at) else {
                continue;
            };
            if charge.processed_by != Some(cashier)
                || tz.local_date(paid_at) != date
                || !charge.status.is_settled()
            {
                continue;
            }
            *totals.entry(method).or_insert_with(Money::zero) += charge.paid_amount;
        }
        totals
    }
}

fn require(ctx: &dyn AuthorizationContext, permission: Permission) -> Result<(), BillingError> {
    if ctx.has(permission) {
        Ok(())
    } else {
        Err(BillingError::Unauthorized(permission))
    }
}

fn validate_reason(reason: &str) -> Result<(), BillingError> {
    if reason.trim().chars().count() < 10 {
        return Err(BillingError::validation_field(
            "reason",
            "Reason must be at least 10 characters",
        ));
    }
    Ok(())
}

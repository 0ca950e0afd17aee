use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::EntityId;

use super::{FeeObligation, InstallmentObligation};

/// one allocation produced by the waterfall, in priority order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Allocation {
    Fee {
        id: EntityId,
        amount: Money,
    },
    Installment {
        id: EntityId,
        seq: u32,
        profit_paid: Money,
        principal_paid: Money,
    },
}

impl Allocation {
    pub fn amount(&self) -> Money {
        match self {
            Allocation::Fee { amount, .. } => *amount,
            Allocation::Installment {
                profit_paid,
                principal_paid,
                ..
            } => *profit_paid + *principal_paid,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        match self {
            Allocation::Fee { id, .. } => *id,
            Allocation::Installment { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub allocations: Vec<Allocation>,
    pub credit_balance: Money,
}

impl WaterfallResult {
    pub fn total_allocated(&self) -> Money {
        self.allocations.iter().map(|a| a.amount()).sum()
    }
}

/// Allocate `available` across obligations in the fixed priority order:
/// fees by due date (stable on ties), then installments by seq, profit
/// before principal within each installment. Every obligation appears in
/// the output even when it receives zero. Negative `available` is a
/// programmer error.
pub fn waterfall(
    fees: &[FeeObligation],
    installments: &[InstallmentObligation],
    available: Money,
) -> WaterfallResult {
    debug_assert!(!available.is_negative(), "available must be non-negative");

    let mut ordered_fees: Vec<&FeeObligation> = fees.iter().collect();
    ordered_fees.sort_by_key(|f| f.due_date);

    let mut ordered_installments: Vec<&InstallmentObligation> = installments.iter().collect();
    ordered_installments.sort_by_key(|i| i.seq);

    let mut remaining = available;
    let mut allocations = Vec::with_capacity(ordered_fees.len() + ordered_installments.len());

    for fee in ordered_fees {
        let amount = remaining.min(fee.amount).max(Money::ZERO);
        remaining -= amount;
        allocations.push(Allocation::Fee { id: fee.id, amount });
    }

    for installment in ordered_installments {
        let profit_paid = remaining.min(installment.profit_due).max(Money::ZERO);
        remaining -= profit_paid;
        let principal_paid = remaining.min(installment.principal_due).max(Money::ZERO);
        remaining -= principal_paid;
        allocations.push(Allocation::Installment {
            id: installment.id,
            seq: installment.seq,
            profit_paid,
            principal_paid,
        });
    }

    WaterfallResult {
        allocations,
        credit_balance: remaining,
    }
}

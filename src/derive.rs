use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::facts::{DepositMovement, Disbursement, Fact, Payment, PrincipalAllocation};
use crate::payments::{waterfall, Allocation, FeeObligation, InstallmentObligation};
use crate::state::{
    ContractState, ContractTotals, DepositSummary, FeeState, InstallmentState,
};
use crate::store::View;
use crate::types::{DepositType, DisbursementType, EntityId, FeeStatus, InstallmentStatus};

/// Derive the full contract picture at a business date. Pure over the
/// view: same view, same date, same answer. Flow facts dated after
/// `as_of` do not participate; schedule facts always do.
pub fn contract_state(view: &View, contract_id: EntityId, as_of: NaiveDate) -> Result<ContractState> {
    // 1. query-facts
    let contract = view.contract(contract_id)?.clone();
    let installments = view.installments(contract_id);
    if installments.is_empty() {
        return Err(LedgerError::consistency(
            Some(contract_id),
            "contract has no installment schedule",
        ));
    }
    for (idx, installment) in installments.iter().enumerate() {
        let expected = (idx + 1) as u32;
        if installment.seq != expected {
            return Err(LedgerError::consistency(
                Some(contract_id),
                format!("installment seq {} found where {expected} expected", installment.seq),
            ));
        }
    }
    let fees = view.fees(contract_id);

    let payments: Vec<&Payment> = view
        .payments(contract_id)
        .into_iter()
        .filter(|p| p.date <= as_of)
        .collect();
    let disbursements: Vec<&Disbursement> = view
        .disbursements(contract_id)
        .into_iter()
        .filter(|d| d.date <= as_of)
        .collect();
    let deposits: Vec<&DepositMovement> = view
        .deposit_movements(contract_id)
        .into_iter()
        .filter(|d| d.date <= as_of)
        .collect();
    let principal_allocations: Vec<&PrincipalAllocation> = view
        .principal_allocations(contract_id)
        .into_iter()
        .filter(|p| p.date <= as_of)
        .collect();

    // 2. compute-waterfall-total
    let waterfall_total =
        compute_waterfall_total(&payments, &principal_allocations, &deposits, &disbursements);

    // 3. waterfall; a net-negative total (reversals past receipts) allocates nothing
    let fee_obligations: Vec<FeeObligation> = fees.iter().map(|f| FeeObligation::from(*f)).collect();
    let installment_obligations: Vec<InstallmentObligation> = installments
        .iter()
        .map(|i| InstallmentObligation::from(*i))
        .collect();
    let available = waterfall_total.max(Money::ZERO);
    let result = waterfall(&fee_obligations, &installment_obligations, available);

    // 4. enrich with allocations and derive statuses
    let mut fee_allocations: HashMap<EntityId, Money> = HashMap::new();
    let mut installment_allocations: HashMap<EntityId, (Money, Money)> = HashMap::new();
    for allocation in &result.allocations {
        match allocation {
            Allocation::Fee { id, amount } => {
                fee_allocations.insert(*id, *amount);
            }
            Allocation::Installment {
                id,
                profit_paid,
                principal_paid,
                ..
            } => {
                installment_allocations.insert(*id, (*profit_paid, *principal_paid));
            }
        }
    }

    let fee_states: Vec<FeeState> = fees
        .iter()
        .map(|fee| {
            let paid = fee_allocations.get(&fee.id).copied().unwrap_or(Money::ZERO);
            FeeState {
                fee: (*fee).clone(),
                paid,
                outstanding: fee.amount - paid,
                status: if paid >= fee.amount {
                    FeeStatus::Paid
                } else {
                    FeeStatus::Unpaid
                },
            }
        })
        .collect();

    let installment_states: Vec<InstallmentState> = installments
        .iter()
        .map(|installment| {
            let (profit_paid, principal_paid) = installment_allocations
                .get(&installment.id)
                .copied()
                .unwrap_or((Money::ZERO, Money::ZERO));
            let total_due = installment.profit_due + installment.principal_due;
            let total_paid = profit_paid + principal_paid;
            let status = if total_paid >= total_due {
                InstallmentStatus::Paid
            } else if total_paid.is_positive() {
                InstallmentStatus::Partial
            } else if installment.due_date < as_of {
                InstallmentStatus::Overdue
            } else {
                InstallmentStatus::Scheduled
            };
            InstallmentState {
                installment: (*installment).clone(),
                profit_paid,
                principal_paid,
                outstanding: total_due - total_paid,
                status,
            }
        })
        .collect();

    // 5. deposit derivation
    let deposit_summary = derive_deposits(&deposits);

    // 6. aggregate totals
    let totals = aggregate_totals(&fee_states, &installment_states);
    let maturity_date = installments.iter().map(|i| i.due_date).max();
    let borrower = view.party(contract.borrower).cloned();
    let facility = contract
        .facility
        .and_then(|id| view.facility(id).ok())
        .cloned();
    let linked = linked_contracts(view, contract_id);

    Ok(ContractState {
        contract,
        as_of,
        borrower,
        fees: fee_states,
        installments: installment_states,
        deposits: deposit_summary,
        totals,
        waterfall_total,
        credit_balance: result.credit_balance,
        maturity_date,
        facility,
        linked_contracts: linked,
    })
}

/// the inflow the waterfall allocates: payments + principal allocations +
/// offset deposits, minus refund disbursements. Funding and excess-return
/// disbursements never enter; received/refund/transfer deposits only move
/// the deposit holding.
fn compute_waterfall_total(
    payments: &[&Payment],
    principal_allocations: &[&PrincipalAllocation],
    deposits: &[&DepositMovement],
    disbursements: &[&Disbursement],
) -> Money {
    let payment_total: Money = payments.iter().map(|p| p.amount).sum();
    let allocation_total: Money = principal_allocations.iter().map(|p| p.amount).sum();
    let offset_total: Money = deposits
        .iter()
        .filter(|d| d.movement_type == DepositType::Offset)
        .map(|d| d.amount)
        .sum();
    let refund_total: Money = disbursements
        .iter()
        .filter(|d| d.disbursement_type == DisbursementType::Refund)
        .map(|d| d.amount)
        .sum();
    payment_total + allocation_total + offset_total - refund_total
}

fn derive_deposits(deposits: &[&DepositMovement]) -> DepositSummary {
    let mut summary = DepositSummary::default();
    for movement in deposits {
        match movement.movement_type {
            DepositType::Received => summary.received += movement.amount,
            DepositType::Refund => summary.refunded += movement.amount,
            DepositType::Offset => summary.offset += movement.amount,
            DepositType::TransferIn => summary.transferred_in += movement.amount,
            DepositType::TransferOut => summary.transferred_out += movement.amount,
        }
    }
    summary.held = summary.received - summary.refunded - summary.offset + summary.transferred_in
        - summary.transferred_out;
    summary
}

fn aggregate_totals(fees: &[FeeState], installments: &[InstallmentState]) -> ContractTotals {
    let mut totals = ContractTotals::default();
    for fee in fees {
        totals.fees_due += fee.fee.amount;
        totals.fees_paid += fee.paid;
    }
    for installment in installments {
        totals.principal_due += installment.installment.principal_due;
        totals.principal_paid += installment.principal_paid;
        totals.profit_due += installment.installment.profit_due;
        totals.profit_paid += installment.profit_paid;
    }
    totals.outstanding = (totals.fees_due - totals.fees_paid)
        + (totals.principal_due - totals.principal_paid)
        + (totals.profit_due - totals.profit_paid);
    totals
}

/// contracts connected through inter-contract payments, deposit transfer
/// pairs, or a shared facility
pub fn linked_contracts(view: &View, contract_id: EntityId) -> Vec<EntityId> {
    let mut linked: Vec<EntityId> = Vec::new();
    let mut push = |id: EntityId| {
        if id != contract_id && !linked.contains(&id) {
            linked.push(id);
        }
    };

    for fact in view.iter() {
        match fact {
            Fact::Payment(p) => {
                if p.contract == contract_id {
                    if let Some(source) = p.source_contract {
                        push(source);
                    }
                } else if p.source_contract == Some(contract_id) {
                    push(p.contract);
                }
            }
            Fact::DepositMovement(d) => {
                if d.contract == contract_id {
                    if let Some(paired) = d.paired_contract {
                        push(paired);
                    }
                } else if d.paired_contract == Some(contract_id) {
                    push(d.contract);
                }
            }
            _ => {}
        }
    }

    if let Ok(contract) = view.contract(contract_id) {
        if let Some(facility) = contract.facility {
            for sibling in view.contracts_of_facility(facility) {
                push(sibling.id);
            }
        }
    }
    linked
}

/// how origination obligations were funded out of the contract principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingBreakdown {
    pub principal: Money,
    pub net_disbursement: Option<Money>,
    pub principal_allocated: Money,
    pub excess_returned: Money,
    pub fees_outstanding: Money,
    pub balanced: bool,
}

/// Check that principal splits cleanly into the net amount disbursed, the
/// portion allocated to origination obligations, and any excess returned,
/// and that origination fees ended up covered.
pub fn funding_breakdown(view: &View, contract_id: EntityId, as_of: NaiveDate) -> Result<FundingBreakdown> {
    let state = contract_state(view, contract_id, as_of)?;

    let principal_allocated: Money = view
        .principal_allocations(contract_id)
        .iter()
        .filter(|p| p.date <= as_of)
        .map(|p| p.amount)
        .sum();
    let excess_returned: Money = view
        .disbursements(contract_id)
        .iter()
        .filter(|d| d.disbursement_type == DisbursementType::ExcessReturn && d.date <= as_of)
        .map(|d| d.amount)
        .sum();

    let fees_outstanding = state.totals.fees_due - state.totals.fees_paid;
    let principal = state.contract.principal;
    let net_disbursement = state.contract.net_disbursement;

    let split_balances = match net_disbursement {
        Some(net) => net + principal_allocated + excess_returned == principal,
        None => true,
    };

    Ok(FundingBreakdown {
        principal,
        net_disbursement,
        principal_allocated,
        excess_returned,
        fees_outstanding,
        balanced: split_balances && fees_outstanding.is_zero(),
    })
}

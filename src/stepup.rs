use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::derive::contract_state;
use crate::errors::{LedgerError, Result};
use crate::store::View;
use crate::types::{EntityId, InstallmentStatus};

/// one step-up term: an installment range priced at `base_rate`, with an
/// optional reduced rate earned by paying the previous term on time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpRule {
    pub term_seq: u32,
    pub first_installment: u32,
    pub last_installment: u32,
    pub base_rate: Rate,
    pub on_time_rate: Option<Rate>,
}

/// serialize rule rows for storage on the contract
pub fn serialize_step_up_terms(rules: &[StepUpRule]) -> Result<String> {
    serde_json::to_string(rules)
        .map_err(|e| LedgerError::configuration(format!("cannot serialize step-up terms: {e}")))
}

/// parse the contract's serialized rule rows; malformed configuration is
/// a `Configuration` error, never a panic
pub fn parse_step_up_terms(raw: &str) -> Result<Vec<StepUpRule>> {
    let rules: Vec<StepUpRule> = serde_json::from_str(raw)
        .map_err(|e| LedgerError::configuration(format!("malformed step-up terms: {e}")))?;
    for rule in &rules {
        if rule.first_installment < 1 || rule.last_installment < rule.first_installment {
            return Err(LedgerError::configuration(format!(
                "step-up term {} has an invalid installment range {}..{}",
                rule.term_seq, rule.first_installment, rule.last_installment
            )));
        }
    }
    Ok(rules)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepUpAction {
    /// the next term earned its reduced rate
    ApplyReduction,
    /// the next term stays on its base rate
    KeepBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpEvaluation {
    /// the term the suggested rate applies to
    pub term_seq: u32,
    pub suggested_rate: Rate,
    pub rate_change: bool,
    pub action: StepUpAction,
}

/// Evaluate the step-up rule after `completed_term`: when every
/// installment of that term was paid as of its own due date, the next
/// term is priced at its on-time rate. Applying the change is a separate
/// rate-adjustment operation.
pub fn evaluate_step_up(
    view: &View,
    contract_id: EntityId,
    completed_term: u32,
) -> Result<StepUpEvaluation> {
    let contract = view.contract(contract_id)?;
    let raw = contract.step_up_terms.as_deref().ok_or_else(|| {
        LedgerError::configuration("contract carries no step-up terms")
    })?;
    let rules = parse_step_up_terms(raw)?;

    let completed = rules
        .iter()
        .find(|r| r.term_seq == completed_term)
        .ok_or_else(|| {
            LedgerError::configuration(format!("no step-up term {completed_term}"))
        })?;
    let next = rules
        .iter()
        .find(|r| r.term_seq == completed_term + 1)
        .ok_or_else(|| {
            LedgerError::configuration(format!("no step-up term after {completed_term}"))
        })?;

    let on_time = term_paid_on_time(view, contract_id, completed)?;

    match next.on_time_rate {
        Some(reduced) if on_time && reduced != next.base_rate => Ok(StepUpEvaluation {
            term_seq: next.term_seq,
            suggested_rate: reduced,
            rate_change: true,
            action: StepUpAction::ApplyReduction,
        }),
        _ => Ok(StepUpEvaluation {
            term_seq: next.term_seq,
            suggested_rate: next.base_rate,
            rate_change: false,
            action: StepUpAction::KeepBase,
        }),
    }
}

/// every installment in the term's range must derive as paid on a view
/// taken at its own due date
fn term_paid_on_time(view: &View, contract_id: EntityId, term: &StepUpRule) -> Result<bool> {
    let installments = view.installments(contract_id);
    for seq in term.first_installment..=term.last_installment {
        let installment = installments
            .iter()
            .find(|i| i.seq == seq)
            .ok_or_else(|| {
                LedgerError::consistency(
                    Some(contract_id),
                    format!("step-up term {} names missing installment {seq}", term.term_seq),
                )
            })?;
        let state = contract_state(view, contract_id, installment.due_date)?;
        let row = state.installment(seq).ok_or_else(|| {
            LedgerError::consistency(Some(contract_id), format!("installment {seq} not derived"))
        })?;
        if row.status != InstallmentStatus::Paid {
            return Ok(false);
        }
    }
    Ok(true)
}

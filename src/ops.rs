use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::dates::{accrued_profit, days_between};
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::facts::{
    BankingDetails, CommodityTerms, Contract, DepositMovement, Disbursement, Fact, Facility, Fee,
    Installment, Party, PartyIdentity, Payment, PrincipalAllocation, RateAdjustment,
};
use crate::store::{FactStore, View};
use crate::stepup::{serialize_step_up_terms, StepUpRule};
use crate::types::{
    DepositSource, DepositType, DisbursementType, EntityId, FeeType, TxId, TxMetadata,
};

/// one schedule row of a boarding request; the remaining principal is
/// computed from the rows before it
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentSpec {
    pub seq: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub profit_due: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeSpec {
    pub fee_type: FeeType,
    pub amount: Money,
    pub due_date: NaiveDate,
}

/// everything boarding asserts in one atomic batch
#[derive(Debug, Clone, PartialEq)]
pub struct BoardingRequest {
    pub external_id: String,
    pub borrower: EntityId,
    pub principal: Money,
    pub security_deposit_required: Money,
    pub start_date: NaiveDate,
    pub step_up_terms: Option<Vec<StepUpRule>>,
    pub net_disbursement: Option<Money>,
    pub commodity: Option<CommodityTerms>,
    pub banking: Option<BankingDetails>,
    pub facility: Option<EntityId>,
    pub authorized_signatories: Vec<EntityId>,
    pub installments: Vec<InstallmentSpec>,
    pub fees: Vec<FeeSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardingOutcome {
    pub contract_id: EntityId,
    pub installment_ids: Vec<EntityId>,
    pub fee_ids: Vec<EntityId>,
    pub tx: TxId,
}

/// Board a contract: contract, schedule, and boarding fees commit in one
/// transaction or not at all.
pub fn board_contract(
    store: &mut impl FactStore,
    request: BoardingRequest,
    meta: TxMetadata,
) -> Result<BoardingOutcome> {
    let contract_id = Uuid::new_v4();
    let step_up_terms = request
        .step_up_terms
        .as_deref()
        .map(serialize_step_up_terms)
        .transpose()?;

    let mut facts = vec![Fact::Contract(Contract {
        id: contract_id,
        external_id: request.external_id.clone(),
        borrower: request.borrower,
        principal: request.principal,
        security_deposit_required: request.security_deposit_required,
        start_date: request.start_date,
        step_up_terms,
        net_disbursement: request.net_disbursement,
        commodity: request.commodity,
        banking: request.banking,
        facility: request.facility,
        authorized_signatories: request.authorized_signatories,
    })];

    let mut rows = request.installments;
    rows.sort_by_key(|r| r.seq);
    let mut remaining = request.principal;
    let mut installment_ids = Vec::with_capacity(rows.len());
    for row in rows {
        let id = Uuid::new_v4();
        installment_ids.push(id);
        facts.push(Fact::Installment(Installment {
            id,
            contract: contract_id,
            seq: row.seq,
            due_date: row.due_date,
            principal_due: row.principal_due,
            profit_due: row.profit_due,
            remaining_principal: remaining,
        }));
        remaining -= row.principal_due;
    }

    let mut fee_ids = Vec::with_capacity(request.fees.len());
    for fee in request.fees {
        let id = Uuid::new_v4();
        fee_ids.push(id);
        facts.push(Fact::Fee(Fee {
            id,
            contract: contract_id,
            fee_type: fee.fee_type,
            amount: fee.amount,
            due_date: fee.due_date,
        }));
    }

    let tx = store.append(facts, meta)?;
    info!(contract = %contract_id, external_id = %request.external_id, tx, "boarded contract");
    Ok(BoardingOutcome {
        contract_id,
        installment_ids,
        fee_ids,
        tx,
    })
}

pub fn create_company(
    store: &mut impl FactStore,
    legal_name: impl Into<String>,
    cr_number: impl Into<String>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let party = Party {
        id: Uuid::new_v4(),
        legal_name: legal_name.into(),
        identity: PartyIdentity::Company {
            cr_number: cr_number.into(),
        },
    };
    let id = party.id;
    let tx = store.append(vec![Fact::Party(party)], meta)?;
    Ok((id, tx))
}

pub fn create_person(
    store: &mut impl FactStore,
    legal_name: impl Into<String>,
    national_id: impl Into<String>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let party = Party {
        id: Uuid::new_v4(),
        legal_name: legal_name.into(),
        identity: PartyIdentity::Person {
            national_id: national_id.into(),
        },
    };
    let id = party.id;
    let tx = store.append(vec![Fact::Party(party)], meta)?;
    Ok((id, tx))
}

pub fn create_facility(
    store: &mut impl FactStore,
    external_id: impl Into<String>,
    borrower: EntityId,
    credit_limit: Money,
    template_terms: Option<Vec<StepUpRule>>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let facility = Facility {
        id: Uuid::new_v4(),
        external_id: external_id.into(),
        borrower,
        credit_limit,
        template_terms: template_terms
            .as_deref()
            .map(serialize_step_up_terms)
            .transpose()?,
    };
    let id = facility.id;
    let tx = store.append(vec![Fact::Facility(facility)], meta)?;
    Ok((id, tx))
}

pub fn record_payment(
    store: &mut impl FactStore,
    contract: EntityId,
    amount: Money,
    date: NaiveDate,
    reference: impl Into<String>,
    source_contract: Option<EntityId>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let payment = Payment {
        id: Uuid::new_v4(),
        contract,
        amount,
        date,
        reference: reference.into(),
        source_contract,
    };
    let id = payment.id;
    let tx = store.append(vec![Fact::Payment(payment)], meta)?;
    info!(%contract, payment = %id, %amount, tx, "recorded payment");
    Ok((id, tx))
}

/// Record the compensating negative payment for a real-world undo (a
/// bounced check). The original stays asserted; retraction is for
/// recording errors, reversal is for facts that really happened.
pub fn reverse_payment(
    store: &mut impl FactStore,
    original: EntityId,
    date: NaiveDate,
    reference: impl Into<String>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let view = store.current();
    let payment = match view.fact(original) {
        Some(Fact::Payment(p)) => p.clone(),
        _ => return Err(LedgerError::not_found(original)),
    };
    let reversal = Payment {
        id: Uuid::new_v4(),
        contract: payment.contract,
        amount: -payment.amount,
        date,
        reference: reference.into(),
        source_contract: payment.source_contract,
    };
    let id = reversal.id;
    let tx = store.append(vec![Fact::Payment(reversal)], meta.correcting(original))?;
    Ok((id, tx))
}

pub fn record_disbursement(
    store: &mut impl FactStore,
    contract: EntityId,
    disbursement_type: DisbursementType,
    amount: Money,
    date: NaiveDate,
    reference: impl Into<String>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let disbursement = Disbursement {
        id: Uuid::new_v4(),
        contract,
        disbursement_type,
        amount,
        date,
        reference: reference.into(),
    };
    let id = disbursement.id;
    let tx = store.append(vec![Fact::Disbursement(disbursement)], meta)?;
    Ok((id, tx))
}

pub fn record_deposit(
    store: &mut impl FactStore,
    contract: EntityId,
    movement_type: DepositType,
    amount: Money,
    date: NaiveDate,
    source: Option<DepositSource>,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let movement = DepositMovement {
        id: Uuid::new_v4(),
        contract,
        movement_type,
        amount,
        date,
        source,
        paired_contract: None,
    };
    let id = movement.id;
    let tx = store.append(vec![Fact::DepositMovement(movement)], meta)?;
    Ok((id, tx))
}

/// move held collateral between two contracts; both legs commit together
pub fn transfer_deposit(
    store: &mut impl FactStore,
    from_contract: EntityId,
    to_contract: EntityId,
    amount: Money,
    date: NaiveDate,
    meta: TxMetadata,
) -> Result<(EntityId, EntityId, TxId)> {
    let out_leg = DepositMovement {
        id: Uuid::new_v4(),
        contract: from_contract,
        movement_type: DepositType::TransferOut,
        amount,
        date,
        source: None,
        paired_contract: Some(to_contract),
    };
    let in_leg = DepositMovement {
        id: Uuid::new_v4(),
        contract: to_contract,
        movement_type: DepositType::TransferIn,
        amount,
        date,
        source: None,
        paired_contract: Some(from_contract),
    };
    let out_id = out_leg.id;
    let in_id = in_leg.id;
    let tx = store.append(
        vec![
            Fact::DepositMovement(out_leg),
            Fact::DepositMovement(in_leg),
        ],
        meta,
    )?;
    Ok((out_id, in_id, tx))
}

pub fn record_principal_allocation(
    store: &mut impl FactStore,
    contract: EntityId,
    amount: Money,
    date: NaiveDate,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let allocation = PrincipalAllocation {
        id: Uuid::new_v4(),
        contract,
        amount,
        date,
    };
    let id = allocation.id;
    let tx = store.append(vec![Fact::PrincipalAllocation(allocation)], meta)?;
    Ok((id, tx))
}

pub fn charge_fee(
    store: &mut impl FactStore,
    contract: EntityId,
    spec: FeeSpec,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let fee = Fee {
        id: Uuid::new_v4(),
        contract,
        fee_type: spec.fee_type,
        amount: spec.amount,
        due_date: spec.due_date,
    };
    let id = fee.id;
    let tx = store.append(vec![Fact::Fee(fee)], meta)?;
    Ok((id, tx))
}

/// Reprice a contiguous range of installments at a new annual rate:
/// profit becomes remaining principal x rate x period days / 360,
/// rounded half-up to two digits. The prior values stay in history and
/// a marker fact records which rows the adjustment touched.
pub fn adjust_installment_rate(
    store: &mut impl FactStore,
    contract_id: EntityId,
    first_seq: u32,
    last_seq: u32,
    new_rate: Rate,
    reason: impl Into<String>,
    meta: TxMetadata,
) -> Result<TxId> {
    let view = store.current();
    let contract = view.contract(contract_id)?.clone();
    let updated = repriced_installments(&view, &contract, first_seq, last_seq, new_rate)?;

    let mut facts: Vec<Fact> = Vec::with_capacity(updated.len() + 1);
    let touched: Vec<EntityId> = updated.iter().map(|i| i.id).collect();
    for installment in updated {
        facts.push(Fact::Installment(installment));
    }
    facts.push(Fact::RateAdjustment(RateAdjustment {
        id: Uuid::new_v4(),
        contract: contract_id,
        installments: touched,
        reason: reason.into(),
    }));

    let tx = store.append(facts, meta)?;
    info!(contract = %contract_id, first_seq, last_seq, rate = %new_rate, tx, "adjusted installment rate");
    Ok(tx)
}

fn repriced_installments(
    view: &View,
    contract: &Contract,
    first_seq: u32,
    last_seq: u32,
    rate: Rate,
) -> Result<Vec<Installment>> {
    if first_seq < 1 || last_seq < first_seq {
        return Err(LedgerError::single(
            "rate-adjustment/installments",
            format!("invalid seq range {first_seq}..{last_seq}"),
        ));
    }
    let installments = view.installments(contract.id);
    let mut updated = Vec::with_capacity((last_seq - first_seq + 1) as usize);
    for seq in first_seq..=last_seq {
        let installment = installments
            .iter()
            .find(|i| i.seq == seq)
            .ok_or_else(|| {
                LedgerError::consistency(
                    Some(contract.id),
                    format!("rate adjustment names missing installment {seq}"),
                )
            })?;
        let period_start = if seq == 1 {
            contract.start_date
        } else {
            installments
                .iter()
                .find(|i| i.seq == seq - 1)
                .map(|i| i.due_date)
                .ok_or_else(|| {
                    LedgerError::consistency(
                        Some(contract.id),
                        format!("installment {} missing before {seq}", seq - 1),
                    )
                })?
        };
        let days = days_between(period_start, installment.due_date);
        let mut repriced = (*installment).clone();
        repriced.profit_due =
            accrued_profit(installment.remaining_principal, rate, days).round_dp(2);
        updated.push(repriced);
    }
    Ok(updated)
}

/// Restructure: re-assert the given schedule rows with new values (profit,
/// principal, remaining principal) plus a marker fact. History preserves
/// what the schedule said before.
pub fn restructure_installments(
    store: &mut impl FactStore,
    contract_id: EntityId,
    updated: Vec<Installment>,
    reason: impl Into<String>,
    meta: TxMetadata,
) -> Result<TxId> {
    if updated.is_empty() {
        return Err(LedgerError::single(
            "rate-adjustment/installments",
            "restructure must name at least one installment",
        ));
    }
    let touched: Vec<EntityId> = updated.iter().map(|i| i.id).collect();
    let mut facts: Vec<Fact> = updated.into_iter().map(Fact::Installment).collect();
    facts.push(Fact::RateAdjustment(RateAdjustment {
        id: Uuid::new_v4(),
        contract: contract_id,
        installments: touched,
        reason: reason.into(),
    }));
    store.append(facts, meta)
}

/// retract an erroneously recorded fact; owned children cascade and the
/// reason taxonomy travels on the commit metadata
pub fn retract_fact(
    store: &mut impl FactStore,
    entity: EntityId,
    meta: TxMetadata,
) -> Result<TxId> {
    store.retract_entity(entity, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{contract_state, linked_contracts};
    use crate::store::MemoryStore;
    use crate::stepup::{evaluate_step_up, StepUpAction};
    use crate::types::{InstallmentStatus, ReasonTag};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn meta(reason: ReasonTag) -> TxMetadata {
        TxMetadata::new("tester", reason)
    }

    /// eight monthly installments of 100,000 principal each; term 1
    /// priced at 15%, term 2 at 18% with a 15% on-time rate
    fn board_step_up_contract(store: &mut MemoryStore) -> BoardingOutcome {
        let borrower = create_company(store, "Wadi Steel Co", "CR-9090", meta(ReasonTag::PartyCreated))
            .unwrap()
            .0;
        let mut installments = Vec::new();
        for seq in 1..=8u32 {
            let remaining = Money::from_major(800_000 - (seq as i64 - 1) * 100_000);
            let due = d(2024, seq + 1, 1);
            let period_start = if seq == 1 { d(2024, 1, 1) } else { d(2024, seq, 1) };
            let rate = if seq <= 4 {
                Rate::from_percentage(15)
            } else {
                Rate::from_percentage(18)
            };
            installments.push(InstallmentSpec {
                seq,
                due_date: due,
                principal_due: Money::from_major(100_000),
                profit_due: accrued_profit(remaining, rate, days_between(period_start, due))
                    .round_dp(2),
            });
        }
        board_contract(
            store,
            BoardingRequest {
                external_id: "MRB-STEPUP".to_string(),
                borrower,
                principal: Money::from_major(800_000),
                security_deposit_required: Money::ZERO,
                start_date: d(2024, 1, 1),
                step_up_terms: Some(vec![
                    StepUpRule {
                        term_seq: 1,
                        first_installment: 1,
                        last_installment: 4,
                        base_rate: Rate::from_percentage(15),
                        on_time_rate: None,
                    },
                    StepUpRule {
                        term_seq: 2,
                        first_installment: 5,
                        last_installment: 8,
                        base_rate: Rate::from_percentage(18),
                        on_time_rate: Some(Rate::from_percentage(15)),
                    },
                ]),
                net_disbursement: None,
                commodity: None,
                banking: None,
                facility: None,
                authorized_signatories: vec![],
                installments,
                fees: vec![],
            },
            meta(ReasonTag::Boarding),
        )
        .unwrap()
    }

    #[test]
    fn test_boarding_computes_remaining_principal() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        let view = store.current();
        let installments = view.installments(outcome.contract_id);
        assert_eq!(installments[0].remaining_principal, Money::from_major(800_000));
        assert_eq!(installments[4].remaining_principal, Money::from_major(400_000));
        assert_eq!(installments[7].remaining_principal, Money::from_major(100_000));
    }

    #[test]
    fn test_on_time_term_earns_reduced_rate() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        let contract_id = outcome.contract_id;

        // one early payment covers all of term 1 before its due dates
        record_payment(
            &mut store,
            contract_id,
            Money::from_major(500_000),
            d(2024, 1, 15),
            "PMT-TERM1",
            None,
            meta(ReasonTag::Payment),
        )
        .unwrap();

        let view = store.current();
        for seq in 1..=4u32 {
            let due = d(2024, seq + 1, 1);
            let state = contract_state(&view, contract_id, due).unwrap();
            assert_eq!(state.installment(seq).unwrap().status, InstallmentStatus::Paid);
        }

        let evaluation = evaluate_step_up(&view, contract_id, 1).unwrap();
        assert_eq!(evaluation.term_seq, 2);
        assert_eq!(evaluation.suggested_rate, Rate::from_percentage(15));
        assert!(evaluation.rate_change);
        assert_eq!(evaluation.action, StepUpAction::ApplyReduction);

        // apply the earned reduction to installments 5..8
        let fifth_before = view.installments(contract_id)[4].clone();
        assert_eq!(fifth_before.profit_due, Money::from_major(6_200));

        adjust_installment_rate(
            &mut store,
            contract_id,
            5,
            8,
            Rate::from_percentage(15),
            "on-time reduction earned for term 2",
            meta(ReasonTag::RateAdjustment),
        )
        .unwrap();

        let after = store.current();
        let fifth_after = after.installments(contract_id)[4].clone();
        // 400,000 x 15% x 31/360, half-up
        assert_eq!(fifth_after.profit_due, Money::from_str_exact("5166.67").unwrap());

        // old value preserved in history
        let history = store.history(fifth_before.id);
        assert_eq!(history.len(), 2);
        if let Fact::Installment(original) = &history[0].fact {
            assert_eq!(original.profit_due, Money::from_major(6_200));
        } else {
            panic!("expected installment history");
        }

        // marker fact names the touched rows
        let adjustments = after.rate_adjustments(contract_id);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].installments.len(), 4);
    }

    #[test]
    fn test_step_up_not_earned_when_term_late() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);

        // payment arrives after installment 1's due date
        record_payment(
            &mut store,
            outcome.contract_id,
            Money::from_major(500_000),
            d(2024, 2, 10),
            "PMT-LATE",
            None,
            meta(ReasonTag::Payment),
        )
        .unwrap();

        let evaluation = evaluate_step_up(&store.current(), outcome.contract_id, 1).unwrap();
        assert_eq!(evaluation.action, StepUpAction::KeepBase);
        assert!(!evaluation.rate_change);
        assert_eq!(evaluation.suggested_rate, Rate::from_percentage(18));
    }

    #[test]
    fn test_reverse_payment_requires_the_original() {
        let mut store = MemoryStore::new();
        let err = reverse_payment(
            &mut store,
            Uuid::new_v4(),
            d(2024, 1, 1),
            "REV-1",
            meta(ReasonTag::Reversal),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_reversal_links_the_corrected_fact() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        let (payment_id, _) = record_payment(
            &mut store,
            outcome.contract_id,
            Money::from_major(10_000),
            d(2024, 1, 20),
            "PMT-1",
            None,
            meta(ReasonTag::Payment),
        )
        .unwrap();
        let (reversal_id, _) = reverse_payment(
            &mut store,
            payment_id,
            d(2024, 1, 22),
            "PMT-1-REV",
            meta(ReasonTag::Reversal),
        )
        .unwrap();

        let history = store.history(reversal_id);
        assert_eq!(history[0].tx.meta.corrects, Some(payment_id));
        assert_eq!(history[0].tx.meta.reason, ReasonTag::Reversal);
        if let Fact::Payment(reversal) = &history[0].fact {
            assert_eq!(reversal.amount, Money::from_major(-10_000));
        } else {
            panic!("expected payment");
        }
    }

    #[test]
    fn test_transfer_deposit_writes_both_legs_atomically() {
        let mut store = MemoryStore::new();
        let first = board_step_up_contract(&mut store);
        let borrower = store.current().contract(first.contract_id).unwrap().borrower;
        let second = board_contract(
            &mut store,
            BoardingRequest {
                external_id: "MRB-SECOND".to_string(),
                borrower,
                principal: Money::from_major(100_000),
                security_deposit_required: Money::ZERO,
                start_date: d(2024, 1, 1),
                step_up_terms: None,
                net_disbursement: None,
                commodity: None,
                banking: None,
                facility: None,
                authorized_signatories: vec![],
                installments: vec![InstallmentSpec {
                    seq: 1,
                    due_date: d(2025, 1, 1),
                    principal_due: Money::from_major(100_000),
                    profit_due: Money::from_major(8_000),
                }],
                fees: vec![],
            },
            meta(ReasonTag::Boarding),
        )
        .unwrap();

        record_deposit(
            &mut store,
            first.contract_id,
            DepositType::Received,
            Money::from_major(50_000),
            d(2024, 1, 5),
            Some(DepositSource::Customer),
            meta(ReasonTag::DepositMovement),
        )
        .unwrap();
        transfer_deposit(
            &mut store,
            first.contract_id,
            second.contract_id,
            Money::from_major(20_000),
            d(2024, 1, 10),
            meta(ReasonTag::DepositMovement),
        )
        .unwrap();

        let view = store.current();
        let from_state = contract_state(&view, first.contract_id, d(2024, 1, 15)).unwrap();
        let to_state = contract_state(&view, second.contract_id, d(2024, 1, 15)).unwrap();
        assert_eq!(from_state.deposits.held, Money::from_major(30_000));
        assert_eq!(to_state.deposits.held, Money::from_major(20_000));
        // transfers never enter the waterfall
        assert_eq!(from_state.waterfall_total, Money::ZERO);
        assert_eq!(to_state.waterfall_total, Money::ZERO);

        assert_eq!(
            linked_contracts(&view, first.contract_id),
            vec![second.contract_id]
        );
    }

    #[test]
    fn test_migrated_commit_carries_original_date() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        let (payment_id, _) = record_payment(
            &mut store,
            outcome.contract_id,
            Money::from_major(10_000),
            d(2023, 11, 5),
            "LEGACY-331",
            None,
            meta(ReasonTag::Migration).migrated("legacy-lms", d(2023, 11, 5)),
        )
        .unwrap();

        let history = store.history(payment_id);
        assert_eq!(history[0].tx.meta.migrated_from.as_deref(), Some("legacy-lms"));
        assert_eq!(history[0].tx.meta.original_date, Some(d(2023, 11, 5)));
    }

    #[test]
    fn test_charge_fee_after_boarding() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        charge_fee(
            &mut store,
            outcome.contract_id,
            FeeSpec {
                fee_type: FeeType::Late,
                amount: Money::from_major(250),
                due_date: d(2024, 3, 5),
            },
            meta(ReasonTag::FeeCharge),
        )
        .unwrap();

        let view = store.current();
        assert_eq!(view.fees(outcome.contract_id).len(), 1);
    }

    #[test]
    fn test_restructure_reasserts_given_rows() {
        let mut store = MemoryStore::new();
        let outcome = board_step_up_contract(&mut store);
        let view = store.current();
        let mut row = view.installments(outcome.contract_id)[7].clone();
        row.principal_due = Money::from_major(50_000);
        row.profit_due = Money::from_major(700);

        restructure_installments(
            &mut store,
            outcome.contract_id,
            vec![row.clone()],
            "maturity haircut agreed",
            meta(ReasonTag::RateAdjustment),
        )
        .unwrap();

        let after = store.current();
        assert_eq!(
            after.installments(outcome.contract_id)[7].principal_due,
            Money::from_major(50_000)
        );
        assert_eq!(store.history(row.id).len(), 2);
    }

    #[test]
    fn test_derived_profit_matches_rate_formula() {
        // 400,000 at 18% over a 31-day period: 200 per day
        let profit = accrued_profit(
            Money::from_major(400_000),
            Rate::from_decimal(dec!(0.18)),
            31,
        );
        assert_eq!(profit, Money::from_major(6_200));
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::derive::contract_state;
use crate::errors::{LedgerError, Result};
use crate::facts::{Contract, DocumentParams, DocumentSnapshot, Fact, Fee, Installment, Signing};
use crate::settlement::{calculate_settlement, Settlement, SettlementParams};
use crate::state::ContractState;
use crate::store::{FactStore, View};
use crate::types::{DocumentKind, EntityId, SigningMethod, TxId, TxMetadata};

/// frozen payload of a contract agreement: the contract and its schedule
/// exactly as asserted at generation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementPayload {
    pub contract: Contract,
    pub fees: Vec<Fee>,
    pub installments: Vec<Installment>,
}

/// issue a clearance letter: the settlement amount is bound first-class
/// on the snapshot and the full breakdown is frozen as the payload
pub fn issue_clearance_letter(
    store: &mut impl FactStore,
    contract_id: EntityId,
    params: &SettlementParams,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let view = store.current();
    let settlement = clearance_quote(&view, contract_id, params)?;
    let payload = serde_json::to_string_pretty(&settlement)
        .map_err(|e| LedgerError::configuration(format!("cannot freeze settlement: {e}")))?;

    let document = DocumentSnapshot {
        id: Uuid::new_v4(),
        contract: contract_id,
        kind: DocumentKind::ClearanceLetter,
        payload,
        params: DocumentParams {
            settlement_date: Some(params.settlement_date),
            penalty_days: Some(params.penalty_days),
            manual_override: params.manual_override,
            ..DocumentParams::default()
        },
        settlement_amount: Some(settlement.settlement_amount),
        supersedes: None,
    };
    commit_document(store, document, meta)
}

/// issue a statement: the frozen payload is the contract state derived
/// as of the period end
pub fn issue_statement(
    store: &mut impl FactStore,
    contract_id: EntityId,
    period_start: NaiveDate,
    period_end: NaiveDate,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let view = store.current();
    let state = contract_state(&view, contract_id, period_end)?;
    let payload = state
        .to_json_pretty()
        .map_err(|e| LedgerError::configuration(format!("cannot freeze statement: {e}")))?;

    let document = DocumentSnapshot {
        id: Uuid::new_v4(),
        contract: contract_id,
        kind: DocumentKind::Statement,
        payload,
        params: DocumentParams {
            period_start: Some(period_start),
            period_end: Some(period_end),
            ..DocumentParams::default()
        },
        settlement_amount: None,
        supersedes: None,
    };
    commit_document(store, document, meta)
}

/// issue a contract agreement: contract plus schedule as asserted now
pub fn issue_contract_agreement(
    store: &mut impl FactStore,
    contract_id: EntityId,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let view = store.current();
    let payload_value = AgreementPayload {
        contract: view.contract(contract_id)?.clone(),
        fees: view.fees(contract_id).into_iter().cloned().collect(),
        installments: view.installments(contract_id).into_iter().cloned().collect(),
    };
    let payload = serde_json::to_string_pretty(&payload_value)
        .map_err(|e| LedgerError::configuration(format!("cannot freeze agreement: {e}")))?;

    let document = DocumentSnapshot {
        id: Uuid::new_v4(),
        contract: contract_id,
        kind: DocumentKind::ContractAgreement,
        payload,
        params: DocumentParams::default(),
        settlement_amount: None,
        supersedes: None,
    };
    commit_document(store, document, meta)
}

/// issue a generic report: the caller supplies the frozen payload
pub fn issue_report(
    store: &mut impl FactStore,
    contract_id: EntityId,
    payload: impl Into<String>,
    params: DocumentParams,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let document = DocumentSnapshot {
        id: Uuid::new_v4(),
        contract: contract_id,
        kind: DocumentKind::Report,
        payload: payload.into(),
        params,
        settlement_amount: None,
        supersedes: None,
    };
    commit_document(store, document, meta)
}

/// regenerate a document against the current view; the replacement
/// references the one it supersedes, both remain in history
pub fn supersede_document(
    store: &mut impl FactStore,
    document_id: EntityId,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let view = store.current();
    let old = view.document(document_id)?.clone();

    let (payload, settlement_amount) = match old.kind {
        DocumentKind::ClearanceLetter => {
            let params = clearance_params(&old)?;
            let settlement = clearance_quote(&view, old.contract, &params)?;
            let payload = serde_json::to_string_pretty(&settlement)
                .map_err(|e| LedgerError::configuration(format!("cannot freeze settlement: {e}")))?;
            (payload, Some(settlement.settlement_amount))
        }
        DocumentKind::Statement => {
            let period_end = old.params.period_end.ok_or_else(|| {
                LedgerError::configuration("statement snapshot is missing its period end")
            })?;
            let state = contract_state(&view, old.contract, period_end)?;
            let payload = state
                .to_json_pretty()
                .map_err(|e| LedgerError::configuration(format!("cannot freeze statement: {e}")))?;
            (payload, None)
        }
        DocumentKind::ContractAgreement => {
            let payload_value = AgreementPayload {
                contract: view.contract(old.contract)?.clone(),
                fees: view.fees(old.contract).into_iter().cloned().collect(),
                installments: view.installments(old.contract).into_iter().cloned().collect(),
            };
            let payload = serde_json::to_string_pretty(&payload_value)
                .map_err(|e| LedgerError::configuration(format!("cannot freeze agreement: {e}")))?;
            (payload, None)
        }
        DocumentKind::Report => {
            return Err(LedgerError::configuration(
                "generic reports carry caller-supplied payloads and cannot be regenerated",
            ));
        }
    };

    let replacement = DocumentSnapshot {
        id: Uuid::new_v4(),
        contract: old.contract,
        kind: old.kind,
        payload,
        params: old.params.clone(),
        settlement_amount,
        supersedes: Some(old.id),
    };
    commit_document(store, replacement, meta)
}

/// record one signature; (document, signatory) is unique
pub fn sign_document(
    store: &mut impl FactStore,
    document: EntityId,
    signatory: EntityId,
    method: SigningMethod,
    date: NaiveDate,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let signing = Signing {
        id: Uuid::new_v4(),
        document,
        signatory,
        method,
        date,
    };
    let id = signing.id;
    let tx = store.append(vec![Fact::Signing(signing)], meta)?;
    Ok((id, tx))
}

/// retract an erroneously generated document; its signings cascade
pub fn retract_document(
    store: &mut impl FactStore,
    document: EntityId,
    meta: TxMetadata,
) -> Result<TxId> {
    store.retract_entity(document, meta)
}

fn commit_document(
    store: &mut impl FactStore,
    document: DocumentSnapshot,
    meta: TxMetadata,
) -> Result<(EntityId, TxId)> {
    let id = document.id;
    let kind = document.kind;
    let tx = store.append(vec![Fact::DocumentSnapshot(document)], meta)?;
    info!(document = %id, ?kind, tx, "issued document snapshot");
    Ok((id, tx))
}

/// the latest snapshot of `kind` that no asserted snapshot supersedes
pub fn active_document<'a>(
    view: &'a View,
    contract_id: EntityId,
    kind: DocumentKind,
) -> Option<&'a DocumentSnapshot> {
    let documents = view.documents(contract_id);
    documents
        .iter()
        .filter(|d| d.kind == kind)
        .filter(|d| {
            !documents
                .iter()
                .any(|other| other.supersedes == Some(d.id))
        })
        .last()
        .copied()
}

/// true when every authorized signatory has a live signing on the latest
/// active contract agreement
pub fn contract_signed(view: &View, contract_id: EntityId) -> Result<bool> {
    let contract = view.contract(contract_id)?;
    let agreement = match active_document(view, contract_id, DocumentKind::ContractAgreement) {
        Some(doc) => doc,
        None => return Ok(false),
    };
    let signings = view.signings(agreement.id);
    Ok(contract
        .authorized_signatories
        .iter()
        .all(|party| signings.iter().any(|s| s.signatory == *party)))
}

/// one field that no longer derives to its frozen value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: String,
    pub frozen: String,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionReport {
    pub document: EntityId,
    pub deltas: Vec<FieldDelta>,
}

impl ContradictionReport {
    /// facts changed since issuance, legitimately or by correction
    pub fn contradicts(&self) -> bool {
        !self.deltas.is_empty()
    }
}

/// Recompute a clearance letter's parameters against the current view and
/// report every field whose derived value moved away from the frozen one.
pub fn check_clearance_contradictions(
    view: &View,
    document_id: EntityId,
) -> Result<ContradictionReport> {
    let document = view.document(document_id)?;
    if document.kind != DocumentKind::ClearanceLetter {
        return Err(LedgerError::configuration(
            "contradiction check applies to clearance letters",
        ));
    }

    let frozen: Settlement = serde_json::from_str(&document.payload)
        .map_err(|e| LedgerError::configuration(format!("unreadable frozen payload: {e}")))?;
    let params = clearance_params(document)?;
    let current = clearance_quote(view, document.contract, &params)?;

    let mut deltas = Vec::new();
    let mut compare = |field: &str, frozen: String, current: String| {
        if frozen != current {
            deltas.push(FieldDelta {
                field: field.to_string(),
                frozen,
                current,
            });
        }
    };
    compare(
        "settlement-amount",
        frozen.settlement_amount.to_string(),
        current.settlement_amount.to_string(),
    );
    compare(
        "outstanding-principal",
        frozen.outstanding_principal.to_string(),
        current.outstanding_principal.to_string(),
    );
    compare(
        "accrued-unpaid-profit",
        frozen.accrued_unpaid_profit.to_string(),
        current.accrued_unpaid_profit.to_string(),
    );
    compare(
        "outstanding-fees",
        frozen.outstanding_fees.to_string(),
        current.outstanding_fees.to_string(),
    );
    compare(
        "credit-balance",
        frozen.credit_balance.to_string(),
        current.credit_balance.to_string(),
    );
    compare(
        "penalty-amount",
        frozen.penalty_amount.to_string(),
        current.penalty_amount.to_string(),
    );
    compare(
        "refund-due",
        frozen.refund_due.to_string(),
        current.refund_due.to_string(),
    );

    Ok(ContradictionReport {
        document: document_id,
        deltas,
    })
}

fn clearance_params(document: &DocumentSnapshot) -> Result<SettlementParams> {
    let settlement_date = document.params.settlement_date.ok_or_else(|| {
        LedgerError::configuration("clearance snapshot is missing its settlement date")
    })?;
    Ok(SettlementParams {
        settlement_date,
        penalty_days: document.params.penalty_days.unwrap_or(0),
        manual_override: document.params.manual_override,
        annual_rate: None,
    })
}

fn clearance_quote(
    view: &View,
    contract_id: EntityId,
    params: &SettlementParams,
) -> Result<Settlement> {
    let state = contract_state(view, contract_id, params.settlement_date)?;
    calculate_settlement(&state, params)
}

/// frozen statement payload parsed back into a contract state
pub fn parse_statement_payload(document: &DocumentSnapshot) -> Result<ContractState> {
    if document.kind != DocumentKind::Statement {
        return Err(LedgerError::configuration("not a statement snapshot"));
    }
    ContractState::from_json(&document.payload)
        .map_err(|e| LedgerError::configuration(format!("unreadable frozen payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::ops::{self, BoardingRequest, FeeSpec, InstallmentSpec};
    use crate::store::MemoryStore;
    use crate::types::{FeeType, ReasonTag};
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn meta(reason: ReasonTag) -> TxMetadata {
        TxMetadata::new("tester", reason)
    }

    struct Fixture {
        store: MemoryStore,
        contract_id: EntityId,
        signatories: Vec<EntityId>,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        let borrower = ops::create_company(
            &mut store,
            "Misk Foods Co",
            "CR-7070",
            meta(ReasonTag::PartyCreated),
        )
        .unwrap()
        .0;
        let signer_a = ops::create_person(
            &mut store,
            "Huda Rahman",
            "NID-1001",
            meta(ReasonTag::PartyCreated),
        )
        .unwrap()
        .0;
        let signer_b = ops::create_person(
            &mut store,
            "Tarek Aziz",
            "NID-1002",
            meta(ReasonTag::PartyCreated),
        )
        .unwrap()
        .0;
        let outcome = ops::board_contract(
            &mut store,
            BoardingRequest {
                external_id: "MRB-DOC".to_string(),
                borrower,
                principal: Money::from_major(200_000),
                security_deposit_required: Money::ZERO,
                start_date: d(2024, 1, 1),
                step_up_terms: None,
                net_disbursement: None,
                commodity: None,
                banking: None,
                facility: None,
                authorized_signatories: vec![signer_a, signer_b],
                installments: vec![
                    InstallmentSpec {
                        seq: 1,
                        due_date: d(2024, 2, 1),
                        principal_due: Money::from_major(100_000),
                        profit_due: Money::from_major(10_000),
                    },
                    InstallmentSpec {
                        seq: 2,
                        due_date: d(2024, 3, 1),
                        principal_due: Money::from_major(100_000),
                        profit_due: Money::from_major(10_000),
                    },
                ],
                fees: vec![FeeSpec {
                    fee_type: FeeType::Management,
                    amount: Money::from_major(5_000),
                    due_date: d(2024, 1, 1),
                }],
            },
            meta(ReasonTag::Boarding),
        )
        .unwrap();
        Fixture {
            store,
            contract_id: outcome.contract_id,
            signatories: vec![signer_a, signer_b],
        }
    }

    #[test]
    fn test_clearance_letter_binds_settlement_amount() {
        let mut fx = fixture();
        let params = SettlementParams::new(d(2024, 2, 15), 0);
        let (doc_id, _) = issue_clearance_letter(
            &mut fx.store,
            fx.contract_id,
            &params,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();

        let view = fx.store.current();
        let doc = view.document(doc_id).unwrap();
        let frozen: Settlement = serde_json::from_str(&doc.payload).unwrap();
        assert_eq!(doc.settlement_amount, Some(frozen.settlement_amount));
        assert_eq!(doc.params.settlement_date, Some(d(2024, 2, 15)));
    }

    #[test]
    fn test_snapshot_payload_round_trips() {
        let mut fx = fixture();
        let (doc_id, _) = issue_statement(
            &mut fx.store,
            fx.contract_id,
            d(2024, 1, 1),
            d(2024, 2, 15),
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();

        let view = fx.store.current();
        let doc = view.document(doc_id).unwrap();
        let parsed = parse_statement_payload(doc).unwrap();
        assert_eq!(serde_json::to_string_pretty(&parsed).unwrap(), doc.payload);
        assert_eq!(parsed.as_of, d(2024, 2, 15));
    }

    #[test]
    fn test_contradiction_detected_after_new_facts() {
        let mut fx = fixture();
        let params = SettlementParams::new(d(2024, 2, 15), 0);
        let (doc_id, _) = issue_clearance_letter(
            &mut fx.store,
            fx.contract_id,
            &params,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();

        let clean = check_clearance_contradictions(&fx.store.current(), doc_id).unwrap();
        assert!(!clean.contradicts());

        // a backdated payment lands after issuance
        ops::record_payment(
            &mut fx.store,
            fx.contract_id,
            Money::from_major(50_000),
            d(2024, 2, 10),
            "PMT-LATE-KEYED",
            None,
            meta(ReasonTag::Payment),
        )
        .unwrap();

        let report = check_clearance_contradictions(&fx.store.current(), doc_id).unwrap();
        assert!(report.contradicts());
        assert!(report
            .deltas
            .iter()
            .any(|delta| delta.field == "settlement-amount"));
    }

    #[test]
    fn test_supersession_keeps_both_but_one_active() {
        let mut fx = fixture();
        let params = SettlementParams::new(d(2024, 2, 15), 0);
        let (first, _) = issue_clearance_letter(
            &mut fx.store,
            fx.contract_id,
            &params,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();
        let (second, _) = supersede_document(
            &mut fx.store,
            first,
            meta(ReasonTag::Supersession),
        )
        .unwrap();

        let view = fx.store.current();
        assert!(view.document(first).is_ok());
        assert!(view.document(second).is_ok());
        let active = active_document(&view, fx.contract_id, DocumentKind::ClearanceLetter).unwrap();
        assert_eq!(active.id, second);
        assert_eq!(active.supersedes, Some(first));
    }

    #[test]
    fn test_contract_signed_requires_every_signatory() {
        let mut fx = fixture();
        let (agreement, _) = issue_contract_agreement(
            &mut fx.store,
            fx.contract_id,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();

        assert!(!contract_signed(&fx.store.current(), fx.contract_id).unwrap());

        sign_document(
            &mut fx.store,
            agreement,
            fx.signatories[0],
            SigningMethod::Digital,
            d(2024, 1, 5),
            meta(ReasonTag::DocumentSigned),
        )
        .unwrap();
        assert!(!contract_signed(&fx.store.current(), fx.contract_id).unwrap());

        sign_document(
            &mut fx.store,
            agreement,
            fx.signatories[1],
            SigningMethod::WetInk,
            d(2024, 1, 6),
            meta(ReasonTag::DocumentSigned),
        )
        .unwrap();
        assert!(contract_signed(&fx.store.current(), fx.contract_id).unwrap());
    }

    #[test]
    fn test_duplicate_signing_rejected() {
        let mut fx = fixture();
        let (agreement, _) = issue_contract_agreement(
            &mut fx.store,
            fx.contract_id,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();
        sign_document(
            &mut fx.store,
            agreement,
            fx.signatories[0],
            SigningMethod::Digital,
            d(2024, 1, 5),
            meta(ReasonTag::DocumentSigned),
        )
        .unwrap();
        let err = sign_document(
            &mut fx.store,
            agreement,
            fx.signatories[0],
            SigningMethod::WetInk,
            d(2024, 1, 6),
            meta(ReasonTag::DocumentSigned),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test]
    fn test_document_retraction_cascades_to_signings() {
        let mut fx = fixture();
        let (agreement, _) = issue_contract_agreement(
            &mut fx.store,
            fx.contract_id,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();
        for signer in fx.signatories.clone() {
            sign_document(
                &mut fx.store,
                agreement,
                signer,
                SigningMethod::Digital,
                d(2024, 1, 5),
                meta(ReasonTag::DocumentSigned),
            )
            .unwrap();
        }
        assert!(contract_signed(&fx.store.current(), fx.contract_id).unwrap());

        retract_document(&mut fx.store, agreement, meta(ReasonTag::ErroneousEntry)).unwrap();

        let view = fx.store.current();
        assert!(view.document(agreement).is_err());
        assert!(view.signings(agreement).is_empty());
        // signed? drops back to false once the document is retracted
        assert!(!contract_signed(&view, fx.contract_id).unwrap());
    }

    #[test]
    fn test_agreement_payload_freezes_schedule() {
        let mut fx = fixture();
        let (agreement, _) = issue_contract_agreement(
            &mut fx.store,
            fx.contract_id,
            meta(ReasonTag::DocumentIssued),
        )
        .unwrap();

        let view = fx.store.current();
        let doc = view.document(agreement).unwrap();
        let payload: AgreementPayload = serde_json::from_str(&doc.payload).unwrap();
        assert_eq!(payload.installments.len(), 2);
        assert_eq!(payload.fees.len(), 1);
        assert_eq!(payload.contract.id, fx.contract_id);
    }
}

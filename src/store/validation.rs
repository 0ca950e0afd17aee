use std::collections::{HashMap, HashSet};

use crate::decimal::Money;
use crate::errors::{FieldError, LedgerError, Result};
use crate::facts::{Contract, Fact, FactKind, Installment, PartyIdentity};
use crate::store::View;
use crate::types::EntityId;

/// Pre-commit validation of an append batch against the current view.
/// Schema and invariant failures collect into one `Validation` error;
/// identifier/kind collisions and unresolved references surface as
/// `IntegrityViolation`. Nothing is written on failure.
pub fn validate_batch(view: &View, facts: &[Fact]) -> Result<()> {
    let mut errors: Vec<FieldError> = Vec::new();

    check_batch_ids(view, facts)?;

    for fact in facts {
        check_fact_schema(fact, &mut errors);
    }
    check_uniqueness(view, facts, &mut errors);
    check_boarding_invariants(view, facts, &mut errors);

    if !errors.is_empty() {
        return Err(LedgerError::validation(errors));
    }

    check_references(view, facts)?;
    Ok(())
}

/// an id may be re-asserted across transactions, but only once per batch
/// and never with a different kind than it already has
fn check_batch_ids(view: &View, facts: &[Fact]) -> Result<()> {
    let mut seen: HashSet<EntityId> = HashSet::new();
    for fact in facts {
        let id = fact.entity_id();
        if !seen.insert(id) {
            return Err(LedgerError::integrity(
                "entity/id",
                format!("id {id} appears twice in one batch"),
            ));
        }
        if let Some(existing) = view.kind_of(id) {
            if existing != fact.kind() {
                return Err(LedgerError::integrity(
                    "entity/id",
                    format!(
                        "id {id} is already a {}, cannot re-assert as {}",
                        existing.as_str(),
                        fact.kind().as_str()
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_fact_schema(fact: &Fact, errors: &mut Vec<FieldError>) {
    match fact {
        Fact::Contract(c) => {
            if c.external_id.trim().is_empty() {
                errors.push(FieldError::new("contract/external-id", "must not be blank"));
            }
            if !c.principal.is_positive() {
                errors.push(FieldError::new("contract/principal", "must be positive"));
            }
            if c.security_deposit_required.is_negative() {
                errors.push(FieldError::new(
                    "contract/security-deposit-required",
                    "must not be negative",
                ));
            }
        }
        Fact::Installment(i) => {
            if i.seq < 1 {
                errors.push(FieldError::new("installment/seq", "must be at least 1"));
            }
            if i.principal_due.is_negative() {
                errors.push(FieldError::new(
                    "installment/principal-due",
                    "must not be negative",
                ));
            }
            if i.profit_due.is_negative() {
                errors.push(FieldError::new(
                    "installment/profit-due",
                    "must not be negative",
                ));
            }
        }
        Fact::Fee(f) => {
            if !f.amount.is_positive() {
                errors.push(FieldError::new("fee/amount", "must be positive"));
            }
        }
        Fact::Payment(p) => {
            if p.amount.is_zero() {
                errors.push(FieldError::new("payment/amount", "must not be zero"));
            }
            if p.reference.trim().is_empty() {
                errors.push(FieldError::new("payment/reference", "must not be blank"));
            }
        }
        Fact::Disbursement(d) => {
            if !d.amount.is_positive() {
                errors.push(FieldError::new("disbursement/amount", "must be positive"));
            }
        }
        Fact::DepositMovement(d) => {
            if !d.amount.is_positive() {
                errors.push(FieldError::new("deposit/amount", "must be positive"));
            }
        }
        Fact::PrincipalAllocation(p) => {
            if !p.amount.is_positive() {
                errors.push(FieldError::new(
                    "principal-allocation/amount",
                    "must be positive",
                ));
            }
        }
        Fact::RateAdjustment(r) => {
            if r.installments.is_empty() {
                errors.push(FieldError::new(
                    "rate-adjustment/installments",
                    "must name at least one installment",
                ));
            }
        }
        Fact::DocumentSnapshot(d) => {
            if d.payload.trim().is_empty() {
                errors.push(FieldError::new("document/payload", "must not be blank"));
            }
        }
        Fact::Signing(_) => {}
        Fact::Party(p) => {
            if p.legal_name.trim().is_empty() {
                errors.push(FieldError::new("party/legal-name", "must not be blank"));
            }
            let registration = match &p.identity {
                PartyIdentity::Company { cr_number } => ("party/cr-number", cr_number),
                PartyIdentity::Person { national_id } => ("party/national-id", national_id),
            };
            if registration.1.trim().is_empty() {
                errors.push(FieldError::new(registration.0, "must not be blank"));
            }
        }
        Fact::Facility(f) => {
            if f.external_id.trim().is_empty() {
                errors.push(FieldError::new("facility/external-id", "must not be blank"));
            }
            if !f.credit_limit.is_positive() {
                errors.push(FieldError::new("facility/credit-limit", "must be positive"));
            }
        }
    }
}

/// duplicate unique attributes are caught pre-commit with the offending
/// field named; the existing holder of the value is excluded when a fact
/// re-asserts itself
fn check_uniqueness(view: &View, facts: &[Fact], errors: &mut Vec<FieldError>) {
    let mut external_ids: HashMap<&str, EntityId> = HashMap::new();
    let mut cr_numbers: HashMap<&str, EntityId> = HashMap::new();
    let mut national_ids: HashMap<&str, EntityId> = HashMap::new();
    let mut signing_pairs: HashMap<(EntityId, EntityId), EntityId> = HashMap::new();

    for fact in view.iter().chain(facts.iter()) {
        match fact {
            Fact::Contract(c) => {
                if let Some(&holder) = external_ids.get(c.external_id.as_str()) {
                    if holder != c.id {
                        errors.push(FieldError::new(
                            "contract/external-id",
                            format!("duplicate external id {}", c.external_id),
                        ));
                    }
                }
                external_ids.insert(c.external_id.as_str(), c.id);
            }
            Fact::Party(p) => match &p.identity {
                PartyIdentity::Company { cr_number } => {
                    if let Some(&holder) = cr_numbers.get(cr_number.as_str()) {
                        if holder != p.id {
                            errors.push(FieldError::new(
                                "party/cr-number",
                                format!("duplicate CR number {cr_number}"),
                            ));
                        }
                    }
                    cr_numbers.insert(cr_number.as_str(), p.id);
                }
                PartyIdentity::Person { national_id } => {
                    if let Some(&holder) = national_ids.get(national_id.as_str()) {
                        if holder != p.id {
                            errors.push(FieldError::new(
                                "party/national-id",
                                format!("duplicate national id {national_id}"),
                            ));
                        }
                    }
                    national_ids.insert(national_id.as_str(), p.id);
                }
            },
            Fact::Signing(s) => {
                let pair = (s.document, s.signatory);
                if let Some(&holder) = signing_pairs.get(&pair) {
                    if holder != s.id {
                        errors.push(FieldError::new(
                            "signing/document",
                            "party has already signed this document",
                        ));
                    }
                }
                signing_pairs.insert(pair, s.id);
            }
            _ => {}
        }
    }
}

/// a batch asserting a new contract must carry its full schedule:
/// contiguous seqs from 1, non-decreasing due dates, principal dues that
/// sum to the contract principal
fn check_boarding_invariants(view: &View, facts: &[Fact], errors: &mut Vec<FieldError>) {
    let new_contracts: Vec<&Contract> = facts
        .iter()
        .filter_map(|f| match f {
            Fact::Contract(c) if !view.contains(c.id) => Some(c),
            _ => None,
        })
        .collect();

    for contract in new_contracts {
        let mut schedule: Vec<&Installment> = facts
            .iter()
            .filter_map(|f| match f {
                Fact::Installment(i) if i.contract == contract.id => Some(i),
                _ => None,
            })
            .collect();
        schedule.sort_by_key(|i| i.seq);

        if schedule.is_empty() {
            errors.push(FieldError::new(
                "installment/seq",
                format!("contract {} boarded without a schedule", contract.external_id),
            ));
            continue;
        }

        for (idx, installment) in schedule.iter().enumerate() {
            let expected = (idx + 1) as u32;
            if installment.seq != expected {
                errors.push(FieldError::new(
                    "installment/seq",
                    format!("expected seq {expected}, found {}", installment.seq),
                ));
                break;
            }
        }

        if schedule
            .windows(2)
            .any(|pair| pair[1].due_date < pair[0].due_date)
        {
            errors.push(FieldError::new(
                "installment/due-date",
                "due dates must be non-decreasing in seq",
            ));
        }

        let principal_sum: Money = schedule.iter().map(|i| i.principal_due).sum();
        if principal_sum != contract.principal {
            errors.push(FieldError::new(
                "installment/principal-due",
                format!(
                    "schedule principal {} does not match contract principal {}",
                    principal_sum, contract.principal
                ),
            ));
        }
    }
}

fn check_references(view: &View, facts: &[Fact]) -> Result<()> {
    let batch_ids: HashMap<EntityId, FactKind> =
        facts.iter().map(|f| (f.entity_id(), f.kind())).collect();

    let resolve = |id: EntityId, kind: FactKind, attribute: &str| -> Result<()> {
        let found = batch_ids.get(&id).copied().or_else(|| view.kind_of(id));
        match found {
            Some(k) if k == kind => Ok(()),
            Some(k) => Err(LedgerError::integrity(
                attribute,
                format!("{id} resolves to a {}, expected {}", k.as_str(), kind.as_str()),
            )),
            None => Err(LedgerError::integrity(
                attribute,
                format!("missing reference {id}"),
            )),
        }
    };

    for fact in facts {
        match fact {
            Fact::Contract(c) => {
                resolve(c.borrower, FactKind::Party, "contract/borrower")?;
                if let Some(facility) = c.facility {
                    resolve(facility, FactKind::Facility, "contract/facility")?;
                }
                for signatory in &c.authorized_signatories {
                    resolve(*signatory, FactKind::Party, "contract/authorized-signatories")?;
                }
            }
            Fact::Installment(i) => {
                resolve(i.contract, FactKind::Contract, "installment/contract")?;
            }
            Fact::Fee(f) => {
                resolve(f.contract, FactKind::Contract, "fee/contract")?;
            }
            Fact::Payment(p) => {
                resolve(p.contract, FactKind::Contract, "payment/contract")?;
                if let Some(source) = p.source_contract {
                    resolve(source, FactKind::Contract, "payment/source-contract")?;
                }
            }
            Fact::Disbursement(d) => {
                resolve(d.contract, FactKind::Contract, "disbursement/contract")?;
            }
            Fact::DepositMovement(d) => {
                resolve(d.contract, FactKind::Contract, "deposit/contract")?;
                if let Some(paired) = d.paired_contract {
                    resolve(paired, FactKind::Contract, "deposit/paired-contract")?;
                }
            }
            Fact::PrincipalAllocation(p) => {
                resolve(p.contract, FactKind::Contract, "principal-allocation/contract")?;
            }
            Fact::RateAdjustment(r) => {
                resolve(r.contract, FactKind::Contract, "rate-adjustment/contract")?;
                for installment in &r.installments {
                    resolve(
                        *installment,
                        FactKind::Installment,
                        "rate-adjustment/installments",
                    )?;
                }
            }
            Fact::DocumentSnapshot(d) => {
                resolve(d.contract, FactKind::Contract, "document/contract")?;
                if let Some(superseded) = d.supersedes {
                    resolve(superseded, FactKind::DocumentSnapshot, "document/supersedes")?;
                }
            }
            Fact::Signing(s) => {
                resolve(s.document, FactKind::DocumentSnapshot, "signing/document")?;
                resolve(s.signatory, FactKind::Party, "signing/signatory")?;
            }
            Fact::Party(_) => {}
            Fact::Facility(f) => {
                resolve(f.borrower, FactKind::Party, "facility/borrower")?;
            }
        }
    }
    Ok(())
}

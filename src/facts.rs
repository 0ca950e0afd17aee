use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    DepositSource, DepositType, DisbursementType, DocumentKind, EntityId, FeeType, SigningMethod,
};

/// commodity leg of the Murabaha purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityTerms {
    pub description: String,
    pub purchase_cost: Option<Money>,
}

/// settlement banking details for the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankingDetails {
    pub bank_name: String,
    pub iban: String,
}

/// the financing contract; attributes are facts and may be corrected via
/// retraction, the contract itself is never deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: EntityId,
    pub external_id: String,
    pub borrower: EntityId,
    pub principal: Money,
    pub security_deposit_required: Money,
    pub start_date: NaiveDate,
    /// serialized step-up rule rows, parsed on use
    pub step_up_terms: Option<String>,
    pub net_disbursement: Option<Money>,
    pub commodity: Option<CommodityTerms>,
    pub banking: Option<BankingDetails>,
    pub facility: Option<EntityId>,
    pub authorized_signatories: Vec<EntityId>,
}

/// one scheduled repayment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: EntityId,
    pub contract: EntityId,
    pub seq: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub profit_due: Money,
    /// principal still financed at the start of this installment's period
    pub remaining_principal: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: EntityId,
    pub contract: EntityId,
    pub fee_type: FeeType,
    pub amount: Money,
    pub due_date: NaiveDate,
}

/// a received payment; negative amounts record reversals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: EntityId,
    pub contract: EntityId,
    pub amount: Money,
    pub date: NaiveDate,
    pub reference: String,
    pub source_contract: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: EntityId,
    pub contract: EntityId,
    pub disbursement_type: DisbursementType,
    pub amount: Money,
    pub date: NaiveDate,
    pub reference: String,
}

/// movement on the contract's security-deposit holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositMovement {
    pub id: EntityId,
    pub contract: EntityId,
    pub movement_type: DepositType,
    pub amount: Money,
    pub date: NaiveDate,
    pub source: Option<DepositSource>,
    /// counterpart contract for transfer-in / transfer-out pairs
    pub paired_contract: Option<EntityId>,
}

/// principal-funded settlement of waterfall obligations at origination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalAllocation {
    pub id: EntityId,
    pub contract: EntityId,
    pub amount: Money,
    pub date: NaiveDate,
}

/// marker fact recording which installments a rate change touched;
/// the new values live on the re-asserted installment facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateAdjustment {
    pub id: EntityId,
    pub contract: EntityId,
    pub installments: Vec<EntityId>,
    pub reason: String,
}

/// parameters a document snapshot was generated with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentParams {
    pub settlement_date: Option<NaiveDate>,
    pub penalty_days: Option<u32>,
    pub manual_override: Option<Money>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

/// frozen derivation tied to a document; written once, superseded but
/// never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: EntityId,
    pub contract: EntityId,
    pub kind: DocumentKind,
    /// self-describing serialized payload; round-trips unchanged
    pub payload: String,
    pub params: DocumentParams,
    /// bound first-class on clearance letters
    pub settlement_amount: Option<Money>,
    pub supersedes: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signing {
    pub id: EntityId,
    pub document: EntityId,
    pub signatory: EntityId,
    pub method: SigningMethod,
    pub date: NaiveDate,
}

/// jurisdiction identity; the registration number is unique within kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyIdentity {
    Company { cr_number: String },
    Person { national_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: EntityId,
    pub legal_name: String,
    pub identity: PartyIdentity,
}

impl Party {
    pub fn is_company(&self) -> bool {
        matches!(self.identity, PartyIdentity::Company { .. })
    }
}

/// revolving credit line; drawdowns are child contracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: EntityId,
    pub external_id: String,
    pub borrower: EntityId,
    pub credit_limit: Money,
    /// serialized step-up rule rows applied to new drawdowns
    pub template_terms: Option<String>,
}

/// coarse fact classification used in schema checks and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactKind {
    Contract,
    Installment,
    Fee,
    Payment,
    Disbursement,
    DepositMovement,
    PrincipalAllocation,
    RateAdjustment,
    DocumentSnapshot,
    Signing,
    Party,
    Facility,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Contract => "contract",
            FactKind::Installment => "installment",
            FactKind::Fee => "fee",
            FactKind::Payment => "payment",
            FactKind::Disbursement => "disbursement",
            FactKind::DepositMovement => "deposit",
            FactKind::PrincipalAllocation => "principal-allocation",
            FactKind::RateAdjustment => "rate-adjustment",
            FactKind::DocumentSnapshot => "document",
            FactKind::Signing => "signing",
            FactKind::Party => "party",
            FactKind::Facility => "facility",
        }
    }
}

/// every fact the store can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fact {
    Contract(Contract),
    Installment(Installment),
    Fee(Fee),
    Payment(Payment),
    Disbursement(Disbursement),
    DepositMovement(DepositMovement),
    PrincipalAllocation(PrincipalAllocation),
    RateAdjustment(RateAdjustment),
    DocumentSnapshot(DocumentSnapshot),
    Signing(Signing),
    Party(Party),
    Facility(Facility),
}

impl Fact {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Fact::Contract(f) => f.id,
            Fact::Installment(f) => f.id,
            Fact::Fee(f) => f.id,
            Fact::Payment(f) => f.id,
            Fact::Disbursement(f) => f.id,
            Fact::DepositMovement(f) => f.id,
            Fact::PrincipalAllocation(f) => f.id,
            Fact::RateAdjustment(f) => f.id,
            Fact::DocumentSnapshot(f) => f.id,
            Fact::Signing(f) => f.id,
            Fact::Party(f) => f.id,
            Fact::Facility(f) => f.id,
        }
    }

    pub fn kind(&self) -> FactKind {
        match self {
            Fact::Contract(_) => FactKind::Contract,
            Fact::Installment(_) => FactKind::Installment,
            Fact::Fee(_) => FactKind::Fee,
            Fact::Payment(_) => FactKind::Payment,
            Fact::Disbursement(_) => FactKind::Disbursement,
            Fact::DepositMovement(_) => FactKind::DepositMovement,
            Fact::PrincipalAllocation(_) => FactKind::PrincipalAllocation,
            Fact::RateAdjustment(_) => FactKind::RateAdjustment,
            Fact::DocumentSnapshot(_) => FactKind::DocumentSnapshot,
            Fact::Signing(_) => FactKind::Signing,
            Fact::Party(_) => FactKind::Party,
            Fact::Facility(_) => FactKind::Facility,
        }
    }

    /// the contract this fact relates to, if any
    pub fn contract_ref(&self) -> Option<EntityId> {
        match self {
            Fact::Contract(f) => Some(f.id),
            Fact::Installment(f) => Some(f.contract),
            Fact::Fee(f) => Some(f.contract),
            Fact::Payment(f) => Some(f.contract),
            Fact::Disbursement(f) => Some(f.contract),
            Fact::DepositMovement(f) => Some(f.contract),
            Fact::PrincipalAllocation(f) => Some(f.contract),
            Fact::RateAdjustment(f) => Some(f.contract),
            Fact::DocumentSnapshot(f) => Some(f.contract),
            Fact::Signing(_) | Fact::Party(_) | Fact::Facility(_) => None,
        }
    }

    /// cascade parent: retracting the parent retracts this fact too.
    /// Documents reference a contract but are not owned by it.
    pub fn owner(&self) -> Option<EntityId> {
        match self {
            Fact::Installment(f) => Some(f.contract),
            Fact::Fee(f) => Some(f.contract),
            Fact::Payment(f) => Some(f.contract),
            Fact::Disbursement(f) => Some(f.contract),
            Fact::DepositMovement(f) => Some(f.contract),
            Fact::PrincipalAllocation(f) => Some(f.contract),
            Fact::RateAdjustment(f) => Some(f.contract),
            Fact::Signing(f) => Some(f.document),
            Fact::Contract(_)
            | Fact::DocumentSnapshot(_)
            | Fact::Party(_)
            | Fact::Facility(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_ownership_declares_cascade_parents() {
        let contract = Uuid::new_v4();
        let fee = Fact::Fee(Fee {
            id: Uuid::new_v4(),
            contract,
            fee_type: FeeType::Management,
            amount: Money::from_major(5_000),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        assert_eq!(fee.owner(), Some(contract));

        let document = Uuid::new_v4();
        let signing = Fact::Signing(Signing {
            id: Uuid::new_v4(),
            document,
            signatory: Uuid::new_v4(),
            method: SigningMethod::Digital,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        assert_eq!(signing.owner(), Some(document));
    }

    #[test]
    fn test_documents_reference_but_are_not_owned() {
        let contract = Uuid::new_v4();
        let doc = Fact::DocumentSnapshot(DocumentSnapshot {
            id: Uuid::new_v4(),
            contract,
            kind: DocumentKind::Statement,
            payload: "{}".to_string(),
            params: DocumentParams::default(),
            settlement_amount: None,
            supersedes: None,
        });
        assert_eq!(doc.contract_ref(), Some(contract));
        assert_eq!(doc.owner(), None);
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// stable identifier for any fact
pub type EntityId = Uuid;

/// monotonic transaction identifier; the time axis of the store
pub type TxId = u64;

/// fee classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeType {
    Management,
    Admin,
    Late,
    Processing,
    Insurance,
    Other,
}

/// disbursement classification; only `Refund` enters the waterfall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisbursementType {
    Funding,
    Refund,
    ExcessReturn,
}

/// security-deposit movement kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositType {
    Received,
    Refund,
    Offset,
    TransferIn,
    TransferOut,
}

/// where a deposit movement was funded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositSource {
    Customer,
    Funding,
}

/// document snapshot kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    ClearanceLetter,
    Statement,
    ContractAgreement,
    Report,
}

/// how a signature was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningMethod {
    WetInk,
    Digital,
}

/// derived installment status; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Paid,
    Partial,
    Overdue,
    Scheduled,
}

/// derived fee status; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    Paid,
    Unpaid,
}

/// reason tag carried on every commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonTag {
    Boarding,
    Payment,
    Disbursement,
    DepositMovement,
    PrincipalAllocation,
    FeeCharge,
    RateAdjustment,
    DocumentIssued,
    DocumentSigned,
    PartyCreated,
    FacilityCreated,
    Migration,
    // retraction / compensation taxonomy
    Correction,
    DuplicateRemoval,
    ErroneousEntry,
    Reversal,
    Supersession,
}

/// metadata attached to each commit; never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMetadata {
    pub author: String,
    pub reason: ReasonTag,
    pub note: Option<String>,
    /// reference to the fact being corrected
    pub corrects: Option<EntityId>,
    /// original business date for migrated or backdated events
    pub original_date: Option<NaiveDate>,
    /// source identifier when the commit was migrated from another system
    pub migrated_from: Option<String>,
}

impl TxMetadata {
    pub fn new(author: impl Into<String>, reason: ReasonTag) -> Self {
        Self {
            author: author.into(),
            reason,
            note: None,
            corrects: None,
            original_date: None,
            migrated_from: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn correcting(mut self, entity: EntityId) -> Self {
        self.corrects = Some(entity);
        self
    }

    pub fn migrated(mut self, source: impl Into<String>, original_date: NaiveDate) -> Self {
        self.migrated_from = Some(source.into());
        self.original_date = Some(original_date);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_serialize_as_symbolic_strings() {
        assert_eq!(
            serde_json::to_string(&DisbursementType::ExcessReturn).unwrap(),
            "\"ExcessReturn\""
        );
        assert_eq!(
            serde_json::from_str::<ReasonTag>("\"DuplicateRemoval\"").unwrap(),
            ReasonTag::DuplicateRemoval
        );
    }

    #[test]
    fn test_metadata_builder() {
        let target = Uuid::new_v4();
        let meta = TxMetadata::new("ops", ReasonTag::Correction)
            .with_note("duplicate keyed twice")
            .correcting(target);
        assert_eq!(meta.corrects, Some(target));
        assert_eq!(meta.reason, ReasonTag::Correction);
        assert!(meta.migrated_from.is_none());
    }
}

pub mod dates;
pub mod decimal;
pub mod derive;
pub mod documents;
pub mod errors;
pub mod facility;
pub mod facts;
pub mod ops;
pub mod payments;
pub mod settlement;
pub mod state;
pub mod stepup;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use derive::{contract_state, funding_breakdown, linked_contracts, FundingBreakdown};
pub use documents::{
    active_document, check_clearance_contradictions, contract_signed, issue_clearance_letter,
    issue_contract_agreement, issue_report, issue_statement, parse_statement_payload,
    retract_document, sign_document, supersede_document, AgreementPayload, ContradictionReport,
    FieldDelta,
};
pub use errors::{FieldError, LedgerError, Result};
pub use facility::{facility_state, ContractStanding, FacilityState};
pub use facts::{
    BankingDetails, CommodityTerms, Contract, DepositMovement, Disbursement, DocumentParams,
    DocumentSnapshot, Facility, Fact, FactKind, Fee, Installment, Party, PartyIdentity, Payment,
    PrincipalAllocation, RateAdjustment, Signing,
};
pub use ops::{
    adjust_installment_rate, board_contract, charge_fee, create_company, create_facility,
    create_person, record_deposit, record_disbursement, record_payment,
    record_principal_allocation, restructure_installments, retract_fact, reverse_payment,
    transfer_deposit, BoardingOutcome, BoardingRequest, FeeSpec, InstallmentSpec,
};
pub use payments::{waterfall, Allocation, FeeObligation, InstallmentObligation, WaterfallResult};
pub use settlement::{calculate_settlement, RateSource, Settlement, SettlementParams};
pub use state::{ContractState, ContractTotals, DepositSummary, FeeState, InstallmentState};
pub use stepup::{evaluate_step_up, StepUpAction, StepUpEvaluation, StepUpRule};
pub use store::{FactStore, HistoryEntry, MemoryStore, Op, TxInfo, View};
pub use types::{
    DepositSource, DepositType, DisbursementType, DocumentKind, EntityId, FeeStatus, FeeType,
    InstallmentStatus, ReasonTag, SigningMethod, TxId, TxMetadata,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

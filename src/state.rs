use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::facts::{Contract, Facility, Fee, Installment, Party};
use crate::types::{EntityId, FeeStatus, InstallmentStatus};

/// a fee enriched with its waterfall allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeState {
    pub fee: Fee,
    pub paid: Money,
    pub outstanding: Money,
    pub status: FeeStatus,
}

/// an installment enriched with its waterfall allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentState {
    pub installment: Installment,
    pub profit_paid: Money,
    pub principal_paid: Money,
    pub outstanding: Money,
    pub status: InstallmentStatus,
}

impl InstallmentState {
    pub fn total_paid(&self) -> Money {
        self.profit_paid + self.principal_paid
    }

    pub fn total_due(&self) -> Money {
        self.installment.profit_due + self.installment.principal_due
    }
}

/// security-deposit holding derived from movement facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DepositSummary {
    pub held: Money,
    pub received: Money,
    pub refunded: Money,
    pub offset: Money,
    pub transferred_in: Money,
    pub transferred_out: Money,
}

/// aggregate totals over the enriched schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContractTotals {
    pub fees_due: Money,
    pub fees_paid: Money,
    pub principal_due: Money,
    pub principal_paid: Money,
    pub profit_due: Money,
    pub profit_paid: Money,
    pub outstanding: Money,
}

/// Fully derived picture of one contract at a business date. Nothing in
/// here is ever written back to the store; the record is structurally
/// complete for both display and document freezing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub contract: Contract,
    pub as_of: NaiveDate,
    pub borrower: Option<Party>,
    pub fees: Vec<FeeState>,
    pub installments: Vec<InstallmentState>,
    pub deposits: DepositSummary,
    pub totals: ContractTotals,
    /// total inflow the waterfall allocated from (after reversal netting)
    pub waterfall_total: Money,
    pub credit_balance: Money,
    pub maturity_date: Option<NaiveDate>,
    pub facility: Option<Facility>,
    pub linked_contracts: Vec<EntityId>,
}

impl ContractState {
    pub fn total_outstanding(&self) -> Money {
        self.totals.outstanding
    }

    /// find an installment row by seq
    pub fn installment(&self, seq: u32) -> Option<&InstallmentState> {
        self.installments.iter().find(|i| i.installment.seq == seq)
    }

    /// total scheduled profit across the whole schedule
    pub fn total_scheduled_profit(&self) -> Money {
        self.totals.profit_due
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

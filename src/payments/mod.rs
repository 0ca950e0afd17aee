pub mod waterfall;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::facts::{Fee, Installment};
use crate::types::EntityId;

pub use waterfall::{waterfall, Allocation, WaterfallResult};

/// one fee the waterfall must cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeObligation {
    pub id: EntityId,
    pub due_date: NaiveDate,
    pub amount: Money,
}

impl From<&Fee> for FeeObligation {
    fn from(fee: &Fee) -> Self {
        Self {
            id: fee.id,
            due_date: fee.due_date,
            amount: fee.amount,
        }
    }
}

/// one installment the waterfall must cover; profit before principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentObligation {
    pub id: EntityId,
    pub seq: u32,
    pub profit_due: Money,
    pub principal_due: Money,
}

impl InstallmentObligation {
    pub fn total_due(&self) -> Money {
        self.profit_due + self.principal_due
    }
}

impl From<&Installment> for InstallmentObligation {
    fn from(installment: &Installment) -> Self {
        Self {
            id: installment.id,
            seq: installment.seq,
            profit_due: installment.profit_due,
            principal_due: installment.principal_due,
        }
    }
}

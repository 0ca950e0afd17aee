use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::derive::contract_state;
use crate::errors::Result;
use crate::facts::Facility;
use crate::store::View;
use crate::types::{EntityId, InstallmentStatus};

/// derived standing of one drawdown inside a facility listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStanding {
    Current,
    Overdue,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityContractSummary {
    pub contract_id: EntityId,
    pub external_id: String,
    pub outstanding_principal: Money,
    pub total_outstanding: Money,
    pub credit_balance: Money,
    pub standing: ContractStanding,
}

/// Derived facility picture: each drawdown runs the full contract
/// pipeline independently; no waterfall and no credit netting happen at
/// facility level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityState {
    pub facility: Facility,
    pub as_of: NaiveDate,
    /// sum of the drawdowns' outstanding principal
    pub utilization: Money,
    /// credit limit minus utilization
    pub available: Money,
    pub contracts: Vec<FacilityContractSummary>,
}

pub fn facility_state(view: &View, facility_id: EntityId, as_of: NaiveDate) -> Result<FacilityState> {
    let facility = view.facility(facility_id)?.clone();

    let mut contracts = Vec::new();
    let mut utilization = Money::ZERO;
    for child in view.contracts_of_facility(facility_id) {
        let state = contract_state(view, child.id, as_of)?;
        let outstanding_principal = state.totals.principal_due - state.totals.principal_paid;
        utilization += outstanding_principal;

        let standing = if state.total_outstanding().is_zero() {
            ContractStanding::Settled
        } else if state
            .installments
            .iter()
            .any(|row| row.status == InstallmentStatus::Overdue)
        {
            ContractStanding::Overdue
        } else {
            ContractStanding::Current
        };

        contracts.push(FacilityContractSummary {
            contract_id: child.id,
            external_id: state.contract.external_id.clone(),
            outstanding_principal,
            total_outstanding: state.total_outstanding(),
            credit_balance: state.credit_balance,
            standing,
        });
    }

    let available = facility.credit_limit - utilization;
    Ok(FacilityState {
        facility,
        as_of,
        utilization,
        available,
        contracts,
    })
}

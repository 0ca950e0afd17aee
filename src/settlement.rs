use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{accrued_profit, daily_profit, days_between, YEAR_BASIS};
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::state::ContractState;
use crate::stepup::{self, StepUpRule};

/// where the annual rate used for accrual came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateSource {
    /// caller supplied the rate explicitly
    Provided { rate: Rate },
    /// step-up rule whose installment range covers the settlement date
    StepUp { term_seq: u32, rate: Rate },
    /// derived as total profit / principal / tenure in 360-day years
    DerivedFromSchedule { rate: Rate },
}

impl RateSource {
    pub fn rate(&self) -> Rate {
        match self {
            RateSource::Provided { rate }
            | RateSource::StepUp { rate, .. }
            | RateSource::DerivedFromSchedule { rate } => *rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementParams {
    pub settlement_date: NaiveDate,
    pub penalty_days: u32,
    pub manual_override: Option<Money>,
    /// explicit rate; when absent the step-up terms are consulted, then
    /// the schedule-derived fallback
    pub annual_rate: Option<Rate>,
}

impl SettlementParams {
    pub fn new(settlement_date: NaiveDate, penalty_days: u32) -> Self {
        Self {
            settlement_date,
            penalty_days,
            manual_override: None,
            annual_rate: None,
        }
    }

    pub fn with_override(mut self, amount: Money) -> Self {
        self.manual_override = Some(amount);
        self
    }

    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.annual_rate = Some(rate);
        self
    }
}

/// early-settlement quote; every field is derived, nothing is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub settlement_date: NaiveDate,
    pub outstanding_principal: Money,
    pub accrued_profit: Money,
    pub profit_already_paid: Money,
    pub accrued_unpaid_profit: Money,
    pub unearned_profit: Money,
    pub daily_profit: Money,
    pub penalty_days: u32,
    pub penalty_amount: Money,
    pub outstanding_fees: Money,
    pub credit_balance: Money,
    pub settlement_amount: Money,
    pub refund_due: Money,
    pub manual_override: Option<Money>,
    pub rate_source: RateSource,
}

/// Pure settlement derivation over an already-derived contract state.
/// Installments partition against the settlement date: past rows accrue
/// their full profit, the current row accrues pro-rata Actual/360 on its
/// remaining principal, future rows accrue nothing.
pub fn calculate_settlement(state: &ContractState, params: &SettlementParams) -> Result<Settlement> {
    let rate_source = resolve_rate(state, params)?;
    let rate = rate_source.rate();
    let settlement_date = params.settlement_date;

    let mut accrued = Money::ZERO;
    let mut period_start = state.contract.start_date;
    for row in &state.installments {
        let installment = &row.installment;
        if installment.due_date <= settlement_date {
            accrued += installment.profit_due;
        } else if period_start < settlement_date {
            // current period: prev due exclusive through due inclusive
            let days = days_between(period_start, settlement_date);
            accrued += accrued_profit(installment.remaining_principal, rate, days);
        }
        period_start = installment.due_date;
    }

    let outstanding_principal = state.totals.principal_due - state.totals.principal_paid;
    let profit_already_paid = state.totals.profit_paid;
    let accrued_unpaid_profit = (accrued - profit_already_paid).max(Money::ZERO);
    let unearned_profit = state.total_scheduled_profit() - accrued;
    let daily = daily_profit(outstanding_principal, rate);
    let penalty_amount = daily * rust_decimal::Decimal::from(params.penalty_days);
    let outstanding_fees = state.totals.fees_due - state.totals.fees_paid;
    let credit_balance = state.credit_balance;

    let effective_accrued_unpaid = params.manual_override.unwrap_or(accrued_unpaid_profit);
    let raw = outstanding_principal + effective_accrued_unpaid + outstanding_fees + penalty_amount
        - credit_balance;

    Ok(Settlement {
        settlement_date,
        outstanding_principal,
        accrued_profit: accrued,
        profit_already_paid,
        accrued_unpaid_profit,
        unearned_profit,
        daily_profit: daily,
        penalty_days: params.penalty_days,
        penalty_amount,
        outstanding_fees,
        credit_balance,
        settlement_amount: raw.max(Money::ZERO),
        refund_due: (-raw).max(Money::ZERO),
        manual_override: params.manual_override,
        rate_source,
    })
}

fn resolve_rate(state: &ContractState, params: &SettlementParams) -> Result<RateSource> {
    if let Some(rate) = params.annual_rate {
        return Ok(RateSource::Provided { rate });
    }

    if let Some(raw) = state.contract.step_up_terms.as_deref() {
        let rules = stepup::parse_step_up_terms(raw)?;
        if let Some(rule) = rule_covering_date(&rules, state, params.settlement_date) {
            return Ok(RateSource::StepUp {
                term_seq: rule.term_seq,
                rate: rule.base_rate,
            });
        }
    }

    derived_rate(state).map(|rate| RateSource::DerivedFromSchedule { rate })
}

/// the step-up term whose installment range contains the settlement date's
/// accrual period
fn rule_covering_date<'a>(
    rules: &'a [StepUpRule],
    state: &ContractState,
    date: NaiveDate,
) -> Option<&'a StepUpRule> {
    let current_seq = state
        .installments
        .iter()
        .find(|row| date <= row.installment.due_date)
        .or_else(|| state.installments.last())
        .map(|row| row.installment.seq)?;
    rules
        .iter()
        .find(|rule| rule.first_installment <= current_seq && current_seq <= rule.last_installment)
}

/// fallback annual rate from contract data: total profit / principal /
/// tenure in 360-day years, computed as one division so clean schedules
/// derive clean rates
fn derived_rate(state: &ContractState) -> Result<Rate> {
    let principal = state.contract.principal;
    let maturity = state.maturity_date.ok_or_else(|| {
        LedgerError::consistency(Some(state.contract.id), "no maturity date on schedule")
    })?;
    let tenure_days = days_between(state.contract.start_date, maturity);
    if principal.is_zero() || tenure_days == 0 {
        return Err(LedgerError::configuration(
            "cannot derive an annual rate: zero principal or zero tenure",
        ));
    }
    let total_profit = state.total_scheduled_profit();
    let rate = (total_profit.as_decimal() * rust_decimal::Decimal::from(YEAR_BASIS))
        / (principal.as_decimal() * rust_decimal::Decimal::from(tenure_days));
    Ok(Rate::from_decimal(rate))
}

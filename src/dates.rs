use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};

/// days in the accrual year under Actual/360
pub const YEAR_BASIS: u32 = 360;

/// whole days from `a` to `b`, saturating at zero when `b` precedes `a`
pub fn days_between(a: NaiveDate, b: NaiveDate) -> u32 {
    (b - a).num_days().max(0) as u32
}

/// daily profit under Actual/360: principal x annual rate / 360
pub fn daily_profit(principal: Money, annual_rate: Rate) -> Money {
    principal * annual_rate.as_decimal() / Decimal::from(YEAR_BASIS)
}

/// profit accrued over `days` at the Actual/360 daily rate
pub fn accrued_profit(principal: Money, annual_rate: Rate, days: u32) -> Money {
    daily_profit(principal, annual_rate) * Decimal::from(days)
}

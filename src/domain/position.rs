//! Tax-lot position lifecycle.
//!
//! A position is opened by an investment, revalued by [`Position::update`],
//! and closed by [`Position::withdraw_full`]. A closed position rejects any
//! further mutation.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

use super::asset_class::Valuation;
use super::error::GlidepathError;
use super::format::to_currency;
use super::instrument::Instrument;
use super::tax::fractional_years;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    instrument: Arc<Instrument>,
    name: String,
    entry_date: NaiveDate,
    entry_value: f64,
    number_of_units: f64,
    current_value: f64,
    exit_value: f64,
    tax_liability: f64,
    pnl: f64,
    last_update: NaiveDate,
    is_active: bool,
}

/// Reporting view of a position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub name: String,
    pub instrument: String,
    pub current_value: f64,
    pub exit_value: f64,
    pub entry_value: f64,
    pub last_update: NaiveDate,
    pub is_active: bool,
}

struct Revaluation {
    current_value: f64,
    pnl: f64,
    tax_liability: f64,
    exit_value: f64,
}

impl Position {
    /// Invests `investment_amount` in `instrument` on `date`, net of the entry fee.
    pub fn open(
        instrument: Arc<Instrument>,
        date: NaiveDate,
        investment_amount: f64,
    ) -> Result<Self, GlidepathError> {
        if !investment_amount.is_finite() || investment_amount < 0.0 {
            return Err(GlidepathError::InvalidAmount {
                amount: investment_amount,
            });
        }

        let current_value = investment_amount - instrument.entry_fee;
        let number_of_units = match instrument.asset_class.valuation() {
            Valuation::MarkToMarket => current_value / instrument.price_as_of(date)?,
            Valuation::DailyCompounding | Valuation::Static => 1.0,
        };
        let exit_value = current_value - instrument.exit_fee;
        let name = format!("{}_on_{}", instrument.name, date.format("%d%b%y"));

        Ok(Self {
            instrument,
            name,
            entry_date: date,
            entry_value: current_value,
            number_of_units,
            current_value,
            exit_value,
            tax_liability: 0.0,
            pnl: 0.0,
            last_update: date,
            is_active: true,
        })
    }

    pub fn instrument(&self) -> &Arc<Instrument> {
        &self.instrument
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn entry_value(&self) -> f64 {
        self.entry_value
    }

    pub fn number_of_units(&self) -> f64 {
        self.number_of_units
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn exit_value(&self) -> f64 {
        self.exit_value
    }

    pub fn tax_liability(&self) -> f64 {
        self.tax_liability
    }

    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn last_update(&self) -> NaiveDate {
        self.last_update
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Revalues the lot as of `date`. Either every field is refreshed or,
    /// on error, none is.
    pub fn update(&mut self, date: NaiveDate) -> Result<(), GlidepathError> {
        self.ensure_mutable(date)?;
        let next = self.revalue(date)?;
        self.current_value = next.current_value;
        self.pnl = next.pnl;
        self.tax_liability = next.tax_liability;
        self.exit_value = next.exit_value;
        self.last_update = date;
        Ok(())
    }

    /// Withdraws `amount` of post-tax, post-fee value on `date`.
    pub fn withdraw(&mut self, date: NaiveDate, amount: f64) -> Result<f64, GlidepathError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(GlidepathError::InvalidAmount { amount });
        }
        self.update(date)?;
        if amount > self.exit_value {
            return Err(GlidepathError::InsufficientFunds {
                requested: amount,
                available: self.exit_value,
            });
        }
        self.debit(amount);
        Ok(amount)
    }

    /// Withdraws the whole exit value and closes the position.
    pub fn withdraw_full(&mut self, date: NaiveDate) -> Result<f64, GlidepathError> {
        self.update(date)?;
        let amount = self.exit_value.max(0.0);
        self.debit(amount);
        self.is_active = false;
        Ok(amount)
    }

    /// Projects the live value to `exit_date` at the instrument's expected
    /// return as of `date`, net of exit fee and tax on the lot's total gain.
    pub fn forward_value(
        &self,
        date: NaiveDate,
        exit_date: NaiveDate,
    ) -> Result<f64, GlidepathError> {
        let r = self.instrument.expected_return(date)?;
        let days = (exit_date - date).num_days();
        let fv = self.current_value * (1.0 + r).powf(days as f64) - self.instrument.exit_fee;
        let pnl = fv - self.entry_value;
        let holding_years = fractional_years((exit_date - self.entry_date).num_days());
        let tax = self
            .instrument
            .asset_class
            .tax_rule()
            .liability(pnl, holding_years);
        Ok(fv - tax)
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            name: self.name.clone(),
            instrument: self.instrument.name.clone(),
            current_value: self.current_value,
            exit_value: self.exit_value,
            entry_value: self.entry_value,
            last_update: self.last_update,
            is_active: self.is_active,
        }
    }

    fn ensure_mutable(&self, date: NaiveDate) -> Result<(), GlidepathError> {
        if !self.is_active {
            return Err(GlidepathError::PositionClosed {
                position: self.name.clone(),
            });
        }
        if date < self.last_update {
            return Err(GlidepathError::OutOfOrderUpdate {
                position: self.name.clone(),
                last_update: self.last_update,
                requested: date,
            });
        }
        Ok(())
    }

    fn revalue(&self, date: NaiveDate) -> Result<Revaluation, GlidepathError> {
        let current_value = match self.instrument.asset_class.valuation() {
            Valuation::MarkToMarket => self.number_of_units * self.instrument.price_as_of(date)?,
            Valuation::DailyCompounding => {
                let days = (date - self.entry_date).num_days();
                self.entry_value * (1.0 + self.instrument.daily_rate()).powf(days as f64)
            }
            Valuation::Static => self.current_value,
        };
        let pnl = current_value - self.instrument.exit_fee - self.entry_value;
        let holding_years = whole_years_between(self.entry_date, date);
        let tax_liability = self
            .instrument
            .asset_class
            .tax_rule()
            .liability(pnl, holding_years as f64);
        let exit_value = current_value - tax_liability - self.instrument.exit_fee;

        Ok(Revaluation {
            current_value,
            pnl,
            tax_liability,
            exit_value,
        })
    }

    /// Debits `amount` of exit value from a lot revalued as of `last_update`.
    /// Units, cost basis and value shrink by the same ratio, and the tax on
    /// the withdrawn slice leaves with it, so revaluing on the same date
    /// yields `exit_value - amount`.
    fn debit(&mut self, amount: f64) {
        let rule = self.instrument.asset_class.tax_rule();
        let holding_years = whole_years_between(self.entry_date, self.last_update) as f64;
        let rate = rule.rate(holding_years);
        let ratio = retained_ratio(
            self.current_value,
            self.current_value - self.entry_value,
            self.instrument.exit_fee,
            rate,
            self.exit_value - amount,
        );

        if self.instrument.asset_class.valuation() == Valuation::MarkToMarket {
            self.number_of_units *= ratio;
        }
        self.entry_value *= ratio;
        self.current_value *= ratio;
        self.pnl = self.current_value - self.instrument.exit_fee - self.entry_value;
        self.tax_liability = rule.liability(self.pnl, holding_years);
        self.exit_value = self.current_value - self.tax_liability - self.instrument.exit_fee;
    }
}

/// Share `k` of a lot to keep so that its exit value becomes `target`.
///
/// Exit value of the scaled lot is `k*value - fee - rate*max(0, k*gain - fee)`,
/// which is piecewise linear in `k`: untaxed while the scaled gain does not
/// cover the exit fee, taxed above that.
fn retained_ratio(value: f64, gain: f64, fee: f64, rate: f64, target: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let untaxed = (target + fee) / value;
    let ratio = if untaxed * gain - fee <= 0.0 {
        untaxed
    } else {
        (target + fee * (1.0 - rate)) / (value - rate * gain)
    };
    ratio.clamp(0.0, 1.0)
}

/// Elapsed whole years from `from` to `to`.
fn whole_years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    to.years_since(from).unwrap_or(0)
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | exit: {}, entry: {} | update:{}",
            self.name,
            to_currency(self.current_value),
            to_currency(self.exit_value),
            to_currency(self.entry_value),
            self.last_update.format("%d%b%y"),
        )
    }
}

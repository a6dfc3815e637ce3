//! Instrument identity, valuation and downside-risk model.
//!
//! Equity instruments are priced from their [`PriceHistory`]; debt and cash
//! instruments from their annual nominal rate. The fall probability of an
//! equity instrument is the larger of the empirical and the fitted-normal
//! tail probability over the trailing window.

use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

use super::asset_class::{AssetClass, ReturnSource};
use super::error::GlidepathError;
use super::price_history::PriceHistory;
use super::returns::daily_rate;
use super::tax::fractional_years;

pub const DEFAULT_LOOKBACK_YEARS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub asset_class: AssetClass,
    pub ticker: Option<String>,
    pub annual_rate: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub lookback_years: usize,
    history: PriceHistory,
}

impl Instrument {
    /// Debt or cash instrument accruing at `annual_rate`.
    pub fn fixed_rate(name: impl Into<String>, asset_class: AssetClass, annual_rate: f64) -> Self {
        Self {
            name: name.into(),
            asset_class,
            ticker: None,
            annual_rate,
            entry_fee: 0.0,
            exit_fee: 0.0,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            history: PriceHistory::default(),
        }
    }

    pub fn equity(name: impl Into<String>, history: PriceHistory) -> Self {
        Self {
            name: name.into(),
            asset_class: AssetClass::Equity,
            ticker: None,
            annual_rate: 0.0,
            entry_fee: 0.0,
            exit_fee: 0.0,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            history,
        }
    }

    pub fn with_fees(mut self, entry_fee: f64, exit_fee: f64) -> Self {
        self.entry_fee = entry_fee;
        self.exit_fee = exit_fee;
        self
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_lookback_years(mut self, years: usize) -> Self {
        self.lookback_years = years;
        self
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn daily_rate(&self) -> f64 {
        daily_rate(self.annual_rate)
    }

    pub fn price_as_of(&self, date: NaiveDate) -> Result<f64, GlidepathError> {
        self.history
            .close_as_of(date)
            .ok_or_else(|| GlidepathError::NoPriorPrice {
                instrument: self.name.clone(),
                date,
            })
    }

    pub fn expected_return(&self, date: NaiveDate) -> Result<f64, GlidepathError> {
        self.expected_return_over(date, self.lookback_years)
    }

    /// Expected daily return as of `date`.
    pub fn expected_return_over(
        &self,
        date: NaiveDate,
        lookback_years: usize,
    ) -> Result<f64, GlidepathError> {
        match self.asset_class.return_source() {
            ReturnSource::HistoricalMean => {
                let window = self.window(date, lookback_years)?;
                Ok(mean(&window))
            }
            ReturnSource::NominalRate => Ok(self.daily_rate()),
        }
    }

    pub fn fall_probability(&self, threshold: f64, date: NaiveDate) -> Result<f64, GlidepathError> {
        self.fall_probability_over(threshold, date, self.lookback_years)
    }

    /// Probability that the return is at or below `threshold`.
    pub fn fall_probability_over(
        &self,
        threshold: f64,
        date: NaiveDate,
        lookback_years: usize,
    ) -> Result<f64, GlidepathError> {
        match self.asset_class.return_source() {
            ReturnSource::NominalRate => {
                if self.annual_rate >= threshold {
                    Ok(1.0)
                } else {
                    Ok(0.0)
                }
            }
            ReturnSource::HistoricalMean => {
                let window = self.window(date, lookback_years)?;
                let empirical = window.iter().filter(|&&c| c <= threshold).count() as f64
                    / window.len() as f64;
                let parametric = normal_cdf(mean(&window), sample_std(&window), threshold);
                Ok(empirical.max(parametric))
            }
        }
    }

    /// Post-fee, post-tax value at `exit_date` of `investment_amount`
    /// invested at `entry_date`.
    pub fn forward_value(
        &self,
        investment_amount: f64,
        entry_date: NaiveDate,
        exit_date: NaiveDate,
    ) -> Result<f64, GlidepathError> {
        let r = self.expected_return(entry_date)?;
        let days = (exit_date - entry_date).num_days();
        let fv = (investment_amount - self.entry_fee) * (1.0 + r).powf(days as f64) - self.exit_fee;
        let pnl = fv - investment_amount;
        let tax = self
            .asset_class
            .tax_rule()
            .liability(pnl, fractional_years(days));
        Ok(fv - tax)
    }

    fn window(&self, date: NaiveDate, lookback_years: usize) -> Result<Vec<f64>, GlidepathError> {
        let window = self.history.change_window(date, lookback_years);
        if window.is_empty() {
            return Err(GlidepathError::EmptyWindow {
                instrument: self.name.clone(),
                date,
            });
        }
        Ok(window)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Normal CDF; a zero or undefined spread collapses to a step at the mean.
fn normal_cdf(mean: f64, std_dev: f64, x: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) => dist.cdf(x),
        Err(_) => {
            if x >= mean {
                1.0
            } else {
                0.0
            }
        }
    }
}

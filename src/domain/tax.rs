//! Holding-period capital gains tax.
//!
//! Tax applies only to a positive gain. The rate depends on the asset class
//! and on whether the holding period reaches the class's long-term threshold.

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxRule {
    pub long_term_years: u32,
    pub short_term_rate: f64,
    pub long_term_rate: f64,
}

impl TaxRule {
    pub fn rate(&self, holding_years: f64) -> f64 {
        if holding_years >= self.long_term_years as f64 {
            self.long_term_rate
        } else {
            self.short_term_rate
        }
    }

    /// Tax owed on `pnl` after `holding_years`; zero unless `pnl > 0`.
    pub fn liability(&self, pnl: f64, holding_years: f64) -> f64 {
        if pnl > 0.0 {
            pnl * self.rate(holding_years)
        } else {
            0.0
        }
    }
}

/// Fractional holding period used for projections.
pub fn fractional_years(days: i64) -> f64 {
    days as f64 / DAYS_PER_YEAR
}

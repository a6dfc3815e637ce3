//! Closing-price series with a derived day-over-day change series.

use chrono::NaiveDate;

use super::error::GlidepathError;

/// Trading days assumed per lookback year.
pub const TRADING_DAYS_PER_YEAR: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyChange {
    pub date: NaiveDate,
    pub change: f64,
}

/// Immutable snapshot of an instrument's history, ascending by date with one
/// record per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    points: Vec<PricePoint>,
    changes: Vec<DailyChange>,
}

impl PriceHistory {
    /// Builds the series from points already ascending by date with one
    /// record per date. Every close must be positive.
    pub fn new(points: Vec<PricePoint>) -> Result<Self, GlidepathError> {
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(GlidepathError::Data {
                reason: format!("non-positive close {} on {}", bad.close, bad.date),
            });
        }
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(GlidepathError::Data {
                reason: format!("dates out of order at {} after {}", w[1].date, w[0].date),
            });
        }

        // change[i] = (C[i] - C[i-1]) / C[i-1]; the first record has none.
        let changes = points
            .windows(2)
            .map(|w| DailyChange {
                date: w[1].date,
                change: (w[1].close - w[0].close) / w[0].close,
            })
            .collect();

        Ok(Self { points, changes })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn changes(&self) -> &[DailyChange] {
        &self.changes
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Most recent close at or before `date`.
    pub fn close_as_of(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        if idx == 0 {
            None
        } else {
            Some(self.points[idx - 1].close)
        }
    }

    /// Trailing daily changes ending at `date`, at most
    /// `lookback_years * TRADING_DAYS_PER_YEAR` observations.
    pub fn change_window(&self, date: NaiveDate, lookback_years: usize) -> Vec<f64> {
        let end = self.changes.partition_point(|c| c.date <= date);
        let start = end.saturating_sub(lookback_years * TRADING_DAYS_PER_YEAR);
        self.changes[start..end].iter().map(|c| c.change).collect()
    }
}

//! Discrete evaluation-date scheduler driving [`Goal::calibrate`].

use chrono::NaiveDate;
use std::sync::Arc;

use super::error::GlidepathError;
use super::goal::{CalibrationOutcome, Goal};
use super::instrument::Instrument;
use super::position::PositionSnapshot;

/// Instruments a goal calibrates against.
#[derive(Debug, Clone)]
pub struct Market {
    pub universe: Vec<Arc<Instrument>>,
    pub reference: Arc<Instrument>,
    pub cash: Arc<Instrument>,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub outcomes: Vec<CalibrationOutcome>,
    pub final_value: f64,
    pub projected_value: f64,
    pub realized_pnl: f64,
    pub positions: Vec<PositionSnapshot>,
}

impl SimulationResult {
    pub fn switch_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.switches.len()).sum()
    }

    pub fn total_collected(&self) -> f64 {
        self.outcomes.iter().map(|o| o.collected).sum()
    }
}

/// Every payday in the goal's schedule.
pub fn payday_dates(goal: &Goal) -> Vec<NaiveDate> {
    goal.schedule().paydays().collect()
}

/// Ascending, de-duplicated dates inside the goal's horizon.
pub fn normalize_dates(goal: &Goal, dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut out: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .filter(|d| {
            let inside = *d >= goal.inception_date() && *d <= goal.maturity_date();
            if !inside {
                tracing::warn!(date = %d, "evaluation date outside goal horizon, skipped");
            }
            inside
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Calibrates `goal` on each date in turn. Stops at the first failing date;
/// that date leaves the goal untouched.
pub fn run(
    goal: &mut Goal,
    market: &Market,
    dates: &[NaiveDate],
) -> Result<SimulationResult, GlidepathError> {
    let dates = normalize_dates(goal, dates);
    tracing::info!(goal = goal.name(), dates = dates.len(), "running simulation");

    let mut outcomes = Vec::with_capacity(dates.len());
    for date in &dates {
        let outcome = goal.calibrate(*date, &market.universe, &market.reference, &market.cash)?;
        if !outcome.switches.is_empty() || outcome.de_risked {
            tracing::info!(
                %date,
                switches = outcome.switches.len(),
                de_risked = outcome.de_risked,
                value = outcome.current_value,
                "calibrated"
            );
        }
        outcomes.push(outcome);
    }

    let as_of = dates.last().copied().unwrap_or(goal.inception_date());
    Ok(SimulationResult {
        outcomes,
        final_value: goal.current_value(),
        projected_value: goal.projected_value(as_of)?,
        realized_pnl: goal.realized_pnl(),
        positions: goal.snapshots(),
    })
}

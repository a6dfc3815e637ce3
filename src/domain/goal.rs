//! Goal lifecycle and the calibration (rebalancing) cycle.
//!
//! A goal owns a daily cash-flow schedule with a solved EMI, and the open
//! positions funding it. [`Goal::calibrate`] runs once per evaluation date:
//! collect scheduled cash, refresh positions, consult the policy, then either
//! filter/select/switch or de-risk into the reference instrument.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

use super::emi::EmiSolver;
use super::error::GlidepathError;
use super::format::to_currency;
use super::instrument::Instrument;
use super::policy::{PolicyAction, RebalancePolicy};
use super::position::{Position, PositionSnapshot};
use super::returns::daily_rate;
use super::schedule::CashFlowSchedule;

#[derive(Debug, Clone, PartialEq)]
pub struct GoalParams {
    pub name: String,
    pub inception_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub maturity_value: f64,
    pub min_maturity_value: Option<f64>,
    pub confidence: f64,
    pub downpayment: f64,
    pub payday: u32,
    /// Annual rate the EMI is discounted at.
    pub reference_rate: f64,
}

impl GoalParams {
    fn validate(&self) -> Result<(), GlidepathError> {
        let invalid = |reason: String| Err(GlidepathError::InvalidGoal { reason });

        if self.maturity_date <= self.inception_date {
            return invalid(format!(
                "maturity {} must be after inception {}",
                self.maturity_date, self.inception_date
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return invalid(format!("confidence must be in (0, 1), got {}", self.confidence));
        }
        if !(self.maturity_value.is_finite() && self.maturity_value > 0.0) {
            return invalid(format!("maturity value must be positive, got {}", self.maturity_value));
        }
        if !(self.downpayment.is_finite() && self.downpayment >= 0.0) {
            return invalid(format!("downpayment must be non-negative, got {}", self.downpayment));
        }
        if !(1..=28).contains(&self.payday) {
            return invalid(format!("payday must be between 1 and 28, got {}", self.payday));
        }
        if let Some(min) = self.min_maturity_value {
            if min > self.maturity_value {
                return invalid("minimum maturity value exceeds the target".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

/// What one calibration cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub date: NaiveDate,
    pub collected: f64,
    pub drawdown_threshold: Option<f64>,
    pub eligible: Vec<String>,
    pub best: Option<String>,
    pub switches: Vec<Switch>,
    pub de_risked: bool,
    pub current_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    params: GoalParams,
    discount_rate: f64,
    emi: f64,
    schedule: CashFlowSchedule,
    positions: Vec<Position>,
    policy: RebalancePolicy,
    current_value: f64,
    pnl: f64,
    realized_pnl: f64,
    last_collection: Option<NaiveDate>,
}

impl Goal {
    pub fn new(
        params: GoalParams,
        policy: RebalancePolicy,
        solver: &EmiSolver,
    ) -> Result<Self, GlidepathError> {
        params.validate()?;

        let mut schedule = CashFlowSchedule::new(
            params.inception_date,
            params.maturity_date,
            params.downpayment,
            params.maturity_value,
            params.payday,
        );
        let discount_rate = daily_rate(params.reference_rate);
        let emi = solver.solve(&mut schedule, discount_rate, params.maturity_value)?;
        tracing::info!(goal = %params.name, emi, "EMI solved");

        Ok(Self {
            params,
            discount_rate,
            emi,
            schedule,
            positions: Vec::new(),
            policy,
            current_value: 0.0,
            pnl: 0.0,
            realized_pnl: 0.0,
            last_collection: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn params(&self) -> &GoalParams {
        &self.params
    }

    pub fn inception_date(&self) -> NaiveDate {
        self.params.inception_date
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.params.maturity_date
    }

    pub fn maturity_value(&self) -> f64 {
        self.params.maturity_value
    }

    pub fn confidence(&self) -> f64 {
        self.params.confidence
    }

    pub fn emi(&self) -> f64 {
        self.emi
    }

    /// Per-day rate the schedule is discounted at.
    pub fn discount_rate(&self) -> f64 {
        self.discount_rate
    }

    pub fn schedule(&self) -> &CashFlowSchedule {
        &self.schedule
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn policy(&self) -> &RebalancePolicy {
        &self.policy
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    /// Unrealized pnl of the open positions.
    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.pnl
    }

    pub fn snapshots(&self) -> Vec<PositionSnapshot> {
        self.positions.iter().map(Position::snapshot).collect()
    }

    /// Re-sets the EMI on every payday on or after `date`.
    pub fn update_emi(&mut self, date: NaiveDate, emi: f64) {
        self.schedule.set_emi_from(date, emi);
        self.emi = emi;
    }

    /// Opens a new position of `amount` in `instrument` on `date`.
    pub fn invest(
        &mut self,
        date: NaiveDate,
        instrument: &Arc<Instrument>,
        amount: f64,
    ) -> Result<(), GlidepathError> {
        let position = Position::open(Arc::clone(instrument), date, amount)?;
        tracing::debug!(position = position.name(), amount, "opened position");
        self.positions.push(position);
        self.refresh_totals();
        Ok(())
    }

    /// Moves any downpayment or EMI scheduled on `date` into a new cash
    /// position. A date is collected at most once.
    pub fn collect_cash(
        &mut self,
        date: NaiveDate,
        cash: &Arc<Instrument>,
    ) -> Result<f64, GlidepathError> {
        if self.last_collection.is_some_and(|last| date <= last) {
            return Ok(0.0);
        }
        let available = self.schedule.row(date).map(|r| r.inflow()).unwrap_or(0.0);
        if available > 0.0 {
            self.invest(date, cash, available)?;
            tracing::info!(goal = %self.params.name, %date, amount = available, "collected cash");
        }
        self.last_collection = Some(date);
        Ok(available)
    }

    /// Refreshes every open position as of `date`. Either all positions are
    /// refreshed or none is.
    pub fn update(&mut self, date: NaiveDate) -> Result<f64, GlidepathError> {
        let mut refreshed = self.positions.clone();
        for position in refreshed.iter_mut().filter(|p| p.is_active()) {
            position.update(date)?;
            tracing::debug!(
                position = position.name(),
                current = position.current_value(),
                exit = position.exit_value(),
                "position updated"
            );
        }
        self.positions = refreshed;
        self.refresh_totals();
        Ok(self.current_value)
    }

    /// Largest fractional fall the goal can absorb as of `date`:
    /// outstanding obligation / current value - 1. `None` without capital.
    pub fn drawdown_threshold(
        &self,
        date: NaiveDate,
        reference: &Instrument,
    ) -> Result<Option<f64>, GlidepathError> {
        if self.current_value <= 0.0 {
            return Ok(None);
        }
        let rate = reference.expected_return(date)?;
        let owed = self.schedule.outstanding_obligation(date, rate);
        Ok(Some(owed / self.current_value - 1.0))
    }

    /// Instruments whose probability of falling to the drawdown threshold is
    /// strictly below `1 - confidence`.
    pub fn filter_instruments(
        &self,
        date: NaiveDate,
        universe: &[Arc<Instrument>],
        reference: &Instrument,
    ) -> Result<Vec<Arc<Instrument>>, GlidepathError> {
        let Some(r_min) = self.drawdown_threshold(date, reference)? else {
            return Ok(Vec::new());
        };
        let tolerance = 1.0 - self.params.confidence;

        let mut eligible = Vec::new();
        for instrument in universe {
            let p = instrument.fall_probability(r_min, date)?;
            let keep = p < tolerance;
            tracing::debug!(instrument = %instrument, r_min, p, keep, "filter");
            if keep {
                eligible.push(Arc::clone(instrument));
            }
        }
        Ok(eligible)
    }

    /// Candidate with the highest projected value at maturity for the goal's
    /// current value. On ties the earlier candidate wins.
    pub fn best_instrument(
        &self,
        date: NaiveDate,
        candidates: &[Arc<Instrument>],
    ) -> Result<Option<(Arc<Instrument>, f64)>, GlidepathError> {
        let mut best: Option<(Arc<Instrument>, f64)> = None;
        for instrument in candidates {
            let fv = instrument.forward_value(self.current_value, date, self.params.maturity_date)?;
            let better = match &best {
                Some((_, best_fv)) => fv > *best_fv,
                None => true,
            };
            if better {
                best = Some((Arc::clone(instrument), fv));
            }
        }
        Ok(best)
    }

    /// Moves every position whose projection is strictly beaten by `best`
    /// for the same transferred amount. Closed positions are pruned.
    pub fn switch_positions(
        &mut self,
        date: NaiveDate,
        best: &Arc<Instrument>,
    ) -> Result<Vec<Switch>, GlidepathError> {
        let maturity = self.params.maturity_date;
        self.move_positions(date, best, |position| {
            let held = position.forward_value(date, maturity)?;
            let candidate = best.forward_value(position.exit_value(), date, maturity)?;
            Ok(candidate > held)
        })
    }

    /// Runs one calibration cycle. On error the goal is left as it was.
    pub fn calibrate(
        &mut self,
        date: NaiveDate,
        universe: &[Arc<Instrument>],
        reference: &Arc<Instrument>,
        cash: &Arc<Instrument>,
    ) -> Result<CalibrationOutcome, GlidepathError> {
        let mut next = self.clone();
        let outcome = next.run_cycle(date, universe, reference, cash)?;
        *self = next;
        Ok(outcome)
    }

    /// Sum of every open position's projected value at maturity.
    pub fn projected_value(&self, date: NaiveDate) -> Result<f64, GlidepathError> {
        self.positions
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.forward_value(date, self.params.maturity_date))
            .sum()
    }

    /// Projected shortfall against the target and, if set, the minimum.
    pub fn shortfall(&self, date: NaiveDate) -> Result<(f64, Option<f64>), GlidepathError> {
        let projected = self.projected_value(date)?;
        let target = (self.params.maturity_value - projected).max(0.0);
        let minimum = self
            .params
            .min_maturity_value
            .map(|min| (min - projected).max(0.0));
        Ok((target, minimum))
    }

    fn run_cycle(
        &mut self,
        date: NaiveDate,
        universe: &[Arc<Instrument>],
        reference: &Arc<Instrument>,
        cash: &Arc<Instrument>,
    ) -> Result<CalibrationOutcome, GlidepathError> {
        let collected = self.collect_cash(date, cash)?;
        self.update(date)?;

        let mut outcome = CalibrationOutcome {
            date,
            collected,
            drawdown_threshold: None,
            eligible: Vec::new(),
            best: None,
            switches: Vec::new(),
            de_risked: false,
            current_value: self.current_value,
        };

        match self.policy.decide(self.total_pnl()) {
            PolicyAction::DeRisk => {
                outcome.de_risked = true;
                outcome.switches = self.move_positions(date, reference, |position| {
                    Ok(position.instrument().name != reference.name)
                })?;
            }
            PolicyAction::Rebalance => {
                outcome.drawdown_threshold = self.drawdown_threshold(date, reference)?;
                let eligible = self.filter_instruments(date, universe, reference)?;
                outcome.eligible = eligible.iter().map(|i| i.name.clone()).collect();

                if let Some((best, fv)) = self.best_instrument(date, &eligible)? {
                    tracing::debug!(instrument = %best, fv, "best instrument");
                    outcome.best = Some(best.name.clone());
                    outcome.switches = self.switch_positions(date, &best)?;
                }
            }
        }

        outcome.current_value = self.current_value;
        Ok(outcome)
    }

    fn move_positions<F>(
        &mut self,
        date: NaiveDate,
        target: &Arc<Instrument>,
        mut should_move: F,
    ) -> Result<Vec<Switch>, GlidepathError>
    where
        F: FnMut(&Position) -> Result<bool, GlidepathError>,
    {
        let mut switches = Vec::new();
        let mut opened = Vec::new();

        for position in self.positions.iter_mut() {
            if !position.is_active() {
                continue;
            }
            if !should_move(&*position)? {
                continue;
            }
            let basis = position.entry_value();
            let proceeds = position.withdraw_full(date)?;
            self.realized_pnl += proceeds - basis;
            opened.push(Position::open(Arc::clone(target), date, proceeds)?);

            tracing::info!(
                from = position.name(),
                to = %target,
                amount = proceeds,
                "switched position"
            );
            switches.push(Switch {
                from: position.name().to_string(),
                to: target.name.clone(),
                amount: proceeds,
            });
        }

        self.positions.extend(opened);
        self.positions.retain(Position::is_active);
        self.refresh_totals();
        Ok(switches)
    }

    fn refresh_totals(&mut self) {
        let open = self.positions.iter().filter(|p| p.is_active());
        let (value, pnl) = open.fold((0.0, 0.0), |(v, p), pos| {
            (v + pos.exit_value(), p + pos.pnl())
        });
        self.current_value = value;
        self.pnl = pnl;
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} on {} | EMI: {}, Downpayment: {}",
            self.params.name,
            to_currency(self.params.maturity_value),
            self.params.maturity_date.format("%d %b %Y"),
            to_currency(self.emi),
            to_currency(self.params.downpayment),
        )
    }
}

//! Fixed-point solver for the level periodic contribution (EMI).
//!
//! The schedule's NPV is linear in the EMI, so each correction moves the NPV
//! toward the middle of the `(0, tolerance)` acceptance band by a fixed
//! fraction. The loop is bounded by [`EmiSolver::max_iterations`].

use chrono::NaiveDate;

use super::error::GlidepathError;
use super::returns::annuity_due_payment;
use super::schedule::CashFlowSchedule;

pub const DEFAULT_TOLERANCE: f64 = 1.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 1_000;

/// Calendar days per contribution period used to seed the solver.
const DAYS_PER_PERIOD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmiSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for EmiSolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl EmiSolver {
    /// Finds the EMI for which the schedule's NPV at `rate` (per schedule
    /// row) lies in `(0, tolerance)`, and writes it into every payday row.
    pub fn solve(
        &self,
        schedule: &mut CashFlowSchedule,
        rate: f64,
        maturity_value: f64,
    ) -> Result<f64, GlidepathError> {
        let rows = schedule.rows();
        let (inception, maturity, downpayment) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first.date, last.date, first.downpayment),
            _ => {
                return Err(GlidepathError::InvalidGoal {
                    reason: "empty cash-flow schedule".into(),
                });
            }
        };

        let periods = schedule.payday_count();
        if periods == 0 {
            return Err(GlidepathError::Convergence {
                iterations: 0,
                surplus: schedule.npv(rate),
            });
        }

        let mut emi = seed(rate, inception, maturity, downpayment, maturity_value);
        let target = self.tolerance / 2.0;

        for iteration in 0..self.max_iterations {
            schedule.set_emi_from(inception, emi);
            let surplus = schedule.npv(rate);
            tracing::trace!(iteration, emi, surplus, "EMI solver step");

            if surplus > 0.0 && surplus < self.tolerance {
                return Ok(emi);
            }
            emi -= (surplus - target) / periods as f64;
        }

        Err(GlidepathError::Convergence {
            iterations: self.max_iterations,
            surplus: schedule.npv(rate),
        })
    }
}

/// Annuity-due payment over the horizon measured in 30-day periods.
fn seed(
    rate: f64,
    inception: NaiveDate,
    maturity: NaiveDate,
    downpayment: f64,
    maturity_value: f64,
) -> f64 {
    let periods = (maturity - inception).num_days() as f64 / DAYS_PER_PERIOD;
    annuity_due_payment(rate, periods, downpayment, maturity_value)
}

//! Rebalancing policies.
//!
//! [`RebalancePolicy::ConfidenceFilter`] always runs the filter/select/switch
//! cycle. [`RebalancePolicy::RiskBudget`] does the same until its loss budget
//! is spent, after which every cycle moves the goal into the reference
//! instrument.

use super::error::GlidepathError;

#[derive(Debug, Clone, PartialEq)]
pub enum RebalancePolicy {
    ConfidenceFilter,
    RiskBudget(RiskBudget),
}

/// What the goal should do on this evaluation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// filter the universe, pick the best instrument, switch dominated positions
    Rebalance,
    /// move every open position into the reference instrument
    DeRisk,
}

/// A total digestible loss split into `wickets` equal units of appetite.
///
/// A wicket falls each time the cumulative loss crosses another multiple of
/// the per-wicket appetite. Fallen wickets never recover, and once all have
/// fallen the budget is exhausted for the rest of the goal's life.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBudget {
    total_loss: f64,
    wickets: u32,
    wickets_fallen: u32,
}

impl RiskBudget {
    pub fn new(total_loss: f64, wickets: u32) -> Result<Self, GlidepathError> {
        if !(total_loss.is_finite() && total_loss > 0.0) {
            return Err(GlidepathError::InvalidGoal {
                reason: format!("digestible loss must be positive, got {total_loss}"),
            });
        }
        if wickets == 0 {
            return Err(GlidepathError::InvalidGoal {
                reason: "wicket count must be at least 1".into(),
            });
        }
        Ok(Self {
            total_loss,
            wickets,
            wickets_fallen: 0,
        })
    }

    pub fn appetite_per_wicket(&self) -> f64 {
        self.total_loss / self.wickets as f64
    }

    pub fn wickets(&self) -> u32 {
        self.wickets
    }

    pub fn wickets_fallen(&self) -> u32 {
        self.wickets_fallen
    }

    pub fn remaining(&self) -> u32 {
        self.wickets - self.wickets_fallen
    }

    pub fn is_exhausted(&self) -> bool {
        self.wickets_fallen >= self.wickets
    }

    /// Records the goal's cumulative pnl and returns how many wickets fell.
    pub fn record(&mut self, cumulative_pnl: f64) -> u32 {
        let loss = (-cumulative_pnl).max(0.0);
        let breached = ((loss / self.appetite_per_wicket()).floor() as u32).min(self.wickets);
        let newly_fallen = breached.saturating_sub(self.wickets_fallen);
        self.wickets_fallen += newly_fallen;
        newly_fallen
    }
}

impl RebalancePolicy {
    pub fn risk_budget(total_loss: f64, wickets: u32) -> Result<Self, GlidepathError> {
        Ok(RebalancePolicy::RiskBudget(RiskBudget::new(total_loss, wickets)?))
    }

    pub fn decide(&mut self, cumulative_pnl: f64) -> PolicyAction {
        match self {
            RebalancePolicy::ConfidenceFilter => PolicyAction::Rebalance,
            RebalancePolicy::RiskBudget(budget) => {
                let fallen = budget.record(cumulative_pnl);
                if fallen > 0 {
                    tracing::info!(
                        fallen,
                        remaining = budget.remaining(),
                        "risk budget wicket lost"
                    );
                }
                if budget.is_exhausted() {
                    PolicyAction::DeRisk
                } else {
                    PolicyAction::Rebalance
                }
            }
        }
    }

    pub fn is_de_risked(&self) -> bool {
        match self {
            RebalancePolicy::ConfidenceFilter => false,
            RebalancePolicy::RiskBudget(budget) => budget.is_exhausted(),
        }
    }
}

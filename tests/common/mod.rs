#![allow(dead_code)]

use chrono::NaiveDate;
use glidepath::domain::asset_class::AssetClass;
use glidepath::domain::emi::EmiSolver;
use glidepath::domain::error::GlidepathError;
use glidepath::domain::goal::{Goal, GoalParams};
use glidepath::domain::instrument::Instrument;
use glidepath::domain::policy::RebalancePolicy;
use glidepath::domain::price_history::{PriceHistory, PricePoint};
use glidepath::ports::data_port::PriceDataPort;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MockPriceDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_points(mut self, source: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(source.to_string(), points);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn fetch_closes(&self, source: &str) -> Result<Vec<PricePoint>, GlidepathError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(GlidepathError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(source).cloned().unwrap_or_default())
    }

    fn list_sources(&self) -> Result<Vec<String>, GlidepathError> {
        let mut sources: Vec<String> = self.data.keys().cloned().collect();
        sources.sort();
        Ok(sources)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One close per calendar day, each `growth` times the previous one.
pub fn generate_points(
    start: NaiveDate,
    count: usize,
    start_price: f64,
    growth: f64,
) -> Vec<PricePoint> {
    (0..count)
        .map(|i| PricePoint {
            date: start + chrono::Duration::days(i as i64),
            close: start_price * growth.powi(i as i32),
        })
        .collect()
}

/// Daily closes alternating between an `up` and a `down` move.
pub fn generate_zigzag(
    start: NaiveDate,
    count: usize,
    start_price: f64,
    up: f64,
    down: f64,
) -> Vec<PricePoint> {
    let mut close = start_price;
    (0..count)
        .map(|i| {
            if i > 0 {
                close *= if i % 2 == 1 { 1.0 + up } else { 1.0 - down };
            }
            PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close,
            }
        })
        .collect()
}

pub fn debt(name: &str, rate: f64) -> Arc<Instrument> {
    Arc::new(Instrument::fixed_rate(name, AssetClass::Debt, rate))
}

pub fn cash() -> Arc<Instrument> {
    Arc::new(Instrument::fixed_rate("cash", AssetClass::Cash, 0.0))
}

pub fn equity(name: &str, points: Vec<PricePoint>) -> Arc<Instrument> {
    Arc::new(Instrument::equity(name, PriceHistory::new(points).unwrap()))
}

pub fn goal_params(
    name: &str,
    inception: NaiveDate,
    maturity: NaiveDate,
    maturity_value: f64,
) -> GoalParams {
    GoalParams {
        name: name.to_string(),
        inception_date: inception,
        maturity_date: maturity,
        maturity_value,
        min_maturity_value: None,
        confidence: 0.95,
        downpayment: 0.0,
        payday: 1,
        reference_rate: 0.06,
    }
}

pub fn make_goal(params: GoalParams) -> Goal {
    Goal::new(params, RebalancePolicy::ConfidenceFilter, &EmiSolver::default()).unwrap()
}

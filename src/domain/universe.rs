//! Instrument universe: parses the configured instrument list and builds each
//! instrument, loading a price series for equity instruments.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::asset_class::AssetClass;
use crate::domain::error::GlidepathError;
use crate::domain::instrument::Instrument;
use crate::domain::price_history::PriceHistory;
use crate::ports::data_port::PriceDataPort;

/// An equity series needs at least two closes to yield one daily change.
pub const MIN_PRICE_POINTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSpec {
    pub name: String,
    pub asset_class: AssetClass,
    pub ticker: Option<String>,
    pub annual_rate: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    /// Price series source for equity instruments.
    pub source: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("duplicate instrument: {0}")]
    DuplicateName(String),
}

pub fn parse_names(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let name = trimmed.to_lowercase();
        if !seen.insert(name.clone()) {
            return Err(UniverseError::DuplicateName(name));
        }
        names.push(name);
    }

    Ok(names)
}

#[derive(Debug, Clone)]
pub struct SkippedInstrument {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientPoints { points: usize },
}

#[derive(Debug)]
pub struct UniverseLoadResult {
    pub instruments: Vec<Arc<Instrument>>,
    pub skipped: Vec<SkippedInstrument>,
}

/// Builds one instrument. Equity specs load their series through `data_port`.
pub fn build_instrument(
    spec: &InstrumentSpec,
    data_port: &dyn PriceDataPort,
    lookback_years: usize,
) -> Result<Instrument, GlidepathError> {
    let instrument = if spec.asset_class.uses_price_series() {
        let source = spec.source.as_deref().unwrap_or(&spec.name);
        let history = PriceHistory::new(data_port.fetch_closes(source)?)?;
        Instrument::equity(spec.name.clone(), history)
    } else {
        Instrument::fixed_rate(spec.name.clone(), spec.asset_class, spec.annual_rate)
    };

    let instrument = instrument
        .with_fees(spec.entry_fee, spec.exit_fee)
        .with_lookback_years(lookback_years);
    Ok(match &spec.ticker {
        Some(ticker) => instrument.with_ticker(ticker.clone()),
        None => instrument,
    })
}

/// Builds every instrument, skipping equity instruments without enough
/// price data. Fails only if nothing survives.
pub fn load_universe(
    data_port: &dyn PriceDataPort,
    specs: &[InstrumentSpec],
    lookback_years: usize,
) -> Result<UniverseLoadResult, GlidepathError> {
    let mut instruments = Vec::new();
    let mut skipped = Vec::new();

    for spec in specs {
        let instrument = match build_instrument(spec, data_port, lookback_years) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(instrument = %spec.name, error = %e, "skipping instrument");
                skipped.push(SkippedInstrument {
                    name: spec.name.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if instrument.asset_class.uses_price_series() {
            let points = instrument.history().len();
            if points < MIN_PRICE_POINTS {
                tracing::warn!(
                    instrument = %spec.name,
                    points,
                    minimum = MIN_PRICE_POINTS,
                    "skipping instrument with too little price data"
                );
                let reason = if points == 0 {
                    SkipReason::NoData
                } else {
                    SkipReason::InsufficientPoints { points }
                };
                skipped.push(SkippedInstrument {
                    name: spec.name.clone(),
                    reason,
                });
                continue;
            }
            tracing::info!(instrument = %spec.name, points, "loaded price series");
        }

        instruments.push(Arc::new(instrument));
    }

    if instruments.is_empty() && !specs.is_empty() {
        return Err(GlidepathError::Data {
            reason: "no instrument in the universe could be loaded".to_string(),
        });
    }

    Ok(UniverseLoadResult {
        instruments,
        skipped,
    })
}

/// Equity instruments whose price source `data_port` cannot serve.
pub fn missing_sources(
    data_port: &dyn PriceDataPort,
    specs: &[InstrumentSpec],
) -> Result<Vec<String>, GlidepathError> {
    let equities: Vec<_> = specs
        .iter()
        .filter(|s| s.asset_class.uses_price_series())
        .collect();
    if equities.is_empty() {
        return Ok(Vec::new());
    }

    let available: HashSet<String> = data_port.list_sources()?.into_iter().collect();
    Ok(equities
        .into_iter()
        .map(|spec| spec.source.as_deref().unwrap_or(&spec.name))
        .filter(|source| {
            let stem = source.strip_suffix(".csv").unwrap_or(source);
            !available.contains(stem)
        })
        .map(str::to_string)
        .collect())
}

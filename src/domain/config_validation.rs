//! Configuration validation.
//!
//! Validates every config field before a goal is built, so later reads can
//! use the defaulting accessors on [`ConfigPort`].

use crate::domain::asset_class::AssetClass;
use crate::domain::error::GlidepathError;
use crate::domain::universe::{parse_names, UniverseError};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    validate_goal(config)?;
    validate_policy(config)?;
    validate_reference(config)?;
    validate_cash(config)?;
    for name in instrument_names(config)? {
        validate_instrument(config, &name)?;
    }
    validate_simulation(config)?;
    Ok(())
}

pub fn validate_goal(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    required_string(config, "goal", "name")?;

    let inception = required_date(config, "goal", "inception_date")?;
    let maturity = required_date(config, "goal", "maturity_date")?;
    if maturity <= inception {
        return Err(invalid("goal", "maturity_date", "maturity_date must be after inception_date"));
    }

    let maturity_value = required_f64(config, "goal", "maturity_value")?;
    if maturity_value <= 0.0 {
        return Err(invalid("goal", "maturity_value", "maturity_value must be positive"));
    }

    if let Some(min) = optional_f64(config, "goal", "min_maturity_value")? {
        if min <= 0.0 || min > maturity_value {
            return Err(invalid(
                "goal",
                "min_maturity_value",
                "min_maturity_value must be positive and at most maturity_value",
            ));
        }
    }

    let confidence = required_f64(config, "goal", "confidence")?;
    if confidence <= 0.0 || confidence >= 1.0 {
        return Err(invalid("goal", "confidence", "confidence must be between 0 and 1"));
    }

    if optional_f64(config, "goal", "downpayment")?.unwrap_or(0.0) < 0.0 {
        return Err(invalid("goal", "downpayment", "downpayment must be non-negative"));
    }

    let payday = optional_i64(config, "goal", "payday")?.unwrap_or(1);
    if !(1..=28).contains(&payday) {
        return Err(invalid("goal", "payday", "payday must be between 1 and 28"));
    }
    Ok(())
}

pub fn validate_policy(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    let policy = config
        .get_string("goal", "policy")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "confidence".to_string());

    match policy.as_str() {
        "confidence" => Ok(()),
        "risk_budget" => {
            match optional_f64(config, "goal", "digestible_loss")? {
                Some(v) if v > 0.0 => {}
                Some(_) => {
                    return Err(invalid(
                        "goal",
                        "digestible_loss",
                        "digestible_loss must be positive",
                    ));
                }
                None => return Err(missing("goal", "digestible_loss")),
            }
            match optional_i64(config, "goal", "wickets")? {
                Some(v) if v >= 1 => Ok(()),
                Some(_) => Err(invalid("goal", "wickets", "wickets must be at least 1")),
                None => Err(missing("goal", "wickets")),
            }
        }
        other => Err(invalid(
            "goal",
            "policy",
            &format!("unknown policy '{other}', expected confidence or risk_budget"),
        )),
    }
}

fn validate_reference(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    let class = optional_asset_class(config, "reference")?.unwrap_or(AssetClass::Debt);
    if class.uses_price_series() {
        return Err(invalid(
            "reference",
            "asset_class",
            "reference must be a fixed-rate instrument",
        ));
    }
    let rate = required_f64(config, "reference", "rate")?;
    if rate <= -1.0 {
        return Err(invalid("reference", "rate", "rate must be greater than -1"));
    }
    validate_fees(config, "reference")
}

fn validate_cash(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    if optional_f64(config, "cash", "rate")?.unwrap_or(0.0) <= -1.0 {
        return Err(invalid("cash", "rate", "rate must be greater than -1"));
    }
    validate_fees(config, "cash")
}

fn validate_instrument(config: &dyn ConfigPort, name: &str) -> Result<(), GlidepathError> {
    let section = instrument_section(name);
    let class = match optional_asset_class(config, &section)? {
        Some(c) => c,
        None => return Err(missing(&section, "asset_class")),
    };

    if !class.uses_price_series() {
        let rate = optional_f64(config, &section, "rate")?.unwrap_or(0.0);
        if rate <= -1.0 {
            return Err(invalid(&section, "rate", "rate must be greater than -1"));
        }
    }
    validate_fees(config, &section)
}

fn validate_fees(config: &dyn ConfigPort, section: &str) -> Result<(), GlidepathError> {
    for key in ["entry_fee", "exit_fee"] {
        if optional_f64(config, section, key)?.unwrap_or(0.0) < 0.0 {
            return Err(invalid(section, key, &format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_simulation(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    if let Some(years) = optional_i64(config, "simulation", "lookback_years")? {
        if years < 1 {
            return Err(invalid(
                "simulation",
                "lookback_years",
                "lookback_years must be at least 1",
            ));
        }
    }
    evaluation_dates(config)?;
    Ok(())
}

/// Section holding the settings of instrument `name`.
pub fn instrument_section(name: &str) -> String {
    format!("instrument.{name}")
}

pub fn instrument_names(config: &dyn ConfigPort) -> Result<Vec<String>, GlidepathError> {
    let raw = required_string(config, "universe", "instruments")?;
    parse_names(&raw).map_err(|e| {
        let reason = match e {
            UniverseError::EmptyToken => "instrument list contains an empty name".to_string(),
            UniverseError::DuplicateName(n) => format!("instrument '{n}' listed twice"),
        };
        GlidepathError::ConfigInvalid {
            section: "universe".to_string(),
            key: "instruments".to_string(),
            reason,
        }
    })
}

/// Explicit evaluation dates from `[simulation] dates`, if configured.
pub fn evaluation_dates(config: &dyn ConfigPort) -> Result<Option<Vec<NaiveDate>>, GlidepathError> {
    let Some(raw) = config.get_string("simulation", "dates") else {
        return Ok(None);
    };
    parse_date_list(&raw)
        .map(Some)
        .map_err(|reason| invalid("simulation", "dates", &reason))
}

/// Parses a comma-separated list of `YYYY-MM-DD` dates.
pub fn parse_date_list(raw: &str) -> Result<Vec<NaiveDate>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map_err(|_| format!("invalid date '{s}', expected YYYY-MM-DD"))
        })
        .collect()
}

pub fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, GlidepathError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

pub fn required_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, GlidepathError> {
    let raw = required_string(config, section, key)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|_| invalid(section, key, &format!("invalid {key} format, expected YYYY-MM-DD")))
}

fn required_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, GlidepathError> {
    optional_f64(config, section, key)?.ok_or_else(|| missing(section, key))
}

fn optional_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, GlidepathError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("{key} must be a number"))),
        },
    }
}

fn optional_i64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, GlidepathError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("{key} must be an integer"))),
    }
}

pub fn optional_asset_class(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<Option<AssetClass>, GlidepathError> {
    match config.get_string(section, "asset_class") {
        None => Ok(None),
        Some(s) => s
            .parse::<AssetClass>()
            .map(Some)
            .map_err(|reason| invalid(section, "asset_class", &reason)),
    }
}

fn missing(section: &str, key: &str) -> GlidepathError {
    GlidepathError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> GlidepathError {
    GlidepathError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

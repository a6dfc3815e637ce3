//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for glidepath.
#[derive(Debug, thiserror::Error)]
pub enum GlidepathError {
    #[error("no price for {instrument} on or before {date}")]
    NoPriorPrice { instrument: String, date: NaiveDate },

    #[error("insufficient funds: requested {requested:.2}, available {available:.2}")]
    InsufficientFunds { requested: f64, available: f64 },

    #[error("EMI solver did not converge after {iterations} iterations (surplus {surplus:.4})")]
    Convergence { iterations: usize, surplus: f64 },

    #[error("no observations for {instrument} in lookback window ending {date}")]
    EmptyWindow { instrument: String, date: NaiveDate },

    #[error("position {position} is closed")]
    PositionClosed { position: String },

    #[error("position {position} last updated {last_update}, cannot update to {requested}")]
    OutOfOrderUpdate {
        position: String,
        last_update: NaiveDate,
        requested: NaiveDate,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("invalid goal: {reason}")]
    InvalidGoal { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&GlidepathError> for std::process::ExitCode {
    fn from(err: &GlidepathError) -> Self {
        let code: u8 = match err {
            GlidepathError::Io(_) => 1,
            GlidepathError::ConfigParse { .. }
            | GlidepathError::ConfigMissing { .. }
            | GlidepathError::ConfigInvalid { .. } => 2,
            GlidepathError::Data { .. }
            | GlidepathError::NoPriorPrice { .. }
            | GlidepathError::EmptyWindow { .. } => 3,
            GlidepathError::InsufficientFunds { .. }
            | GlidepathError::PositionClosed { .. }
            | GlidepathError::OutOfOrderUpdate { .. }
            | GlidepathError::InvalidAmount { .. }
            | GlidepathError::InvalidGoal { .. } => 4,
            GlidepathError::Convergence { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

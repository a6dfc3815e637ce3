//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::asset_class::AssetClass;
use crate::domain::config_validation::{
    evaluation_dates, instrument_names, instrument_section, optional_asset_class, parse_date_list,
    required_date, required_string, validate_config,
};
use crate::domain::emi::EmiSolver;
use crate::domain::error::GlidepathError;
use crate::domain::format::to_currency;
use crate::domain::goal::{Goal, GoalParams};
use crate::domain::instrument::{Instrument, DEFAULT_LOOKBACK_YEARS};
use crate::domain::policy::RebalancePolicy;
use crate::domain::simulation::{self, Market, SimulationResult};
use crate::domain::universe::{load_universe, missing_sources, InstrumentSpec};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;

const DEFAULT_LOG_FILTER: &str = "glidepath=info";

#[derive(Parser, Debug)]
#[command(name = "glidepath", about = "Goal-based investment glide-path simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Calibrate a goal over its evaluation dates
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated YYYY-MM-DD dates, overriding the config
        #[arg(long)]
        dates: Option<String>,
        /// Directory holding equity price CSVs, overriding the config
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Solve and print the level contribution for a goal
    Emi {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a goal configuration and check its price files
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding equity price CSVs, overriding the config
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

/// Installs the stderr `tracing` subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Simulate {
            config,
            dates,
            data_dir,
        } => run_simulate(&config, dates.as_deref(), data_dir.as_deref()),
        Command::Emi { config } => run_emi(&config),
        Command::Validate { config, data_dir } => run_validate(&config, data_dir.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, GlidepathError> {
    tracing::info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

pub fn build_goal_params(config: &dyn ConfigPort) -> Result<GoalParams, GlidepathError> {
    Ok(GoalParams {
        name: required_string(config, "goal", "name")?,
        inception_date: required_date(config, "goal", "inception_date")?,
        maturity_date: required_date(config, "goal", "maturity_date")?,
        maturity_value: config.get_double("goal", "maturity_value", 0.0),
        min_maturity_value: config
            .get_string("goal", "min_maturity_value")
            .map(|_| config.get_double("goal", "min_maturity_value", 0.0)),
        confidence: config.get_double("goal", "confidence", 0.0),
        downpayment: config.get_double("goal", "downpayment", 0.0),
        payday: config.get_int("goal", "payday", 1) as u32,
        reference_rate: config.get_double("reference", "rate", 0.0),
    })
}

pub fn build_policy(config: &dyn ConfigPort) -> Result<RebalancePolicy, GlidepathError> {
    let policy = config
        .get_string("goal", "policy")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    if policy == "risk_budget" {
        RebalancePolicy::risk_budget(
            config.get_double("goal", "digestible_loss", 0.0),
            config.get_int("goal", "wickets", 0) as u32,
        )
    } else {
        Ok(RebalancePolicy::ConfidenceFilter)
    }
}

pub fn build_goal(config: &dyn ConfigPort) -> Result<Goal, GlidepathError> {
    let params = build_goal_params(config)?;
    let policy = build_policy(config)?;
    Goal::new(params, policy, &EmiSolver::default())
}

fn fixed_instrument(
    config: &dyn ConfigPort,
    section: &str,
    default_class: AssetClass,
) -> Result<Instrument, GlidepathError> {
    let name = config
        .get_string(section, "name")
        .unwrap_or_else(|| section.to_string());
    let class = optional_asset_class(config, section)?.unwrap_or(default_class);

    Ok(
        Instrument::fixed_rate(name, class, config.get_double(section, "rate", 0.0)).with_fees(
            config.get_double(section, "entry_fee", 0.0),
            config.get_double(section, "exit_fee", 0.0),
        ),
    )
}

pub fn build_reference(config: &dyn ConfigPort) -> Result<Instrument, GlidepathError> {
    fixed_instrument(config, "reference", AssetClass::Debt)
}

pub fn build_cash(config: &dyn ConfigPort) -> Result<Instrument, GlidepathError> {
    fixed_instrument(config, "cash", AssetClass::Cash)
}

pub fn instrument_specs(config: &dyn ConfigPort) -> Result<Vec<InstrumentSpec>, GlidepathError> {
    instrument_names(config)?
        .into_iter()
        .map(|name| {
            let section = instrument_section(&name);
            let asset_class = optional_asset_class(config, &section)?.ok_or_else(|| {
                GlidepathError::ConfigMissing {
                    section: section.clone(),
                    key: "asset_class".to_string(),
                }
            })?;
            Ok(InstrumentSpec {
                asset_class,
                ticker: config.get_string(&section, "ticker"),
                annual_rate: config.get_double(&section, "rate", 0.0),
                entry_fee: config.get_double(&section, "entry_fee", 0.0),
                exit_fee: config.get_double(&section, "exit_fee", 0.0),
                source: config.get_string(&section, "source"),
                name,
            })
        })
        .collect()
}

pub fn lookback_years(config: &dyn ConfigPort) -> usize {
    config.get_int("simulation", "lookback_years", DEFAULT_LOOKBACK_YEARS as i64) as usize
}

pub fn build_market(
    config: &dyn ConfigPort,
    data_port: &dyn PriceDataPort,
) -> Result<Market, GlidepathError> {
    let specs = instrument_specs(config)?;
    let loaded = load_universe(data_port, &specs, lookback_years(config))?;
    for skipped in &loaded.skipped {
        tracing::warn!(
            instrument = %skipped.name,
            reason = ?skipped.reason,
            "instrument left out of the universe"
        );
    }

    Ok(Market {
        universe: loaded.instruments,
        reference: Arc::new(build_reference(config)?),
        cash: Arc::new(build_cash(config)?),
    })
}

/// Evaluation dates: the CLI override, then `[simulation] dates`, then
/// every payday of the goal.
pub fn resolve_dates(
    override_dates: Option<&str>,
    config: &dyn ConfigPort,
    goal: &Goal,
) -> Result<Vec<NaiveDate>, GlidepathError> {
    if let Some(raw) = override_dates {
        return parse_date_list(raw).map_err(|reason| GlidepathError::ConfigInvalid {
            section: "cli".to_string(),
            key: "dates".to_string(),
            reason,
        });
    }
    Ok(evaluation_dates(config)?.unwrap_or_else(|| simulation::payday_dates(goal)))
}

pub fn resolve_data_dir(override_dir: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("simulation", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_simulate(
    config_path: &Path,
    dates: Option<&str>,
    data_dir: Option<&Path>,
) -> Result<(), GlidepathError> {
    let config = load_config(config_path)?;
    let mut goal = build_goal(&config)?;
    println!("{goal}");

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &config));
    let market = build_market(&config, &data_port)?;
    let dates = resolve_dates(dates, &config, &goal)?;

    let result = simulation::run(&mut goal, &market, &dates)?;
    print_result(&goal, &result, dates.last().copied())
}

fn print_result(
    goal: &Goal,
    result: &SimulationResult,
    as_of: Option<NaiveDate>,
) -> Result<(), GlidepathError> {
    println!("\n=== Calibration ===");
    for outcome in &result.outcomes {
        let threshold = outcome
            .drawdown_threshold
            .map(|t| format!("{:.2}%", t * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  collected {:>16}  value {:>16}  threshold {:>8}  best {}",
            outcome.date.format("%d %b %Y"),
            to_currency(outcome.collected),
            to_currency(outcome.current_value),
            threshold,
            outcome.best.as_deref().unwrap_or("-"),
        );
        for switch in &outcome.switches {
            println!("    {} -> {} ({})", switch.from, switch.to, to_currency(switch.amount));
        }
        if outcome.de_risked {
            println!("    de-risked into the reference instrument");
        }
    }

    println!("\n=== Positions ===");
    for position in goal.positions().iter().filter(|p| p.is_active()) {
        println!("{position}");
    }

    println!("\n=== Summary ===");
    println!("Current value:    {}", to_currency(result.final_value));
    println!("Realized pnl:     {}", to_currency(result.realized_pnl));
    println!("Switches:         {}", result.switch_count());
    println!("Projected value:  {}", to_currency(result.projected_value));

    if let Some(date) = as_of {
        let (target, minimum) = goal.shortfall(date)?;
        println!("Target shortfall: {}", to_currency(target));
        if let Some(min) = minimum {
            println!("Minimum shortfall: {}", to_currency(min));
        }
    }
    Ok(())
}

fn run_emi(config_path: &Path) -> Result<(), GlidepathError> {
    let config = load_config(config_path)?;
    let goal = build_goal(&config)?;

    println!("{goal}");
    println!("Paydays:          {}", goal.schedule().payday_count());
    println!("EMI:              {}", to_currency(goal.emi()));
    Ok(())
}

fn run_validate(config_path: &Path, data_dir: Option<&Path>) -> Result<(), GlidepathError> {
    let config = load_config(config_path)?;
    let names = instrument_names(&config)?;
    println!("Goal:        {}", required_string(&config, "goal", "name")?);
    println!("Instruments: {}", names.join(", "));

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &config));
    let missing = missing_sources(&data_port, &instrument_specs(&config)?)?;
    if !missing.is_empty() {
        tracing::warn!(sources = ?missing, "price data not found");
        println!("Missing data: {}", missing.join(", "));
    }
    println!("Configuration is valid.");
    Ok(())
}

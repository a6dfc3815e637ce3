//! Integration tests.
//!
//! Tests cover:
//! - Full simulation over every payday of a goal with a mock market
//! - Transactional calibration when a date fails mid-simulation
//! - Risk-budget de-risking into the reference instrument
//! - Universe loading through a mock price data port
//! - Invariant properties of positions, tax and the confidence filter

mod common;

use approx::assert_relative_eq;
use common::*;
use glidepath::domain::asset_class::AssetClass;
use glidepath::domain::emi::EmiSolver;
use glidepath::domain::error::GlidepathError;
use glidepath::domain::goal::Goal;
use glidepath::domain::instrument::Instrument;
use glidepath::domain::policy::RebalancePolicy;
use glidepath::domain::position::Position;
use glidepath::domain::simulation::{self, Market};
use glidepath::domain::universe::{load_universe, missing_sources, InstrumentSpec, SkipReason};
use std::sync::Arc;

fn debt_market() -> Market {
    Market {
        universe: vec![debt("fd", 0.07), debt("liquid", 0.05)],
        reference: debt("rf", 0.06),
        cash: cash(),
    }
}

mod full_simulation {
    use super::*;

    #[test]
    fn simulation_over_every_payday() {
        let params = goal_params("House", date(2021, 1, 1), date(2023, 1, 1), 1_000_000.0);
        let mut goal = make_goal(params);
        let dates = simulation::payday_dates(&goal);
        assert_eq!(dates.len(), 25);

        let result = simulation::run(&mut goal, &debt_market(), &dates).unwrap();

        assert_eq!(result.outcomes.len(), 25);
        assert_relative_eq!(result.total_collected(), 25.0 * goal.emi(), max_relative = 1e-9);
        assert!(result.final_value > 0.0);
        assert!(result.projected_value > 0.0);

        for outcome in &result.outcomes {
            assert_eq!(outcome.best.is_some(), !outcome.eligible.is_empty());
            if outcome.eligible.iter().any(|n| n == "fd") {
                assert_eq!(outcome.best.as_deref(), Some("fd"));
            }
        }
    }

    #[test]
    fn open_positions_are_current_after_run() {
        let mut goal = make_goal(goal_params("Car", date(2021, 1, 1), date(2022, 1, 1), 600_000.0));
        let dates = simulation::payday_dates(&goal);
        let last = *dates.last().unwrap();

        let result = simulation::run(&mut goal, &debt_market(), &dates).unwrap();

        assert!(!result.positions.is_empty());
        for snapshot in &result.positions {
            assert!(snapshot.is_active);
            assert_eq!(snapshot.last_update, last);
            assert!(snapshot.exit_value <= snapshot.current_value);
        }
        let total: f64 = result.positions.iter().map(|p| p.exit_value).sum();
        assert_relative_eq!(total, result.final_value, max_relative = 1e-9);
    }

    #[test]
    fn explicit_dates_are_sorted_and_clipped() {
        let mut goal = make_goal(goal_params("Car", date(2021, 1, 1), date(2022, 1, 1), 600_000.0));
        let dates = vec![date(2021, 3, 1), date(2020, 6, 1), date(2021, 1, 1), date(2021, 3, 1)];

        let result = simulation::run(&mut goal, &debt_market(), &dates).unwrap();

        let seen: Vec<_> = result.outcomes.iter().map(|o| o.date).collect();
        assert_eq!(seen, vec![date(2021, 1, 1), date(2021, 3, 1)]);
    }

    #[test]
    fn failing_date_leaves_goal_untouched() {
        let mut goal = make_goal(goal_params("Car", date(2021, 1, 1), date(2022, 1, 1), 600_000.0));
        let market = Market {
            universe: vec![equity("blank", Vec::new())],
            reference: debt("rf", 0.06),
            cash: cash(),
        };
        let before = goal.clone();

        let err = simulation::run(&mut goal, &market, &[date(2021, 1, 1)]).unwrap_err();

        assert!(matches!(err, GlidepathError::EmptyWindow { instrument, .. } if instrument == "blank"));
        assert_eq!(goal, before);
        assert!(goal.positions().is_empty());
    }
}

mod risk_budget {
    use super::*;

    #[test]
    fn exhausted_budget_moves_everything_into_reference() {
        let params = goal_params("Trip", date(2021, 1, 1), date(2022, 1, 1), 600_000.0);
        let policy = RebalancePolicy::risk_budget(1_000.0, 2).unwrap();
        let mut goal = Goal::new(params, policy, &EmiSolver::default()).unwrap();

        let lossy_cash = Arc::new(
            Instrument::fixed_rate("cash", AssetClass::Cash, 0.0).with_fees(0.0, 5_000.0),
        );
        let market = Market {
            universe: vec![debt("fd", 0.07)],
            reference: debt("rf", 0.06),
            cash: lossy_cash,
        };
        let dates = [date(2021, 1, 1), date(2021, 2, 1)];

        let result = simulation::run(&mut goal, &market, &dates).unwrap();

        assert!(result.outcomes.iter().all(|o| o.de_risked));
        assert!(goal.policy().is_de_risked());
        assert!(goal.positions().iter().all(|p| p.instrument().name == "rf"));
        assert!(result.realized_pnl < 0.0);
    }
}

mod universe_loading {
    use super::*;

    fn spec(name: &str, class: AssetClass) -> InstrumentSpec {
        InstrumentSpec {
            name: name.to_string(),
            asset_class: class,
            ticker: None,
            annual_rate: 0.07,
            entry_fee: 0.0,
            exit_fee: 0.0,
            source: None,
        }
    }

    #[test]
    fn partial_universe_skips_unusable_series() {
        let port = MockPriceDataPort::new()
            .with_points("nifty", generate_points(date(2020, 1, 1), 30, 100.0, 1.001))
            .with_points("tiny", generate_points(date(2020, 1, 1), 1, 100.0, 1.0))
            .with_error("broken", "connection refused");

        let specs = vec![
            spec("nifty", AssetClass::Equity),
            spec("gilt", AssetClass::Debt),
            spec("tiny", AssetClass::Equity),
            spec("broken", AssetClass::Equity),
        ];

        let loaded = load_universe(&port, &specs, 10).unwrap();

        let names: Vec<_> = loaded.instruments.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["nifty", "gilt"]);
        assert_eq!(loaded.skipped.len(), 2);
        assert_eq!(loaded.skipped[0].reason, SkipReason::InsufficientPoints { points: 1 });
        assert_eq!(loaded.skipped[1].reason, SkipReason::NoData);
    }

    #[test]
    fn equity_source_overrides_name() {
        let port = MockPriceDataPort::new()
            .with_points("NSEI.csv", generate_points(date(2020, 1, 1), 10, 100.0, 1.01));
        let mut nifty = spec("nifty", AssetClass::Equity);
        nifty.source = Some("NSEI.csv".to_string());
        nifty.exit_fee = 20.0;

        let loaded = load_universe(&port, &[nifty], 5).unwrap();

        let instrument = &loaded.instruments[0];
        assert_eq!(instrument.history().len(), 10);
        assert_eq!(instrument.exit_fee, 20.0);
        assert_eq!(instrument.lookback_years, 5);
    }

    #[test]
    fn nothing_loaded_is_an_error() {
        let port = MockPriceDataPort::new();
        let err = load_universe(&port, &[spec("nifty", AssetClass::Equity)], 10).unwrap_err();
        assert!(matches!(err, GlidepathError::Data { .. }));
    }

    #[test]
    fn zero_close_series_is_skipped() {
        let mut points = generate_points(date(2020, 1, 1), 10, 100.0, 1.01);
        points[4].close = 0.0;
        let port = MockPriceDataPort::new()
            .with_points("halted", points)
            .with_points("nifty", generate_points(date(2020, 1, 1), 10, 100.0, 1.01));

        let specs = vec![
            spec("halted", AssetClass::Equity),
            spec("nifty", AssetClass::Equity),
        ];
        let loaded = load_universe(&port, &specs, 10).unwrap();

        assert_eq!(loaded.instruments.len(), 1);
        assert_eq!(loaded.skipped[0].name, "halted");
        assert_eq!(loaded.skipped[0].reason, SkipReason::NoData);
    }

    #[test]
    fn missing_sources_checks_equities_only() {
        let port = MockPriceDataPort::new()
            .with_points("nifty", generate_points(date(2020, 1, 1), 10, 100.0, 1.01));
        let mut sensex = spec("sensex", AssetClass::Equity);
        sensex.source = Some("BSESN.csv".to_string());
        let specs = vec![
            spec("nifty", AssetClass::Equity),
            sensex,
            spec("gilt", AssetClass::Debt),
        ];

        assert_eq!(missing_sources(&port, &specs).unwrap(), vec!["BSESN.csv"]);
        assert!(missing_sources(&port, &specs[2..]).unwrap().is_empty());
    }
}

mod equity_valuation {
    use super::*;

    #[test]
    fn rising_series_marks_position_up() {
        let nifty = equity("nifty", generate_points(date(2020, 1, 1), 400, 100.0, 1.001));
        let mut position = Position::open(Arc::clone(&nifty), date(2020, 1, 1), 10_000.0).unwrap();

        position.update(date(2020, 12, 31)).unwrap();

        let expected = 10_000.0 * 1.001f64.powi(365);
        assert_relative_eq!(position.current_value(), expected, max_relative = 1e-9);
        assert!(position.tax_liability() > 0.0);
        assert!(position.exit_value() < position.current_value());
    }

    #[test]
    fn zigzag_fall_probability_bounds() {
        let zig = equity("zig", generate_zigzag(date(2020, 1, 1), 201, 100.0, 0.02, 0.01));
        let as_of = date(2020, 7, 19);

        let p_low = zig.fall_probability(-0.05, as_of).unwrap();
        let p_high = zig.fall_probability(0.05, as_of).unwrap();

        assert!((0.0..=1.0).contains(&p_low));
        assert!(p_low < p_high);
        assert_relative_eq!(p_high, 1.0, epsilon = 1e-6);
    }
}

mod properties {
    use super::*;
    use glidepath::domain::goal::GoalParams;
    use proptest::prelude::*;

    fn params(confidence: f64) -> GoalParams {
        let mut p = goal_params("Prop", date(2020, 1, 1), date(2023, 1, 1), 1_000_000.0);
        p.confidence = confidence;
        p
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn exit_value_never_exceeds_current(
            rate in 0.0f64..0.2,
            days in 1i64..2_000,
            amount in 1_000.0f64..10_000_000.0,
            fee in 0.0f64..500.0,
        ) {
            let fd = Instrument::fixed_rate("fd", AssetClass::Debt, rate).with_fees(0.0, fee);
            let fd = Arc::new(fd);
            let start = date(2020, 1, 1);
            let mut position = Position::open(fd, start, amount).unwrap();
            position.update(start + chrono::Duration::days(days)).unwrap();

            prop_assert!(position.exit_value() <= position.current_value());
            prop_assert!(position.tax_liability() >= 0.0);
        }

        #[test]
        fn debt_value_strictly_increases(
            rate in 0.001f64..0.2,
            first in 1i64..1_000,
            gap in 1i64..1_000,
        ) {
            let start = date(2020, 1, 1);
            let mut position = Position::open(debt("fd", rate), start, 100_000.0).unwrap();

            position.update(start + chrono::Duration::days(first)).unwrap();
            let earlier = position.current_value();
            position.update(start + chrono::Duration::days(first + gap)).unwrap();

            prop_assert!(position.current_value() > earlier);
        }

        #[test]
        fn withdrawal_never_pays_out_more_than_exit_value(
            rate in 0.0f64..0.2,
            days in 1i64..2_000,
            fee in 0.0f64..500.0,
            share in 0.0f64..1.0,
        ) {
            let fd = Instrument::fixed_rate("fd", AssetClass::Debt, rate).with_fees(0.0, fee);
            let fd = Arc::new(fd);
            let start = date(2020, 1, 1);
            let today = start + chrono::Duration::days(days);
            let mut position = Position::open(fd, start, 100_000.0).unwrap();
            position.update(today).unwrap();
            let exit = position.exit_value();

            let taken = position.withdraw(today, exit * share).unwrap();
            position.update(today).unwrap();
            prop_assert!((position.exit_value() - (exit - taken)).abs() < 1e-6);

            let rest = position.withdraw_full(today).unwrap();
            prop_assert!(taken + rest <= exit + 1e-6);
        }

        #[test]
        fn tax_is_never_negative(
            pnl in -1_000_000.0f64..1_000_000.0,
            years in 0.0f64..10.0,
        ) {
            for class in [AssetClass::Equity, AssetClass::Debt, AssetClass::Cash] {
                prop_assert!(class.tax_rule().liability(pnl, years) >= 0.0);
            }
        }

        #[test]
        fn withdrawal_above_exit_value_is_rejected(
            amount in 1_000.0f64..1_000_000.0,
            excess in 0.01f64..1_000.0,
        ) {
            let start = date(2020, 1, 1);
            let mut position = Position::open(cash(), start, amount).unwrap();
            let err = position.withdraw(start, amount + excess).unwrap_err();

            let rejected = matches!(err, GlidepathError::InsufficientFunds { .. });
            prop_assert!(rejected);
            prop_assert_eq!(position.current_value(), amount);
        }

        #[test]
        fn filter_only_keeps_confident_instruments(
            rates in proptest::collection::vec(-0.05f64..0.3, 1..6),
            confidence in 0.8f64..0.99,
            capital in 1_000.0f64..2_000_000.0,
        ) {
            let mut goal = make_goal(params(confidence));
            goal.invest(date(2020, 1, 1), &cash(), capital).unwrap();

            let universe: Vec<_> = rates
                .iter()
                .enumerate()
                .map(|(i, r)| debt(&format!("d{i}"), *r))
                .collect();
            let reference = debt("rf", 0.06);
            let as_of = date(2020, 1, 1);

            let eligible = goal.filter_instruments(as_of, &universe, &reference).unwrap();
            let r_min = goal.drawdown_threshold(as_of, &reference).unwrap().unwrap();

            for instrument in &eligible {
                let p = instrument.fall_probability(r_min, as_of).unwrap();
                prop_assert!(p < 1.0 - confidence);
            }
        }
    }
}

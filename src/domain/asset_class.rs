//! Asset class tag and its per-class behaviour table.

use std::fmt;
use std::str::FromStr;

use super::tax::TaxRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Equity,
    Debt,
    Cash,
}

/// How a position in a given asset class is revalued on `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    /// units × price as of the valuation date
    MarkToMarket,
    /// entry value compounded daily at the instrument's daily-equivalent rate
    DailyCompounding,
    /// value held unchanged
    Static,
}

/// Where an instrument's expected daily return comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnSource {
    /// mean of the trailing daily-change window
    HistoricalMean,
    /// daily equivalent of the annual nominal rate
    NominalRate,
}

struct Behaviour {
    valuation: Valuation,
    returns: ReturnSource,
    tax: TaxRule,
}

const EQUITY: Behaviour = Behaviour {
    valuation: Valuation::MarkToMarket,
    returns: ReturnSource::HistoricalMean,
    tax: TaxRule {
        long_term_years: 1,
        short_term_rate: 0.15,
        long_term_rate: 0.10,
    },
};

const DEBT: Behaviour = Behaviour {
    valuation: Valuation::DailyCompounding,
    returns: ReturnSource::NominalRate,
    tax: TaxRule {
        long_term_years: 3,
        short_term_rate: 0.30,
        long_term_rate: 0.20,
    },
};

const CASH: Behaviour = Behaviour {
    valuation: Valuation::Static,
    returns: ReturnSource::NominalRate,
    tax: DEBT.tax,
};

impl AssetClass {
    fn behaviour(self) -> &'static Behaviour {
        match self {
            AssetClass::Equity => &EQUITY,
            AssetClass::Debt => &DEBT,
            AssetClass::Cash => &CASH,
        }
    }

    pub fn valuation(self) -> Valuation {
        self.behaviour().valuation
    }

    pub fn return_source(self) -> ReturnSource {
        self.behaviour().returns
    }

    pub fn tax_rule(self) -> TaxRule {
        self.behaviour().tax
    }

    /// Equity is the only class priced from a historical series.
    pub fn uses_price_series(self) -> bool {
        self.return_source() == ReturnSource::HistoricalMean
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Equity => "equity",
            AssetClass::Debt => "debt",
            AssetClass::Cash => "cash",
        };
        f.write_str(s)
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equity" => Ok(AssetClass::Equity),
            "debt" => Ok(AssetClass::Debt),
            "cash" => Ok(AssetClass::Cash),
            other => Err(format!("unknown asset class '{other}' (expected equity, debt or cash)")),
        }
    }
}

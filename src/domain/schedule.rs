//! Daily cash-flow schedule from inception to maturity (inclusive).

use chrono::{Datelike, NaiveDate};

use super::returns::npv;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlowRow {
    pub date: NaiveDate,
    pub downpayment: f64,
    pub emi: f64,
    pub spend: f64,
}

impl CashFlowRow {
    pub fn inflow(&self) -> f64 {
        self.downpayment + self.emi
    }

    pub fn net(&self) -> f64 {
        self.downpayment + self.emi - self.spend
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashFlowSchedule {
    rows: Vec<CashFlowRow>,
    payday: u32,
}

impl CashFlowSchedule {
    /// One row per calendar day with the downpayment on the first day and
    /// `maturity_value` spent on the last.
    pub fn new(
        inception_date: NaiveDate,
        maturity_date: NaiveDate,
        downpayment: f64,
        maturity_value: f64,
        payday: u32,
    ) -> Self {
        let rows = inception_date
            .iter_days()
            .take_while(|d| *d <= maturity_date)
            .map(|date| CashFlowRow {
                date,
                downpayment: if date == inception_date { downpayment } else { 0.0 },
                emi: 0.0,
                spend: if date == maturity_date { maturity_value } else { 0.0 },
            })
            .collect();
        Self { rows, payday }
    }

    pub fn rows(&self) -> &[CashFlowRow] {
        &self.rows
    }

    pub fn payday(&self) -> u32 {
        self.payday
    }

    pub fn row(&self, date: NaiveDate) -> Option<&CashFlowRow> {
        let first = self.rows.first()?.date;
        let offset = (date - first).num_days();
        if offset < 0 {
            return None;
        }
        self.rows.get(offset as usize)
    }

    pub fn is_payday(&self, date: NaiveDate) -> bool {
        date.day() == self.payday
    }

    pub fn payday_count(&self) -> usize {
        self.rows.iter().filter(|r| self.is_payday(r.date)).count()
    }

    pub fn paydays(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows
            .iter()
            .map(|r| r.date)
            .filter(move |d| self.is_payday(*d))
    }

    /// Sets `emi` on every payday on or after `from`.
    pub fn set_emi_from(&mut self, from: NaiveDate, emi: f64) {
        let payday = self.payday;
        for row in self.rows.iter_mut().filter(|r| r.date >= from) {
            if row.date.day() == payday {
                row.emi = emi;
            }
        }
    }

    pub fn npv(&self, rate: f64) -> f64 {
        npv(rate, self.rows.iter().map(CashFlowRow::net))
    }

    /// Present value, as of `date`, of what the goal still owes net of the
    /// contributions still to come. Inflows on `date` are excluded since they
    /// have already been collected.
    pub fn outstanding_obligation(&self, date: NaiveDate, rate: f64) -> f64 {
        let flows = self
            .rows
            .iter()
            .filter(|r| r.date >= date)
            .map(|r| if r.date == date { -r.spend } else { r.net() });
        -npv(rate, flows)
    }
}

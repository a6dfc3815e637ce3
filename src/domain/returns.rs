//! Rate conversion and discounting helpers.

/// Convert a rate quoted over `this_period` periods to one over `n` periods:
/// (1 + r)^(n / this_period) - 1
pub fn convert_rate(rate: f64, n: f64, this_period: f64) -> f64 {
    (1.0 + rate).powf(n / this_period) - 1.0
}

/// Daily-equivalent of an annual nominal rate over a 365-day year.
pub fn daily_rate(annual: f64) -> f64 {
    convert_rate(annual, 1.0, 365.0)
}

/// Net present value of `values`, the first discounted at t = 0.
pub fn npv(rate: f64, values: impl IntoIterator<Item = f64>) -> f64 {
    let growth = 1.0 + rate;
    let mut discount = 1.0;
    let mut total = 0.0;
    for value in values {
        total += value / discount;
        discount *= growth;
    }
    total
}

/// Level payment, paid at the start of each period, that grows `pv` into
/// `target` over `periods` periods at `rate`.
pub fn annuity_due_payment(rate: f64, periods: f64, pv: f64, target: f64) -> f64 {
    if periods <= 0.0 {
        return target - pv;
    }
    if rate == 0.0 {
        return (target - pv) / periods;
    }
    let growth = (1.0 + rate).powf(periods);
    (target - pv * growth) * rate / ((1.0 + rate) * (growth - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_rate_compounds_back_to_annual() {
        let d = daily_rate(0.06);
        let annual = (1.0 + d).powi(365) - 1.0;
        assert!((annual - 0.06).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_converts_to_zero() {
        assert_eq!(daily_rate(0.0), 0.0);
    }

    #[test]
    fn npv_first_value_undiscounted() {
        // 100 + 110 / 1.1 = 200
        let v = npv(0.1, [100.0, 110.0]);
        assert!((v - 200.0).abs() < 1e-9);
    }

    #[test]
    fn npv_empty_is_zero() {
        assert_eq!(npv(0.05, std::iter::empty()), 0.0);
    }

    #[test]
    fn annuity_due_zero_rate_is_linear() {
        let p = annuity_due_payment(0.0, 12.0, 0.0, 1200.0);
        assert!((p - 100.0).abs() < 1e-9);
    }

    #[test]
    fn annuity_due_accumulates_to_target() {
        let rate = 0.01;
        let n = 12.0;
        let p = annuity_due_payment(rate, n, 0.0, 10_000.0);
        let fv: f64 = (1..=12).map(|k| p * (1.0_f64 + rate).powi(k)).sum();
        assert!((fv - 10_000.0).abs() < 1e-6);
    }
}

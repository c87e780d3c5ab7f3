use super::round2;
use crate::assessment::MortgageProjection;

/// Project the monthly repayment for a capital-repayment mortgage at the
/// central bank rate.
///
/// Standard annuity formula: `P·r(1+r)^n / ((1+r)^n − 1)` with a monthly
/// rate `r` and `n` monthly payments; a zero rate degenerates to straight
/// division.
pub fn project_mortgage(
    price: f64,
    deposit_percent: f64,
    term_years: u32,
    annual_rate_pct: f64,
) -> MortgageProjection {
    let deposit = price * (deposit_percent / 100.0);
    let principal = (price - deposit).max(0.0);

    let monthly_rate = annual_rate_pct / 100.0 / 12.0;
    let num_payments = (term_years * 12).max(1) as f64;

    let monthly_payment = if monthly_rate == 0.0 {
        principal / num_payments
    } else {
        let growth = (1.0 + monthly_rate).powf(num_payments);
        principal * (monthly_rate * growth) / (growth - 1.0)
    };

    let total_repaid = monthly_payment * num_payments;

    MortgageProjection {
        principal: round2(principal),
        deposit: round2(deposit),
        annual_rate_pct,
        term_years,
        monthly_payment: round2(monthly_payment),
        total_repaid: round2(total_repaid),
        total_interest: round2(total_repaid - principal),
    }
}

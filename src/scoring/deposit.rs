use super::round2;
use crate::assessment::{BankRate, DepositProjection};

/// Annual rent at or above this figure lifts the tenancy deposit cap from
/// five to six weeks' rent (Tenant Fees Act 2019)
const SIX_WEEK_CAP_ANNUAL_RENT: f64 = 50_000.0;

/// Cap the tenancy deposit and project its growth at the central bank rate.
///
/// The cap itself is pure arithmetic on the rent. The growth projection
/// needs the live rate, so it stays `None` when the rates source failed.
pub fn project_deposit(
    monthly_rent: f64,
    horizon_years: u32,
    bank_rate: Option<&BankRate>,
) -> DepositProjection {
    let annual_rent = monthly_rent * 12.0;
    let weekly_rent = annual_rent / 52.0;

    let cap_weeks = if annual_rent < SIX_WEEK_CAP_ANNUAL_RENT {
        5.0
    } else {
        6.0
    };
    let deposit_cap = round2(weekly_rent * cap_weeks);

    let (annual_rate_pct, projected_value, interest_earned) = match bank_rate {
        Some(rate) => {
            let growth = (1.0 + rate.rate_pct / 100.0).powi(horizon_years as i32);
            let projected = round2(deposit_cap * growth);
            (
                Some(rate.rate_pct),
                Some(projected),
                Some(round2(projected - deposit_cap)),
            )
        }
        None => (None, None, None),
    };

    DepositProjection {
        weekly_rent: round2(weekly_rent),
        cap_weeks,
        deposit_cap,
        annual_rate_pct,
        horizon_years,
        projected_value,
        interest_earned,
    }
}

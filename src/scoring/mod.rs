// Deterministic estimators applied to aggregated property data.
//
// Everything here is pure arithmetic over the merged assessment: no network
// access, no randomness. Rate-dependent projections are simply omitted when
// the rates source failed, never computed from a silent default.

mod deposit;
mod maintenance;
mod mortgage;
mod stamp_duty;

pub use deposit::project_deposit;
pub use maintenance::estimate_maintenance;
pub use mortgage::project_mortgage;
pub use stamp_duty::calculate_stamp_duty;

use crate::assessment::{PropertyAssessment, TaxRules};

/// Round to two decimal places, the precision everything monetary is
/// reported at.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fill in the computed fields of a merged assessment.
pub fn score(assessment: &mut PropertyAssessment) {
    let query = assessment.query.clone();

    // Scraped rules when the tax source succeeded, built-in schedule
    // otherwise; the breakdown records which was used
    let rules = assessment
        .tax_rules
        .clone()
        .unwrap_or_else(TaxRules::built_in);

    if let Some(price) = query.price {
        assessment.stamp_duty = Some(calculate_stamp_duty(
            price,
            &rules,
            query.first_time_buyer,
            query.additional_property,
        ));

        if let Some(bank_rate) = &assessment.bank_rate {
            assessment.mortgage = Some(project_mortgage(
                price,
                query.deposit_percent,
                query.mortgage_years,
                bank_rate.rate_pct,
            ));
        }

        assessment.maintenance = Some(estimate_maintenance(
            price,
            assessment.floorplan.as_ref(),
        ));
    }

    if let Some(monthly_rent) = query.monthly_rent {
        assessment.deposit = Some(project_deposit(
            monthly_rent,
            query.projection_years,
            assessment.bank_rate.as_ref(),
        ));
    }
}

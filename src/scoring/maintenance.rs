use super::round2;
use crate::assessment::{FloorplanMeasurement, MaintenanceEstimate};

/// Annual reserve as a fraction of purchase price (the "one percent rule")
const PRICE_FRACTION: f64 = 0.01;

/// Annual upkeep per square metre of floor area, in GBP
const PER_SQM_ANNUAL: f64 = 55.0;

/// Estimate an annual maintenance reserve for the property.
///
/// With no floor area the estimate is the plain one-percent rule. When a
/// floorplan measurement is available the per-area figure is averaged in,
/// which tempers the price-only estimate in expensive areas where price
/// says little about fabric upkeep.
pub fn estimate_maintenance(
    price: f64,
    floorplan: Option<&FloorplanMeasurement>,
) -> MaintenanceEstimate {
    let price_based = price * PRICE_FRACTION;

    let (annual, basis) = match floorplan {
        Some(plan) if plan.total_area_sqm > 0.0 => {
            let area_based = plan.total_area_sqm * PER_SQM_ANNUAL;
            (
                (price_based + area_based) / 2.0,
                format!(
                    "blend of 1% of price and £{:.0}/sqm over {:.1} sqm",
                    PER_SQM_ANNUAL, plan.total_area_sqm
                ),
            )
        }
        _ => (price_based, "1% of purchase price".to_string()),
    };

    MaintenanceEstimate {
        annual: round2(annual),
        monthly: round2(annual / 12.0),
        basis,
    }
}

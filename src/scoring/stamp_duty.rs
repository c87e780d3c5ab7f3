use super::round2;
use crate::assessment::{BandCharge, StampDuty, TaxBand, TaxRules};

/// Calculate Stamp Duty Land Tax for a residential purchase in England or
/// Northern Ireland.
///
/// First-time-buyer relief replaces the standard schedule with the nil-rate
/// and relief bands, and only applies up to the relief ceiling. The
/// additional-property surcharge is added to every band's rate.
pub fn calculate_stamp_duty(
    price: f64,
    rules: &TaxRules,
    first_time_buyer: bool,
    additional_property: bool,
) -> StampDuty {
    let relief_applies = first_time_buyer
        && !additional_property
        && price <= rules.ftb_relief_ceiling as f64;

    let schedule: Vec<TaxBand> = if relief_applies {
        vec![
            TaxBand {
                upper: Some(rules.ftb_nil_rate_threshold),
                rate: 0.0,
            },
            TaxBand {
                upper: Some(rules.ftb_relief_ceiling),
                rate: rules.ftb_rate,
            },
        ]
    } else {
        rules.bands.clone()
    };

    let surcharge = if additional_property {
        rules.additional_surcharge
    } else {
        0.0
    };

    let mut bands = Vec::new();
    let mut total = 0.0;
    let mut lower = 0.0_f64;

    for band in &schedule {
        let upper = band.upper.map(|u| u as f64).unwrap_or(f64::INFINITY);
        let taxable = (price.min(upper) - lower).max(0.0);
        let rate = band.rate + surcharge;
        let charge = round2(taxable * rate);

        if taxable > 0.0 {
            bands.push(BandCharge {
                from: lower as u64,
                to: band.upper,
                rate,
                taxable: round2(taxable),
                charge,
            });
            total += charge;
        }

        if upper.is_infinite() || price <= upper {
            break;
        }
        lower = upper;
    }

    let total = round2(total);
    let effective_rate = if price > 0.0 { total / price } else { 0.0 };

    StampDuty {
        price,
        total,
        effective_rate,
        bands,
        first_time_buyer_relief: relief_applies,
        surcharge_applied: additional_property,
        rules_source: rules.source.clone(),
    }
}

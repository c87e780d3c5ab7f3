/// Implements the assessment output formatters
use colored::*;
use std::fmt;

use crate::assessment::PropertyAssessment;

/// Formatter trait for converting an assessment to an output representation
pub trait Formatter: fmt::Debug + Send + Sync {
    /// Format one assessment.
    ///
    /// The is_last parameter indicates whether this is the last item in a
    /// sequence, which matters for formats like JSON
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String;

    /// Create a boxed clone of this formatter
    fn clone_box(&self) -> Box<dyn Formatter>;
}

impl Clone for Box<dyn Formatter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Human-readable sectioned report, one block per property
#[derive(Debug, Clone)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        PlainFormatter
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for PlainFormatter {
    fn format(&self, assessment: &PropertyAssessment, _is_last: bool) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}\n",
            format!("━━ {} ", assessment.query.address).bold()
        ));

        if let Some(location) = &assessment.location {
            let mut parts = Vec::new();
            if let Some(district) = &location.admin_district {
                parts.push(district.clone());
            }
            if let Some(region) = &location.region {
                parts.push(region.clone());
            }
            let place = if parts.is_empty() {
                String::new()
            } else {
                format!("{} · ", parts.join(", "))
            };
            out.push_str(&format!(
                "Location     {}{} ({:.4}, {:.4})\n",
                place,
                location.postcode.as_deref().unwrap_or("?"),
                location.latitude,
                location.longitude
            ));
        }

        if let Some(crime) = &assessment.crime {
            let top = crime
                .top_categories(3)
                .into_iter()
                .map(|(category, count)| format!("{} ({})", category, count))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "Crime        {} incidents{}{}\n",
                crime.total,
                crime
                    .month
                    .as_deref()
                    .map(|m| format!(" in {}", m))
                    .unwrap_or_default(),
                if top.is_empty() {
                    String::new()
                } else {
                    format!(" · top: {}", top)
                }
            ));
        }

        if let Some(amenities) = &assessment.amenities {
            let mut counts: Vec<(String, usize)> =
                amenities.count_by_category().into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let categories = counts
                .iter()
                .take(4)
                .map(|(category, count)| format!("{} {}", category, count))
                .collect::<Vec<_>>()
                .join(", ");
            let nearest = amenities
                .nearest()
                .map(|a| format!(" · nearest: {} ({}, {:.0}m)", a.name, a.category, a.distance_m))
                .unwrap_or_default();
            out.push_str(&format!(
                "Amenities    {} within {}m{}{}\n",
                amenities.amenities.len(),
                amenities.radius_m,
                if categories.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", categories)
                },
                nearest
            ));
        }

        if let Some(agency) = &assessment.agency {
            let rating = match (agency.rating, agency.review_count) {
                (Some(rating), Some(count)) => format!(" · {:.1}★ ({} reviews)", rating, count),
                (Some(rating), None) => format!(" · {:.1}★", rating),
                _ => " · no rating data".to_string(),
            };
            out.push_str(&format!("Agency       {}{}\n", agency.name, rating));
        }

        if let Some(rate) = &assessment.bank_rate {
            out.push_str(&format!(
                "Bank rate    {:.2}% ({})\n",
                rate.rate_pct, rate.central_bank
            ));
        }

        if let Some(duty) = &assessment.stamp_duty {
            out.push_str(&format!(
                "Stamp duty   £{:.2} on £{:.0} (effective {:.1}%) [{}]\n",
                duty.total,
                duty.price,
                duty.effective_rate * 100.0,
                duty.rules_source
            ));
            for band in &duty.bands {
                let to = band
                    .to
                    .map(|v| format!("£{}", group_thousands(v)))
                    .unwrap_or_else(|| "∞".to_string());
                out.push_str(&format!(
                    "             £{}–{} @ {:.0}% → £{:.2}\n",
                    group_thousands(band.from),
                    to,
                    band.rate * 100.0,
                    band.charge
                ));
            }
        }

        if let Some(mortgage) = &assessment.mortgage {
            out.push_str(&format!(
                "Mortgage     £{:.0} over {}y @ {:.2}% → £{:.2}/month (interest £{:.2})\n",
                mortgage.principal,
                mortgage.term_years,
                mortgage.annual_rate_pct,
                mortgage.monthly_payment,
                mortgage.total_interest
            ));
        }

        if let Some(deposit) = &assessment.deposit {
            let projection = match (deposit.projected_value, deposit.annual_rate_pct) {
                (Some(value), Some(rate)) => format!(
                    " → £{:.2} after {}y @ {:.2}%",
                    value, deposit.horizon_years, rate
                ),
                _ => " (no rate available for projection)".to_string(),
            };
            out.push_str(&format!(
                "Deposit      cap {} weeks (£{:.2}){}\n",
                deposit.cap_weeks, deposit.deposit_cap, projection
            ));
        }

        if let Some(maintenance) = &assessment.maintenance {
            out.push_str(&format!(
                "Maintenance  £{:.2}/year (£{:.2}/month) · {}\n",
                maintenance.annual, maintenance.monthly, maintenance.basis
            ));
        }

        if let Some(floorplan) = &assessment.floorplan {
            out.push_str(&format!(
                "Floor area   {:.1} sqm across {} rooms\n",
                floorplan.total_area_sqm,
                floorplan.rooms.len()
            ));
        }

        let used = if assessment.sources_used.is_empty() {
            "none".to_string()
        } else {
            assessment.sources_used.join(", ")
        };
        out.push_str(&format!("Sources      ok: {}", used.green()));

        if !assessment.sources_failed.is_empty() {
            let failed = assessment
                .sources_failed
                .iter()
                .map(|f| format!("{} ({})", f.source, f.error))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(" · failed: {}", failed.red()));
        }
        out.push('\n');

        out
    }

    fn clone_box(&self) -> Box<dyn Formatter> {
        Box::new(self.clone())
    }
}

/// JSON formatter that emits one serialized assessment per element
#[derive(Debug, Clone)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        JsonFormatter
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String {
        let json = serde_json::to_string(assessment)
            .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));

        if is_last {
            format!("{}\n", json)
        } else {
            format!("{},", json)
        }
    }

    fn clone_box(&self) -> Box<dyn Formatter> {
        Box::new(self.clone())
    }
}

/// CSV formatter with one summary row per assessment
#[derive(Debug, Clone)]
pub struct CsvFormatter;

pub const CSV_HEADER: &str = "address,postcode,latitude,longitude,crime_total,amenity_count,\
agency_rating,bank_rate_pct,stamp_duty,monthly_payment,deposit_cap,maintenance_annual,\
sources_failed\n";

impl CsvFormatter {
    pub fn new() -> Self {
        CsvFormatter
    }
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for CsvFormatter {
    fn format(&self, assessment: &PropertyAssessment, _is_last: bool) -> String {
        let opt_f64 = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

        let failed = assessment
            .sources_failed
            .iter()
            .map(|f| f.source.clone())
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "\"{}\",{},{},{},{},{},{},{},{},{},{},{},{}\n",
            assessment.query.address.replace('"', "\"\""),
            assessment
                .location
                .as_ref()
                .and_then(|l| l.postcode.clone())
                .unwrap_or_default(),
            opt_f64(assessment.location.as_ref().map(|l| l.latitude)),
            opt_f64(assessment.location.as_ref().map(|l| l.longitude)),
            assessment
                .crime
                .as_ref()
                .map(|c| c.total.to_string())
                .unwrap_or_default(),
            assessment
                .amenities
                .as_ref()
                .map(|a| a.amenities.len().to_string())
                .unwrap_or_default(),
            opt_f64(assessment.agency.as_ref().and_then(|a| a.rating)),
            opt_f64(assessment.bank_rate.as_ref().map(|r| r.rate_pct)),
            opt_f64(assessment.stamp_duty.as_ref().map(|d| d.total)),
            opt_f64(assessment.mortgage.as_ref().map(|m| m.monthly_payment)),
            opt_f64(assessment.deposit.as_ref().map(|d| d.deposit_cap)),
            opt_f64(assessment.maintenance.as_ref().map(|m| m.annual)),
            failed
        )
    }

    fn clone_box(&self) -> Box<dyn Formatter> {
        Box::new(self.clone())
    }
}

/// Group a number with commas: 1500000 → "1,500,000"
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{
        BankRate, FailedSource, PropertyQuery, SourcePayload, SourceResult,
    };
    use crate::scoring;

    fn purchase_assessment() -> PropertyAssessment {
        let mut query = PropertyQuery::new("10 Downing Street");
        query.price = Some(450_000.0);

        let results = vec![SourceResult::success(
            "rates",
            SourcePayload::BankRate(BankRate {
                central_bank: "Bank of England".to_string(),
                rate_pct: 4.0,
                last_updated: None,
            }),
        )];

        let mut assessment = PropertyAssessment::from_results(query, results);
        assessment.sources_failed.push(FailedSource {
            source: "agency".to_string(),
            error: "no API key configured".to_string(),
        });
        scoring::score(&mut assessment);
        assessment
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(125_000), "125,000");
        assert_eq!(group_thousands(1_500_000), "1,500,000");
    }

    #[test]
    fn test_plain_formatter_includes_sections() {
        colored::control::set_override(false);
        let formatted = PlainFormatter::new().format(&purchase_assessment(), true);

        assert!(formatted.contains("10 Downing Street"));
        assert!(formatted.contains("Stamp duty"));
        assert!(formatted.contains("Mortgage"));
        assert!(formatted.contains("failed: agency"));
    }

    #[test]
    fn test_plain_formatter_reports_failed_sources() {
        colored::control::set_override(false);
        let formatted = PlainFormatter::new().format(&purchase_assessment(), true);
        assert!(formatted.contains("no API key configured"));
    }

    #[test]
    fn test_json_formatter_separators() {
        let assessment = purchase_assessment();
        let formatter = JsonFormatter::new();

        let mid = formatter.format(&assessment, false);
        assert!(mid.ends_with(','));

        let last = formatter.format(&assessment, true);
        assert!(last.ends_with('\n'));

        // Round-trips as JSON
        let parsed: serde_json::Value =
            serde_json::from_str(last.trim_end_matches('\n')).unwrap();
        assert_eq!(parsed["query"]["address"], "10 Downing Street");
    }

    #[test]
    fn test_csv_formatter_row_shape() {
        let formatted = CsvFormatter::new().format(&purchase_assessment(), true);
        let fields: Vec<&str> = formatted.trim_end().split(',').collect();
        // Quoted address plus twelve data columns
        assert!(fields.len() >= 13);
        assert!(formatted.starts_with("\"10 Downing Street\""));
        assert!(formatted.contains("agency"));
    }

    #[test]
    fn test_csv_formatter_escapes_quotes_in_address() {
        let mut assessment = purchase_assessment();
        assessment.query.address = "The \"Old\" House".to_string();
        let formatted = CsvFormatter::new().format(&assessment, true);
        assert!(formatted.starts_with("\"The \"\"Old\"\" House\""));
    }
}

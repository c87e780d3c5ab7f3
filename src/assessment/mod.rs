use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single property lookup as requested by the user.
///
/// Built once from the CLI arguments (or an MCP tool call) and treated as
/// immutable for the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyQuery {
    /// Free-text address or UK postcode
    pub address: String,

    /// Purchase price in GBP, when assessing a purchase
    pub price: Option<f64>,

    /// Whether the buyer qualifies for first-time-buyer relief
    pub first_time_buyer: bool,

    /// Whether the purchase is of an additional property (surcharge applies)
    pub additional_property: bool,

    /// Monthly rent in GBP, when assessing a tenancy
    pub monthly_rent: Option<f64>,

    /// Deposit as a percentage of the purchase price
    pub deposit_percent: f64,

    /// Mortgage term in years
    pub mortgage_years: u32,

    /// Horizon for deposit growth projections, in years
    pub projection_years: u32,

    /// Search radius for amenities, in metres
    pub radius_m: u32,

    /// Listing floorplan image to send to the measurement service
    pub floorplan_url: Option<String>,
}

impl PropertyQuery {
    pub fn new(address: impl Into<String>) -> Self {
        PropertyQuery {
            address: address.into(),
            price: None,
            first_time_buyer: false,
            additional_property: false,
            monthly_rent: None,
            deposit_percent: 10.0,
            mortgage_years: 25,
            projection_years: 5,
            radius_m: 1000,
            floorplan_url: None,
        }
    }
}

/// Outcome classification for a single source fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Partial,
    Failed,
}

/// One source adapter's normalized output for a query.
///
/// Owned by the aggregator until it is merged into a `PropertyAssessment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: String,
    pub status: SourceStatus,
    pub payload: Option<SourcePayload>,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl SourceResult {
    pub fn success(source: &str, payload: SourcePayload) -> Self {
        SourceResult {
            source: source.to_string(),
            status: SourceStatus::Success,
            payload: Some(payload),
            error: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn failed(source: &str, error: impl ToString) -> Self {
        SourceResult {
            source: source.to_string(),
            status: SourceStatus::Failed,
            payload: None,
            error: Some(error.to_string()),
            fetched_at: Utc::now(),
        }
    }
}

/// Typed payloads, one variant per source adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcePayload {
    Location(Location),
    Crime(CrimeSummary),
    Amenities(AmenitySummary),
    Agency(AgencyReview),
    BankRate(BankRate),
    TaxRules(TaxRules),
    Floorplan(FloorplanMeasurement),
}

/// Geocoded position of the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub postcode: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub admin_district: Option<String>,
    pub ward: Option<String>,
    pub region: Option<String>,
}

/// Street-level crime counts around the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeSummary {
    /// Latest month the data covers, e.g. "2026-06"
    pub month: Option<String>,
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl CrimeSummary {
    /// Categories ordered by count, highest first
    pub fn top_categories(&self, n: usize) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .by_category
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    pub name: String,
    pub category: String,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmenitySummary {
    pub radius_m: u32,
    pub amenities: Vec<Amenity>,
}

impl AmenitySummary {
    pub fn count_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for amenity in &self.amenities {
            *counts.entry(amenity.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn nearest(&self) -> Option<&Amenity> {
        self.amenities
            .iter()
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
    }
}

/// Review summary for the listing agency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyReview {
    pub place_id: String,
    pub name: String,
    pub formatted_address: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
}

/// Central bank base rate used for all interest projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRate {
    pub central_bank: String,
    pub rate_pct: f64,
    pub last_updated: Option<String>,
}

/// One SDLT band. `upper` is the inclusive upper bound of the band in GBP;
/// `None` marks the open-ended top band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBand {
    pub upper: Option<u64>,
    pub rate: f64,
}

/// Stamp duty rules, either scraped from gov.uk or the built-in fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRules {
    pub bands: Vec<TaxBand>,
    pub ftb_nil_rate_threshold: u64,
    pub ftb_relief_ceiling: u64,
    pub ftb_rate: f64,
    pub additional_surcharge: f64,
    /// Where the rules came from: "gov.uk" or "built-in"
    pub source: String,
}

impl TaxRules {
    /// Residential SDLT schedule in force since April 2025, used whenever the
    /// gov.uk scrape is unavailable.
    pub fn built_in() -> Self {
        TaxRules {
            bands: vec![
                TaxBand {
                    upper: Some(125_000),
                    rate: 0.0,
                },
                TaxBand {
                    upper: Some(250_000),
                    rate: 0.02,
                },
                TaxBand {
                    upper: Some(925_000),
                    rate: 0.05,
                },
                TaxBand {
                    upper: Some(1_500_000),
                    rate: 0.10,
                },
                TaxBand {
                    upper: None,
                    rate: 0.12,
                },
            ],
            ftb_nil_rate_threshold: 300_000,
            ftb_relief_ceiling: 500_000,
            ftb_rate: 0.05,
            additional_surcharge: 0.05,
            source: "built-in".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMeasurement {
    pub name: String,
    pub area_sqm: f64,
}

/// Floor areas reported by the external measurement service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorplanMeasurement {
    pub total_area_sqm: f64,
    pub rooms: Vec<RoomMeasurement>,
}

/// A source that did not contribute to the assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSource {
    pub source: String,
    pub error: String,
}

/// Per-band charge line in a stamp duty breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCharge {
    pub from: u64,
    pub to: Option<u64>,
    pub rate: f64,
    pub taxable: f64,
    pub charge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampDuty {
    pub price: f64,
    pub total: f64,
    pub effective_rate: f64,
    pub bands: Vec<BandCharge>,
    pub first_time_buyer_relief: bool,
    pub surcharge_applied: bool,
    /// "gov.uk" or "built-in", carried over from the rules used
    pub rules_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageProjection {
    pub principal: f64,
    pub deposit: f64,
    pub annual_rate_pct: f64,
    pub term_years: u32,
    pub monthly_payment: f64,
    pub total_repaid: f64,
    pub total_interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositProjection {
    pub weekly_rent: f64,
    pub cap_weeks: f64,
    pub deposit_cap: f64,
    /// Present only when the bank rate was available
    pub annual_rate_pct: Option<f64>,
    pub horizon_years: u32,
    pub projected_value: Option<f64>,
    pub interest_earned: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceEstimate {
    pub annual: f64,
    pub monthly: f64,
    pub basis: String,
}

/// The merged, user-visible result of one query.
///
/// Every adapter invocation ends up in either `sources_used` or
/// `sources_failed`, so a partially failed aggregation is never presented as
/// complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyAssessment {
    pub query: PropertyQuery,

    pub location: Option<Location>,
    pub crime: Option<CrimeSummary>,
    pub amenities: Option<AmenitySummary>,
    pub agency: Option<AgencyReview>,
    pub bank_rate: Option<BankRate>,
    pub tax_rules: Option<TaxRules>,
    pub floorplan: Option<FloorplanMeasurement>,

    pub stamp_duty: Option<StampDuty>,
    pub mortgage: Option<MortgageProjection>,
    pub deposit: Option<DepositProjection>,
    pub maintenance: Option<MaintenanceEstimate>,

    pub sources_used: Vec<String>,
    pub sources_failed: Vec<FailedSource>,
    pub generated_at: DateTime<Utc>,
}

impl PropertyAssessment {
    /// Merge a set of per-source results into one assessment.
    ///
    /// Results are consumed in order; a later result for the same source
    /// replaces an earlier one.
    pub fn from_results(query: PropertyQuery, results: Vec<SourceResult>) -> Self {
        let mut assessment = PropertyAssessment {
            query,
            location: None,
            crime: None,
            amenities: None,
            agency: None,
            bank_rate: None,
            tax_rules: None,
            floorplan: None,
            stamp_duty: None,
            mortgage: None,
            deposit: None,
            maintenance: None,
            sources_used: Vec::new(),
            sources_failed: Vec::new(),
            generated_at: Utc::now(),
        };

        for result in results {
            match (&result.status, result.payload) {
                (SourceStatus::Success | SourceStatus::Partial, Some(payload)) => {
                    match payload {
                        SourcePayload::Location(p) => assessment.location = Some(p),
                        SourcePayload::Crime(p) => assessment.crime = Some(p),
                        SourcePayload::Amenities(p) => assessment.amenities = Some(p),
                        SourcePayload::Agency(p) => assessment.agency = Some(p),
                        SourcePayload::BankRate(p) => assessment.bank_rate = Some(p),
                        SourcePayload::TaxRules(p) => assessment.tax_rules = Some(p),
                        SourcePayload::Floorplan(p) => assessment.floorplan = Some(p),
                    }
                    assessment.sources_used.push(result.source);
                }
                _ => {
                    assessment.sources_failed.push(FailedSource {
                        source: result.source,
                        error: result
                            .error
                            .unwrap_or_else(|| "no payload returned".to_string()),
                    });
                }
            }
        }

        assessment
    }

    /// True when every requested source contributed
    pub fn is_complete(&self) -> bool {
        self.sources_failed.is_empty()
    }
}

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::assessment::{Location, PropertyQuery, SourcePayload};
use crate::network::NetworkSettings;

mod agency;
mod amenity;
mod crime;
mod floorplan;
mod postcode;
mod rates;
mod tax;

pub use agency::AgencyProvider;
pub use amenity::AmenityProvider;
pub use crime::CrimeProvider;
pub use floorplan::FloorplanProvider;
pub use postcode::PostcodeProvider;
pub use rates::RatesProvider;
pub use tax::TaxRulesProvider;

/// What one adapter invocation produced.
///
/// `note` marks a partial result: the payload is usable but some fields had
/// to be filled from defaults (e.g. the gov.uk scrape found the rate table
/// but not the first-time-buyer thresholds).
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub payload: SourcePayload,
    pub note: Option<String>,
}

impl FetchOutcome {
    pub fn complete(payload: SourcePayload) -> Self {
        FetchOutcome {
            payload,
            note: None,
        }
    }

    pub fn partial(payload: SourcePayload, note: impl Into<String>) -> Self {
        FetchOutcome {
            payload,
            note: Some(note.into()),
        }
    }
}

/// A source adapter that normalizes one external data source into a
/// `SourcePayload`.
pub trait Provider: Send + Sync {
    fn clone_box(&self) -> Box<dyn Provider>;

    /// Short identifier used in source lists, cache keys, and output
    fn name(&self) -> &'static str;

    /// Whether this adapter can only run once the property is geocoded
    fn needs_location(&self) -> bool {
        false
    }

    /// Whether this adapter's payload is the geocoded location itself
    fn provides_location(&self) -> bool {
        false
    }

    /// Mutable access to the adapter's network settings, so the aggregator
    /// can apply the shared configuration in one place
    fn settings_mut(&mut self) -> &mut NetworkSettings;

    fn fetch<'a>(
        &'a self,
        query: &'a PropertyQuery,
        location: Option<&'a Location>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send + 'a>>;
}

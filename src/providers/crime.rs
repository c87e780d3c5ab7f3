use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::assessment::{CrimeSummary, Location, PropertyQuery, SourcePayload};
use crate::network::client::{get_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;

/// Street-level crime adapter backed by data.police.uk.
///
/// The API returns all recorded incidents within a fixed one-mile radius of
/// the point for the latest available month; the adapter reduces them to
/// per-category counts.
#[derive(Clone)]
pub struct CrimeProvider {
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CrimeRecord {
    category: String,
    month: Option<String>,
}

impl CrimeProvider {
    pub fn new() -> Self {
        CrimeProvider {
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: "https://data.police.uk".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(&mut self, url: String) -> &mut Self {
        self.base_url = url;
        self
    }

    fn api_base(&self) -> &str {
        #[cfg(test)]
        {
            &self.base_url
        }
        #[cfg(not(test))]
        {
            "https://data.police.uk"
        }
    }
}

impl Default for CrimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for CrimeProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "crime"
    }

    fn needs_location(&self) -> bool {
        true
    }

    fn settings_mut(&mut self) -> &mut NetworkSettings {
        &mut self.settings
    }

    fn fetch<'a>(
        &'a self,
        query: &'a PropertyQuery,
        location: Option<&'a Location>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let location = location
                .ok_or_else(|| anyhow!("crime lookup requires a geocoded location"))?;

            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;
            let url = format!(
                "{}/api/crimes-street/all-crime?lat={:.6}&lng={:.6}",
                self.api_base(),
                location.latitude,
                location.longitude
            );

            log::debug!("Fetching street crime for '{}': {}", query.address, url);

            let text = get_with_retry(&client, &url, self.settings.retries).await?;
            let records: Vec<CrimeRecord> =
                serde_json::from_str(&text).context("Unexpected data.police.uk response shape")?;

            let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
            let mut month: Option<String> = None;

            for record in &records {
                *by_category.entry(record.category.clone()).or_insert(0) += 1;
                if let Some(m) = &record.month {
                    // "YYYY-MM" strings order lexicographically
                    if month.as_deref().map_or(true, |current| m.as_str() > current) {
                        month = Some(m.clone());
                    }
                }
            }

            Ok(FetchOutcome::complete(SourcePayload::Crime(CrimeSummary {
                month,
                total: records.len(),
                by_category,
            })))
        })
    }
}

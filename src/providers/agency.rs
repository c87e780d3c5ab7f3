use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::api_key_rotation::ApiKeyRotator;
use crate::assessment::{AgencyReview, Location, PropertyQuery, SourcePayload};
use crate::network::client::{request_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;

/// Agency review adapter backed by the Google Places API.
///
/// Two calls per lookup: a find-place query to resolve the agency name to a
/// place id, then a place-details request for the rating fields.
#[derive(Clone)]
pub struct AgencyProvider {
    keys: ApiKeyRotator,
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<PlaceCandidate>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceCandidate {
    place_id: String,
    name: Option<String>,
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    #[serde(rename = "displayName")]
    display_name: Option<DisplayName>,
    rating: Option<f64>,
    #[serde(rename = "userRatingCount")]
    user_rating_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    text: String,
}

impl AgencyProvider {
    pub fn new_with_keys(keys: Vec<String>) -> Self {
        AgencyProvider {
            keys: ApiKeyRotator::new(keys),
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: String::new(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(&mut self, url: String) -> &mut Self {
        self.base_url = url;
        self
    }

    fn find_place_url(&self) -> String {
        #[cfg(test)]
        {
            format!("{}/maps/api/place/findplacefromtext/json", self.base_url)
        }
        #[cfg(not(test))]
        {
            "https://maps.googleapis.com/maps/api/place/findplacefromtext/json".to_string()
        }
    }

    fn details_url(&self, place_id: &str) -> String {
        #[cfg(test)]
        {
            format!("{}/v1/places/{}", self.base_url, place_id)
        }
        #[cfg(not(test))]
        {
            format!("https://places.googleapis.com/v1/places/{}", place_id)
        }
    }

    /// Pause between the two requests when a rate limit is configured
    async fn respect_rate_limit(&self) {
        if let Some(rate) = self.settings.rate_limit {
            if rate > 0.0 {
                let delay_ms = (1000.0 / rate) as u64;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

impl Provider for AgencyProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "agency"
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
            let key = self
                .keys
                .next_key()
                .ok_or_else(|| anyhow!("no Google Places API key configured"))?;

            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;

            // Searching near the geocoded district narrows down agencies with
            // branches in several towns
            let search_input = match location.and_then(|l| l.admin_district.as_deref()) {
                Some(district) => format!("estate agent {} {}", query.address, district),
                None => format!("estate agent {}", query.address),
            };

            let find_request = client.get(self.find_place_url()).query(&[
                ("input", search_input.as_str()),
                ("inputtype", "textquery"),
                ("fields", "place_id,name,formatted_address,geometry"),
                ("key", key.as_str()),
            ]);

            let text = request_with_retry(find_request, self.settings.retries).await?;
            let response: FindPlaceResponse =
                serde_json::from_str(&text).context("Unexpected find-place response shape")?;

            match response.status.as_str() {
                "OK" => {}
                "ZERO_RESULTS" => {
                    return Err(anyhow!("no agency found for '{}'", search_input));
                }
                status => {
                    return Err(anyhow!(
                        "Google Places error {}: {}",
                        status,
                        response.error_message.unwrap_or_default()
                    ));
                }
            }

            let candidate = response
                .candidates
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no agency found for '{}'", search_input))?;

            self.respect_rate_limit().await;

            let details_key = self.keys.next_key().unwrap_or(key);
            let details_request = client.get(self.details_url(&candidate.place_id)).query(&[
                ("fields", "displayName,rating,userRatingCount"),
                ("key", details_key.as_str()),
            ]);

            let details_text = request_with_retry(details_request, self.settings.retries).await?;
            let details: PlaceDetailsResponse = serde_json::from_str(&details_text)
                .context("Unexpected place-details response shape")?;

            let name = details
                .display_name
                .map(|d| d.text)
                .or(candidate.name)
                .unwrap_or_else(|| "unknown agency".to_string());

            let payload = SourcePayload::Agency(AgencyReview {
                place_id: candidate.place_id,
                name,
                formatted_address: candidate.formatted_address,
                rating: details.rating,
                review_count: details.user_rating_count,
            });

            if details.rating.is_none() {
                Ok(FetchOutcome::partial(
                    payload,
                    "agency found but has no rating data",
                ))
            } else {
                Ok(FetchOutcome::complete(payload))
            }
        })
    }
}

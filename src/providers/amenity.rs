use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::assessment::{Amenity, AmenitySummary, Location, PropertyQuery, SourcePayload};
use crate::network::client::{request_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;
use crate::utils::haversine_m;

/// Amenity search adapter backed by the Overpass API (OpenStreetMap).
///
/// Queries all nodes tagged `amenity` within the configured radius and sorts
/// them by distance from the property.
#[derive(Clone)]
pub struct AmenityProvider {
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
}

impl AmenityProvider {
    pub fn new() -> Self {
        AmenityProvider {
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: "https://overpass-api.de".to_string(),
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
            "https://overpass-api.de"
        }
    }
}

impl Default for AmenityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for AmenityProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "amenity"
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
                .ok_or_else(|| anyhow!("amenity search requires a geocoded location"))?;

            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;
            let url = format!("{}/api/interpreter", self.api_base());

            let overpass_query = format!(
                "[out:json][timeout:25];node(around:{},{:.6},{:.6})[\"amenity\"];out body;",
                query.radius_m, location.latitude, location.longitude
            );

            log::debug!(
                "Searching amenities within {}m of '{}'",
                query.radius_m,
                query.address
            );

            let request = client.post(&url).form(&[("data", overpass_query)]);
            let text = request_with_retry(request, self.settings.retries).await?;
            let response: OverpassResponse =
                serde_json::from_str(&text).context("Unexpected Overpass response shape")?;

            let mut amenities: Vec<Amenity> = Vec::new();
            for element in response.elements {
                let (Some(lat), Some(lon)) = (element.lat, element.lon) else {
                    continue;
                };
                let Some(category) = element.tags.get("amenity") else {
                    continue;
                };

                let name = element
                    .tags
                    .get("name")
                    .cloned()
                    .unwrap_or_else(|| "(unnamed)".to_string());

                amenities.push(Amenity {
                    name,
                    category: category.clone(),
                    distance_m: haversine_m(location.latitude, location.longitude, lat, lon),
                });
            }

            amenities.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

            Ok(FetchOutcome::complete(SourcePayload::Amenities(
                AmenitySummary {
                    radius_m: query.radius_m,
                    amenities,
                },
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_fixture() -> Location {
        Location {
            postcode: Some("SW1A 2AA".to_string()),
            latitude: 51.5034,
            longitude: -0.1276,
            admin_district: None,
            ward: None,
            region: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_sorts_by_distance() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 51.5100, "lon": -0.1276,
                 "tags": {"amenity": "pub", "name": "The Crown"}},
                {"type": "node", "id": 2, "lat": 51.5036, "lon": -0.1276,
                 "tags": {"amenity": "cafe", "name": "Corner Cafe"}},
                {"type": "node", "id": 3, "lat": 51.5060, "lon": -0.1276,
                 "tags": {"amenity": "pharmacy"}}
            ]
        }"#;
        let _m = server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let mut provider = AmenityProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let query = PropertyQuery::new("SW1A 2AA");
        let location = location_fixture();
        let outcome = provider.fetch(&query, Some(&location)).await.unwrap();

        match outcome.payload {
            SourcePayload::Amenities(summary) => {
                assert_eq!(summary.amenities.len(), 3);
                assert_eq!(summary.amenities[0].name, "Corner Cafe");
                assert_eq!(summary.amenities[1].name, "(unnamed)");
                assert_eq!(summary.amenities[1].category, "pharmacy");
                assert_eq!(summary.amenities[2].name, "The Crown");
                assert!(summary.amenities[0].distance_m < summary.amenities[2].distance_m);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_skips_elements_without_coordinates() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "elements": [
                {"type": "node", "id": 1, "tags": {"amenity": "pub", "name": "Ghost"}},
                {"type": "node", "id": 2, "lat": 51.5036, "lon": -0.1276,
                 "tags": {"amenity": "cafe", "name": "Real Cafe"}}
            ]
        }"#;
        let _m = server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let mut provider = AmenityProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let query = PropertyQuery::new("SW1A 2AA");
        let location = location_fixture();
        let outcome = provider.fetch(&query, Some(&location)).await.unwrap();

        match outcome.payload {
            SourcePayload::Amenities(summary) => {
                assert_eq!(summary.amenities.len(), 1);
                assert_eq!(summary.amenities[0].name, "Real Cafe");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_without_location_is_error() {
        let provider = AmenityProvider::new();
        let query = PropertyQuery::new("SW1A 2AA");
        assert!(provider.fetch(&query, None).await.is_err());
    }
}

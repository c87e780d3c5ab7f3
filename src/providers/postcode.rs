use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::assessment::{Location, PropertyQuery, SourcePayload};
use crate::network::client::{get_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;
use crate::utils::normalize_postcode;

/// Geocoding adapter backed by postcodes.io.
///
/// A query that normalizes to a UK postcode uses the exact lookup endpoint;
/// anything else goes through the free-text search and takes the best match.
#[derive(Clone)]
pub struct PostcodeProvider {
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: u16,
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PostcodeRecord {
    postcode: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    admin_district: Option<String>,
    admin_ward: Option<String>,
    region: Option<String>,
}

impl PostcodeProvider {
    pub fn new() -> Self {
        PostcodeProvider {
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: "https://api.postcodes.io".to_string(),
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
            "https://api.postcodes.io"
        }
    }
}

impl Default for PostcodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for PostcodeProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "postcode"
    }

    fn provides_location(&self) -> bool {
        true
    }

    fn settings_mut(&mut self) -> &mut NetworkSettings {
        &mut self.settings
    }

    fn fetch<'a>(
        &'a self,
        query: &'a PropertyQuery,
        _location: Option<&'a Location>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;

            let normalized = normalize_postcode(&query.address);
            let url = match &normalized {
                Some(postcode) => {
                    // Compact form keeps the path free of percent-encoding
                    format!(
                        "{}/postcodes/{}",
                        self.api_base(),
                        postcode.replace(' ', "")
                    )
                }
                None => {
                    let encoded = url::form_urlencoded::byte_serialize(query.address.as_bytes())
                        .collect::<String>();
                    format!("{}/postcodes?q={}&limit=1", self.api_base(), encoded)
                }
            };

            log::debug!("Geocoding '{}' via {}", query.address, url);

            let text = get_with_retry(&client, &url, self.settings.retries).await?;
            let response: LookupResponse =
                serde_json::from_str(&text).context("Unexpected postcodes.io response shape")?;

            if response.status != 200 {
                return Err(anyhow!("postcodes.io returned status {}", response.status));
            }

            let record_value = match response.result {
                Some(serde_json::Value::Array(items)) => items.into_iter().next(),
                Some(value @ serde_json::Value::Object(_)) => Some(value),
                _ => None,
            };

            let record: PostcodeRecord = match record_value {
                Some(value) => serde_json::from_value(value)
                    .context("Unexpected postcodes.io record shape")?,
                None => return Err(anyhow!("No postcode match for '{}'", query.address)),
            };

            let (latitude, longitude) = match (record.latitude, record.longitude) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => {
                    return Err(anyhow!(
                        "Postcode match for '{}' has no coordinates",
                        query.address
                    ))
                }
            };

            let payload = SourcePayload::Location(Location {
                postcode: record.postcode,
                latitude,
                longitude,
                admin_district: record.admin_district,
                ward: record.admin_ward,
                region: record.region,
            });

            // A free-text match is a best guess, not an exact lookup
            if normalized.is_none() {
                Ok(FetchOutcome::partial(
                    payload,
                    "free-text match; supply a postcode for an exact lookup",
                ))
            } else {
                Ok(FetchOutcome::complete(payload))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(address: &str) -> PropertyQuery {
        PropertyQuery::new(address)
    }

    #[test]
    fn test_new_provider_defaults() {
        let provider = PostcodeProvider::new();
        assert_eq!(provider.settings.timeout, 30);
        assert_eq!(provider.settings.retries, 3);
        assert!(provider.provides_location());
        assert!(!provider.needs_location());
    }

    #[tokio::test]
    async fn test_fetch_exact_postcode_lookup() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "status": 200,
            "result": {
                "postcode": "SW1A 2AA",
                "latitude": 51.50354,
                "longitude": -0.127695,
                "admin_district": "Westminster",
                "admin_ward": "St James's",
                "region": "London"
            }
        }"#;
        let _m = server
            .mock("GET", "/postcodes/SW1A2AA")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let mut provider = PostcodeProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let outcome = provider.fetch(&query("sw1a2aa"), None).await.unwrap();
        assert!(outcome.note.is_none());
        match outcome.payload {
            SourcePayload::Location(loc) => {
                assert_eq!(loc.postcode.as_deref(), Some("SW1A 2AA"));
                assert_eq!(loc.admin_district.as_deref(), Some("Westminster"));
                assert!((loc.latitude - 51.50354).abs() < 1e-9);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_free_text_is_partial() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "status": 200,
            "result": [{
                "postcode": "M1 1AE",
                "latitude": 53.4774,
                "longitude": -2.2349,
                "admin_district": "Manchester",
                "admin_ward": "Piccadilly",
                "region": "North West"
            }]
        }"#;
        let _m = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/postcodes\?q=.*&limit=1$".to_string()),
            )
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let mut provider = PostcodeProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let outcome = provider
            .fetch(&query("Piccadilly Gardens, Manchester"), None)
            .await
            .unwrap();
        assert!(outcome.note.is_some());
        match outcome.payload {
            SourcePayload::Location(loc) => {
                assert_eq!(loc.postcode.as_deref(), Some("M1 1AE"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_no_match_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/postcodes\?q=.*&limit=1$".to_string()),
            )
            .with_status(200)
            .with_body(r#"{"status": 200, "result": null}"#)
            .create_async()
            .await;

        let mut provider = PostcodeProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let result = provider.fetch(&query("nowhere at all"), None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No postcode match"));
    }
}

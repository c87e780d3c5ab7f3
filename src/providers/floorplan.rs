use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::assessment::{
    FloorplanMeasurement, Location, PropertyQuery, RoomMeasurement, SourcePayload,
};
use crate::network::client::{request_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;

/// Floorplan measurement adapter.
///
/// Delegates image analysis to an external measurement service; this crate
/// only posts the image reference and normalizes the returned areas. The
/// endpoint is deployment-specific and comes from configuration.
#[derive(Clone)]
pub struct FloorplanProvider {
    endpoint: String,
    settings: NetworkSettings,
}

#[derive(Debug, Serialize)]
struct MeasureRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct MeasureResponse {
    total_area_sqm: f64,
    #[serde(default)]
    rooms: Vec<MeasuredRoom>,
}

#[derive(Debug, Deserialize)]
struct MeasuredRoom {
    name: String,
    area_sqm: f64,
}

impl FloorplanProvider {
    pub fn new(endpoint: String) -> Self {
        FloorplanProvider {
            endpoint,
            settings: NetworkSettings::default(),
        }
    }
}

impl Provider for FloorplanProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "floorplan"
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
            let image_url = query
                .floorplan_url
                .as_deref()
                .ok_or_else(|| anyhow!("no floorplan image supplied for this query"))?;

            if self.endpoint.is_empty() {
                return Err(anyhow!("no floorplan measurement endpoint configured"));
            }

            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;
            let url = format!("{}/measure", self.endpoint.trim_end_matches('/'));

            log::debug!("Measuring floorplan {} via {}", image_url, url);

            let request = client.post(&url).json(&MeasureRequest { image_url });
            let text = request_with_retry(request, self.settings.retries).await?;
            let response: MeasureResponse = serde_json::from_str(&text)
                .context("Unexpected measurement service response shape")?;

            if response.total_area_sqm <= 0.0 {
                return Err(anyhow!(
                    "measurement service returned a non-positive area for {}",
                    image_url
                ));
            }

            let rooms = response
                .rooms
                .into_iter()
                .map(|room| RoomMeasurement {
                    name: room.name,
                    area_sqm: room.area_sqm,
                })
                .collect();

            Ok(FetchOutcome::complete(SourcePayload::Floorplan(
                FloorplanMeasurement {
                    total_area_sqm: response.total_area_sqm,
                    rooms,
                },
            )))
        })
    }
}

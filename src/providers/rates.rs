use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::api_key_rotation::ApiKeyRotator;
use crate::assessment::{BankRate, Location, PropertyQuery, SourcePayload};
use crate::network::client::{request_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;

/// Central bank rate adapter backed by the API Ninjas interest-rate endpoint.
///
/// Every interest projection in the scoring engine keys off this single
/// figure, so the adapter fails loudly rather than defaulting.
#[derive(Clone)]
pub struct RatesProvider {
    keys: ApiKeyRotator,
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct InterestRateResponse {
    #[serde(default)]
    central_bank_rates: Vec<CentralBankRate>,
}

#[derive(Debug, Deserialize)]
struct CentralBankRate {
    central_bank: Option<String>,
    rate_pct: f64,
    last_updated: Option<String>,
}

impl RatesProvider {
    pub fn new_with_keys(keys: Vec<String>) -> Self {
        RatesProvider {
            keys: ApiKeyRotator::new(keys),
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: "https://api.api-ninjas.com".to_string(),
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
            "https://api.api-ninjas.com"
        }
    }
}

impl Provider for RatesProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "rates"
    }

    fn settings_mut(&mut self) -> &mut NetworkSettings {
        &mut self.settings
    }

    fn fetch<'a>(
        &'a self,
        _query: &'a PropertyQuery,
        _location: Option<&'a Location>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let key = self
                .keys
                .next_key()
                .ok_or_else(|| anyhow!("no API Ninjas key configured"))?;

            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;
            let url = format!("{}/v1/interestrate", self.api_base());

            let request = client
                .get(&url)
                .query(&[("country", "United Kingdom")])
                .header("X-Api-Key", key);

            let text = request_with_retry(request, self.settings.retries).await?;
            let response: InterestRateResponse =
                serde_json::from_str(&text).context("Unexpected interest-rate response shape")?;

            let rate = response
                .central_bank_rates
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no central bank rate in response"))?;

            Ok(FetchOutcome::complete(SourcePayload::BankRate(BankRate {
                central_bank: rate
                    .central_bank
                    .unwrap_or_else(|| "Bank of England".to_string()),
                rate_pct: rate.rate_pct,
                last_updated: rate.last_updated,
            })))
        })
    }
}

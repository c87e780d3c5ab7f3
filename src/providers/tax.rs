use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use std::future::Future;
use std::pin::Pin;

use super::{FetchOutcome, Provider};
use crate::assessment::{Location, PropertyQuery, SourcePayload, TaxBand, TaxRules};
use crate::network::client::{get_with_retry, HttpClientConfig};
use crate::network::NetworkSettings;

const RATES_PATH: &str = "/stamp-duty-land-tax/residential-property-rates";

/// Stamp duty rules adapter that scrapes the gov.uk SDLT residential rates
/// page.
///
/// The rate band table is required; the first-time-buyer thresholds and the
/// additional-property surcharge are taken from the page text and fall back
/// to the built-in schedule when the wording changes, producing a partial
/// result rather than a failure.
#[derive(Clone)]
pub struct TaxRulesProvider {
    settings: NetworkSettings,
    #[cfg(test)]
    base_url: String,
}

impl TaxRulesProvider {
    pub fn new() -> Self {
        TaxRulesProvider {
            settings: NetworkSettings::default(),
            #[cfg(test)]
            base_url: "https://www.gov.uk".to_string(),
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
            "https://www.gov.uk"
        }
    }
}

impl Default for TaxRulesProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for TaxRulesProvider {
    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn name(&self) -> &'static str {
        "tax"
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
            let client = HttpClientConfig::from_settings(&self.settings).build_client()?;
            let url = format!("{}{}", self.api_base(), RATES_PATH);

            log::debug!("Scraping SDLT rates from {}", url);

            let html = get_with_retry(&client, &url, self.settings.retries).await?;

            // `scraper::Html` is not Send, so all parsing happens inside this
            // call and nothing from it is held across an await
            let (rules, missing) = parse_tax_rules(&html)?;

            let payload = SourcePayload::TaxRules(rules);
            if missing.is_empty() {
                Ok(FetchOutcome::complete(payload))
            } else {
                Ok(FetchOutcome::partial(
                    payload,
                    format!("built-in values used for: {}", missing.join(", ")),
                ))
            }
        })
    }
}

/// Parse the SDLT rules out of the gov.uk page.
///
/// Returns the rules plus the list of fields that had to be filled from the
/// built-in schedule.
fn parse_tax_rules(html: &str) -> Result<(TaxRules, Vec<String>)> {
    let document = Html::parse_document(html);
    let bands = extract_rate_bands(&document)
        .ok_or_else(|| anyhow!("no SDLT rate table found on page"))?;

    let text = page_text(&document);
    let defaults = TaxRules::built_in();
    let mut missing = Vec::new();

    let ftb_nil = find_amount_after(&text, "no sdlt up to £").unwrap_or_else(|| {
        missing.push("first-time-buyer nil-rate threshold".to_string());
        defaults.ftb_nil_rate_threshold
    });

    let ftb_ceiling = find_amount_after(&text, "price is over £").unwrap_or_else(|| {
        missing.push("first-time-buyer relief ceiling".to_string());
        defaults.ftb_relief_ceiling
    });

    let surcharge = find_percent_before(&text, "on top").unwrap_or_else(|| {
        missing.push("additional-property surcharge".to_string());
        defaults.additional_surcharge
    });

    let rules = TaxRules {
        bands,
        ftb_nil_rate_threshold: ftb_nil,
        ftb_relief_ceiling: ftb_ceiling,
        ftb_rate: defaults.ftb_rate,
        additional_surcharge: surcharge,
        source: "gov.uk".to_string(),
    };

    Ok((rules, missing))
}

fn page_text(document: &Html) -> String {
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Find the first table whose header mentions rates and parse its rows into
/// an ascending band schedule.
fn extract_rate_bands(document: &Html) -> Option<Vec<TaxBand>> {
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    for table in document.select(&table_sel) {
        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|row| {
                row.select(&cell_sel)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .collect();

        if rows.len() < 2 {
            continue;
        }

        let header_mentions_rates = rows[0]
            .iter()
            .any(|h| h.to_lowercase().contains("rate") || h.to_lowercase().contains("sdlt"));
        if !header_mentions_rates {
            continue;
        }

        let mut bands = Vec::new();
        for row in &rows[1..] {
            if row.len() < 2 {
                continue;
            }
            let band_text = row[0].to_lowercase();
            let Some(rate) = parse_rate_percentage(&row[1]) else {
                continue;
            };

            let open_ended =
                band_text.contains("above") || band_text.contains("remaining");
            if open_ended {
                bands.push(TaxBand { upper: None, rate });
            } else if let Some(upper) = last_money_amount(&row[0]) {
                bands.push(TaxBand {
                    upper: Some(upper),
                    rate,
                });
            }
        }

        if bands_are_valid(&bands) {
            return Some(bands);
        }
    }

    None
}

/// A usable schedule has at least two bands, strictly ascending upper bounds,
/// and at most one open-ended band at the end.
fn bands_are_valid(bands: &[TaxBand]) -> bool {
    if bands.len() < 2 {
        return false;
    }

    let mut previous: Option<u64> = None;
    for (i, band) in bands.iter().enumerate() {
        match band.upper {
            Some(upper) => {
                if previous.map_or(false, |p| upper <= p) {
                    return false;
                }
                previous = Some(upper);
            }
            None => {
                if i != bands.len() - 1 {
                    return false;
                }
            }
        }
    }
    true
}

/// All monetary values mentioned in `text`, in order of appearance.
///
/// Understands "£125,000", "£1.5 million" and "£500000".
fn money_amounts(text: &str) -> Vec<u64> {
    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    let mut amounts = Vec::new();
    let mut i = 0;

    while i < lower.len() {
        let Some(offset) = lower[i..].find('£') else {
            break;
        };
        let start = i + offset + '£'.len_utf8();
        if start >= lower.len() {
            break;
        }

        let mut end = start;
        while end < bytes.len() {
            let c = bytes[end] as char;
            if c.is_ascii_digit() || c == ',' || c == '.' {
                end += 1;
            } else {
                break;
            }
        }

        // Advance past the pound sign even when no digits follow it; `start`
        // and `end` always sit on char boundaries because the scan above only
        // consumes ASCII
        i = if end > start {
            end
        } else {
            start + lower[start..].chars().next().map_or(1, |c| c.len_utf8())
        };

        let raw: String = lower[start..end].chars().filter(|c| *c != ',').collect();
        let raw = raw.trim_end_matches('.');

        let Ok(value) = raw.parse::<f64>() else {
            continue;
        };

        let rest = lower[end..].trim_start();
        let multiplier = if rest.starts_with("million") {
            1_000_000.0
        } else {
            1.0
        };

        amounts.push((value * multiplier).round() as u64);
    }

    amounts
}

/// Clamp a byte index to the nearest char boundary at or before it.
fn clamp_to_char_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The last monetary value in `text`. Band descriptions like "The next
/// £675,000 (the portion from £250,001 to £925,000)" end with the upper bound.
fn last_money_amount(text: &str) -> Option<u64> {
    money_amounts(text).pop()
}

/// The first monetary value after `anchor` (searched case-insensitively).
fn find_amount_after(text: &str, anchor: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let idx = lower.find(&anchor.to_lowercase())?;
    // Amounts belonging to the anchor sentence show up right after it
    let window_end = clamp_to_char_boundary(&lower, idx + anchor.len() + 40);
    let window = &lower[idx..window_end];
    money_amounts(window).into_iter().next()
}

/// Parse a percentage like "5%" or "Zero" into a fraction.
fn parse_rate_percentage(text: &str) -> Option<f64> {
    let trimmed = text.trim();

    if let Some(percent_idx) = trimmed.find('%') {
        let before = &trimmed[..percent_idx];
        let start = before
            .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
            .map(|p| p + 1)
            .unwrap_or(0);
        return before[start..].parse::<f64>().ok().map(|v| v / 100.0);
    }

    if trimmed.is_empty() || trimmed.to_lowercase().contains("zero") {
        return Some(0.0);
    }

    None
}

/// The percentage immediately preceding `anchor`, e.g. "pay 5% on top".
fn find_percent_before(text: &str, anchor: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    let idx = lower.find(&anchor.to_lowercase())?;
    let window_start = clamp_to_char_boundary(&lower, idx.saturating_sub(40));
    let window = &lower[window_start..idx];

    let percent_idx = window.rfind('%')?;
    parse_rate_percentage(&window[..=percent_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES_TABLE: &str = r#"
        <table>
            <tr><th>Property or lease premium or transfer value</th><th>SDLT rate</th></tr>
            <tr><td>Up to £125,000</td><td>Zero</td></tr>
            <tr><td>The next £125,000 (the portion from £125,001 to £250,000)</td><td>2%</td></tr>
            <tr><td>The next £675,000 (the portion from £250,001 to £925,000)</td><td>5%</td></tr>
            <tr><td>The next £575,000 (the portion from £925,001 to £1.5 million)</td><td>10%</td></tr>
            <tr><td>The remaining amount (the portion above £1.5 million)</td><td>12%</td></tr>
        </table>
    "#;

    fn full_page() -> String {
        format!(
            r#"<html><body>
            <p>You pay no SDLT up to £300,000 as a first time buyer.</p>
            <p>If the price is over £500,000 you cannot claim the relief.</p>
            <p>You will usually have to pay 5% on top of SDLT rates if buying
               an additional property.</p>
            {}
            </body></html>"#,
            RATES_TABLE
        )
    }

    #[test]
    fn test_money_amounts_plain_and_million() {
        assert_eq!(money_amounts("Up to £125,000"), vec![125_000]);
        assert_eq!(
            money_amounts("the portion from £925,001 to £1.5 million"),
            vec![925_001, 1_500_000]
        );
        assert_eq!(money_amounts("no money here"), Vec::<u64>::new());
    }

    #[test]
    fn test_last_money_amount_takes_upper_bound() {
        assert_eq!(
            last_money_amount("The next £675,000 (the portion from £250,001 to £925,000)"),
            Some(925_000)
        );
    }

    #[test]
    fn test_parse_rate_percentage() {
        assert_eq!(parse_rate_percentage("Zero"), Some(0.0));
        assert_eq!(parse_rate_percentage(""), Some(0.0));
        assert_eq!(parse_rate_percentage("5%"), Some(0.05));
        assert_eq!(parse_rate_percentage("12%"), Some(0.12));
        assert_eq!(parse_rate_percentage("1.5%"), Some(0.015));
        assert_eq!(parse_rate_percentage("no rate"), None);
    }

    #[test]
    fn test_extract_rate_bands_from_table() {
        let document = Html::parse_document(&full_page());
        let bands = extract_rate_bands(&document).unwrap();

        assert_eq!(bands.len(), 5);
        assert_eq!(bands[0].upper, Some(125_000));
        assert_eq!(bands[0].rate, 0.0);
        assert_eq!(bands[2].upper, Some(925_000));
        assert_eq!(bands[2].rate, 0.05);
        assert_eq!(bands[4].upper, None);
        assert_eq!(bands[4].rate, 0.12);
    }

    #[test]
    fn test_parse_tax_rules_complete_page() {
        let (rules, missing) = parse_tax_rules(&full_page()).unwrap();

        assert!(missing.is_empty(), "unexpected missing fields: {missing:?}");
        assert_eq!(rules.source, "gov.uk");
        assert_eq!(rules.ftb_nil_rate_threshold, 300_000);
        assert_eq!(rules.ftb_relief_ceiling, 500_000);
        assert_eq!(rules.additional_surcharge, 0.05);
        assert_eq!(rules.bands.len(), 5);
    }

    #[test]
    fn test_parse_tax_rules_falls_back_for_missing_text() {
        let page = format!("<html><body>{}</body></html>", RATES_TABLE);
        let (rules, missing) = parse_tax_rules(&page).unwrap();

        let defaults = TaxRules::built_in();
        assert_eq!(missing.len(), 3);
        assert_eq!(rules.ftb_nil_rate_threshold, defaults.ftb_nil_rate_threshold);
        assert_eq!(rules.additional_surcharge, defaults.additional_surcharge);
        // The scraped bands are still used
        assert_eq!(rules.bands.len(), 5);
        assert_eq!(rules.source, "gov.uk");
    }

    #[test]
    fn test_parse_tax_rules_without_table_is_error() {
        let page = "<html><body><p>Nothing to see</p></body></html>";
        assert!(parse_tax_rules(page).is_err());
    }

    #[test]
    fn test_bands_are_valid_rejects_descending() {
        let bands = vec![
            TaxBand {
                upper: Some(250_000),
                rate: 0.02,
            },
            TaxBand {
                upper: Some(125_000),
                rate: 0.0,
            },
        ];
        assert!(!bands_are_valid(&bands));
    }

    #[test]
    fn test_bands_are_valid_open_band_must_be_last() {
        let bands = vec![
            TaxBand {
                upper: None,
                rate: 0.12,
            },
            TaxBand {
                upper: Some(125_000),
                rate: 0.0,
            },
        ];
        assert!(!bands_are_valid(&bands));
    }

    #[tokio::test]
    async fn test_fetch_scrapes_live_page() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", RATES_PATH)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(full_page())
            .create_async()
            .await;

        let mut provider = TaxRulesProvider::new();
        provider.with_base_url(server.url());
        provider.settings.retries = 0;

        let query = PropertyQuery::new("SW1A 2AA");
        let outcome = provider.fetch(&query, None).await.unwrap();

        assert!(outcome.note.is_none());
        match outcome.payload {
            SourcePayload::TaxRules(rules) => {
                assert_eq!(rules.source, "gov.uk");
                assert_eq!(rules.bands.len(), 5);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}

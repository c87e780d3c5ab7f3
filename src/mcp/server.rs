//! propscan MCP Server implementation
//!
//! Provides MCP tools for assessing UK properties from open data sources.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::aggregator::assess_queries;
use crate::assessment::{PropertyQuery, TaxRules};
use crate::cli::Args;
use crate::output::{Formatter, PlainFormatter};
use crate::progress::ProgressManager;
use crate::providers::{
    AgencyProvider, AmenityProvider, CrimeProvider, PostcodeProvider, Provider, RatesProvider,
    TaxRulesProvider,
};
use crate::scoring;

/// Arguments for the assess_property tool
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AssessPropertyArgs {
    /// Address or UK postcode of the property
    pub address: String,

    /// Purchase price in GBP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Apply first-time-buyer stamp duty relief
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_time_buyer: Option<bool>,

    /// Treat the purchase as an additional property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_property: Option<bool>,

    /// Monthly rent in GBP, for tenancy deposit calculations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<f64>,

    /// Sources to use (comma-separated: postcode, crime, amenity, tax, rates, agency)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,

    /// Amenity search radius in metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
}

/// Arguments for the calculate_stamp_duty tool
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StampDutyArgs {
    /// Purchase price in GBP
    pub price: f64,

    /// Apply first-time-buyer relief
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_time_buyer: Option<bool>,

    /// Treat the purchase as an additional property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_property: Option<bool>,
}

/// Arguments for the monthly_payment tool
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MonthlyPaymentArgs {
    /// Amount borrowed in GBP
    pub principal: f64,

    /// Mortgage term in years
    pub years: u32,

    /// Annual interest rate in percent; fetched live when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_rate_pct: Option<f64>,
}

/// Arguments for the list_sources tool
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListSourcesArgs {}

/// propscan MCP Server
#[derive(Clone)]
pub struct PropscanMcpServer {
    tool_router: ToolRouter<PropscanMcpServer>,
    // API keys for the adapters that need them
    places_api_keys: Arc<Mutex<Vec<String>>>,
    ninja_api_keys: Arc<Mutex<Vec<String>>>,
}

#[tool_router]
impl PropscanMcpServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
            places_api_keys: Arc::new(Mutex::new(Vec::new())),
            ninja_api_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set Google Places API keys for the server
    pub async fn set_places_api_keys(&self, keys: Vec<String>) {
        let mut places_keys = self.places_api_keys.lock().await;
        *places_keys = keys;
    }

    /// Set API Ninjas keys for the server
    pub async fn set_ninja_api_keys(&self, keys: Vec<String>) {
        let mut ninja_keys = self.ninja_api_keys.lock().await;
        *ninja_keys = keys;
    }

    /// Assess a UK property across the configured data sources
    #[tool(
        description = "Assess a UK property: location, street crime, nearby amenities, stamp duty, mortgage and deposit projections"
    )]
    async fn assess_property(
        &self,
        Parameters(args): Parameters<AssessPropertyArgs>,
    ) -> Result<CallToolResult, McpError> {
        let sources_str = args
            .sources
            .unwrap_or_else(|| "postcode,crime,amenity,tax,rates".to_string());
        let source_names: Vec<String> = sources_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        for source_name in &source_names {
            match source_name.as_str() {
                "postcode" => providers.push(Box::new(PostcodeProvider::new())),
                "crime" => providers.push(Box::new(CrimeProvider::new())),
                "amenity" => providers.push(Box::new(AmenityProvider::new())),
                "tax" => providers.push(Box::new(TaxRulesProvider::new())),
                "rates" => {
                    let ninja_keys = self.ninja_api_keys.lock().await;
                    if !ninja_keys.is_empty() {
                        providers.push(Box::new(RatesProvider::new_with_keys(ninja_keys.clone())));
                    }
                }
                "agency" => {
                    let places_keys = self.places_api_keys.lock().await;
                    if !places_keys.is_empty() {
                        providers
                            .push(Box::new(AgencyProvider::new_with_keys(places_keys.clone())));
                    }
                }
                _ => {}
            }
        }

        if providers.is_empty() {
            return Err(McpError::invalid_params(
                "No valid sources specified or API keys missing for selected sources",
                None,
            ));
        }

        let mut query = PropertyQuery::new(args.address.clone());
        query.price = args.price;
        query.first_time_buyer = args.first_time_buyer.unwrap_or(false);
        query.additional_property = args.additional_property.unwrap_or(false);
        query.monthly_rent = args.monthly_rent;
        if let Some(radius) = args.radius {
            query.radius_m = radius;
        }

        // Minimal args for processing; caching is disabled in MCP mode
        let process_args = Args {
            addresses: vec![args.address.clone()],
            config: None,
            output: None,
            format: "plain".to_string(),
            sources: source_names,
            places_api_key: vec![],
            ninja_api_key: vec![],
            floorplan_endpoint: None,
            price: args.price,
            first_time_buyer: query.first_time_buyer,
            additional_property: query.additional_property,
            deposit_percent: 10.0,
            mortgage_years: 25,
            monthly_rent: args.monthly_rent,
            projection_years: 5,
            radius: query.radius_m,
            floorplan_url: None,
            amenity_categories: vec![],
            exclude_amenity_categories: vec![],
            max_amenity_distance: None,
            crime_categories: vec![],
            exclude_crime_categories: vec![],
            verbose: false,
            silent: true,
            no_progress: true,
            proxy: None,
            proxy_auth: None,
            insecure: false,
            random_agent: false,
            timeout: 30,
            retries: 2,
            parallel: 5,
            rate_limit: None,
            cache_type: "sqlite".to_string(),
            cache_path: None,
            redis_url: None,
            cache_ttl: 86400,
            no_cache: true,
            mcp: false,
        };

        let progress_manager = ProgressManager::new(true);

        let mut assessments = assess_queries(
            vec![query],
            &process_args,
            &progress_manager,
            &providers,
            None,
        )
        .await;

        let Some(mut assessment) = assessments.pop() else {
            return Err(McpError::internal_error("assessment produced no result", None));
        };

        scoring::score(&mut assessment);

        colored::control::set_override(false);
        let report = PlainFormatter::new().format(&assessment, true);

        Ok(CallToolResult::success(vec![Content::text(report)]))
    }

    /// Calculate SDLT for a purchase without touching the network
    #[tool(
        description = "Calculate Stamp Duty Land Tax (SDLT) for a residential purchase in England or Northern Ireland"
    )]
    async fn calculate_stamp_duty(
        &self,
        Parameters(args): Parameters<StampDutyArgs>,
    ) -> Result<CallToolResult, McpError> {
        if args.price < 0.0 {
            return Err(McpError::invalid_params("price must not be negative", None));
        }

        let duty = scoring::calculate_stamp_duty(
            args.price,
            &TaxRules::built_in(),
            args.first_time_buyer.unwrap_or(false),
            args.additional_property.unwrap_or(false),
        );

        let json = serde_json::to_string_pretty(&duty)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// Project the monthly mortgage payment
    #[tool(
        description = "Calculate the monthly payment for a capital-repayment mortgage, fetching the UK central bank rate when no rate is given"
    )]
    async fn monthly_payment(
        &self,
        Parameters(args): Parameters<MonthlyPaymentArgs>,
    ) -> Result<CallToolResult, McpError> {
        if args.principal <= 0.0 || args.years == 0 {
            return Err(McpError::invalid_params(
                "principal must be positive and years non-zero",
                None,
            ));
        }

        let annual_rate_pct = match args.annual_rate_pct {
            Some(rate) => rate,
            None => {
                let ninja_keys = self.ninja_api_keys.lock().await;
                if ninja_keys.is_empty() {
                    return Err(McpError::invalid_params(
                        "no annual_rate_pct given and no API Ninjas key configured for a live lookup",
                        None,
                    ));
                }

                let provider = RatesProvider::new_with_keys(ninja_keys.clone());
                let query = PropertyQuery::new("rate lookup");
                let outcome = provider
                    .fetch(&query, None)
                    .await
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;

                match outcome.payload {
                    crate::assessment::SourcePayload::BankRate(rate) => rate.rate_pct,
                    _ => {
                        return Err(McpError::internal_error(
                            "rates source returned an unexpected payload",
                            None,
                        ))
                    }
                }
            }
        };

        // The tool projects on the loan amount directly, so no deposit is
        // subtracted here
        let projection = scoring::project_mortgage(args.principal, 0.0, args.years, annual_rate_pct);

        let json = serde_json::to_string_pretty(&projection)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// List available data sources
    #[tool(description = "List all available property data sources and their status")]
    async fn list_sources(
        &self,
        Parameters(_args): Parameters<ListSourcesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let places_keys = self.places_api_keys.lock().await;
        let ninja_keys = self.ninja_api_keys.lock().await;

        let sources = vec![
            ("postcode", "postcodes.io geocoding", "Always available", true),
            ("crime", "data.police.uk street crime", "Always available", true),
            ("amenity", "OpenStreetMap amenities", "Always available", true),
            ("tax", "gov.uk SDLT rates", "Always available", true),
            (
                "rates",
                "UK central bank rate",
                if ninja_keys.is_empty() {
                    "Requires API key"
                } else {
                    "API key configured"
                },
                !ninja_keys.is_empty(),
            ),
            (
                "agency",
                "Google Places agency reviews",
                if places_keys.is_empty() {
                    "Requires API key"
                } else {
                    "API key configured"
                },
                !places_keys.is_empty(),
            ),
        ];

        let mut response = String::from("Available property data sources:\n\n");
        for (name, full_name, status, available) in sources {
            let status_icon = if available { "✓" } else { "⚠" };
            response.push_str(&format!(
                "{} {} ({}): {}\n",
                status_icon, full_name, name, status
            ));
        }

        Ok(CallToolResult::success(vec![Content::text(response)]))
    }
}

impl Default for PropscanMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PropscanMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "propscan-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "propscan MCP Server - Assess UK properties from open data sources.\n\
                 \n\
                 Available tools:\n\
                 - assess_property: Aggregate location, crime, amenity, tax and rate data for an address\n\
                 - calculate_stamp_duty: SDLT breakdown for a purchase price\n\
                 - monthly_payment: Monthly repayment for a mortgage\n\
                 - list_sources: Show available data sources and their status\n\
                 \n\
                 Sources that require API keys:\n\
                 - rates: Set PROPSCAN_NINJA_API_KEY environment variable\n\
                 - agency: Set PROPSCAN_PLACES_API_KEY environment variable"
                    .to_string(),
            ),
        }
    }
}

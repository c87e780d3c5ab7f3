use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(name = "propscan", version)]
pub struct Args {
    /// Addresses or UK postcodes to assess
    #[clap(name = "ADDRESSES")]
    pub addresses: Vec<String>,

    /// Config file to use
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    #[clap(help_heading = "Output Options")]
    /// Output file to write results
    #[clap(short, long, value_parser)]
    pub output: Option<PathBuf>,

    /// Output format (e.g., "plain", "json", "csv")
    #[clap(help_heading = "Output Options")]
    #[clap(short, long, default_value = "plain")]
    pub format: String,

    /// Sources to use (comma-separated, e.g., "postcode,crime,amenity,tax,rates")
    #[clap(help_heading = "Source Options")]
    #[clap(long, value_delimiter = ',', default_value = "postcode,crime,amenity,tax,rates")]
    pub sources: Vec<String>,

    /// API key(s) for Google Places agency lookups (can be used multiple times)
    #[clap(help_heading = "Source Options")]
    #[clap(long = "places-api-key")]
    pub places_api_key: Vec<String>,

    /// API key(s) for the API Ninjas interest-rate endpoint (can be used multiple times)
    #[clap(help_heading = "Source Options")]
    #[clap(long = "ninja-api-key")]
    pub ninja_api_key: Vec<String>,

    /// Endpoint of the external floorplan measurement service
    #[clap(help_heading = "Source Options")]
    #[clap(long)]
    pub floorplan_endpoint: Option<String>,

    /// Purchase price in GBP
    #[clap(help_heading = "Purchase Options")]
    #[clap(long)]
    pub price: Option<f64>,

    /// Apply first-time-buyer stamp duty relief
    #[clap(help_heading = "Purchase Options")]
    #[clap(long)]
    pub first_time_buyer: bool,

    /// Treat the purchase as an additional property (surcharge applies)
    #[clap(help_heading = "Purchase Options")]
    #[clap(long)]
    pub additional_property: bool,

    /// Deposit as a percentage of the purchase price
    #[clap(help_heading = "Purchase Options")]
    #[clap(long, default_value = "10.0")]
    pub deposit_percent: f64,

    /// Mortgage term in years
    #[clap(help_heading = "Purchase Options")]
    #[clap(long, default_value = "25")]
    pub mortgage_years: u32,

    /// Monthly rent in GBP, for tenancy deposit calculations
    #[clap(help_heading = "Rental Options")]
    #[clap(long)]
    pub monthly_rent: Option<f64>,

    /// Horizon for deposit growth projections, in years
    #[clap(help_heading = "Rental Options")]
    #[clap(long, default_value = "5")]
    pub projection_years: u32,

    /// Amenity search radius in metres
    #[clap(help_heading = "Query Options")]
    #[clap(long, default_value = "1000")]
    pub radius: u32,

    /// Listing floorplan image URL to measure
    #[clap(help_heading = "Query Options")]
    #[clap(long)]
    pub floorplan_url: Option<String>,

    /// Only include these amenity categories (comma-separated, e.g., "pub,cafe")
    #[clap(help_heading = "Filter Options")]
    #[clap(long, value_delimiter = ',')]
    pub amenity_categories: Vec<String>,

    /// Exclude these amenity categories (comma-separated)
    #[clap(help_heading = "Filter Options")]
    #[clap(long, value_delimiter = ',')]
    pub exclude_amenity_categories: Vec<String>,

    /// Drop amenities farther than this many metres
    #[clap(help_heading = "Filter Options")]
    #[clap(long)]
    pub max_amenity_distance: Option<f64>,

    /// Only include these crime categories (comma-separated, e.g., "burglary")
    #[clap(help_heading = "Filter Options")]
    #[clap(long, value_delimiter = ',')]
    pub crime_categories: Vec<String>,

    /// Exclude these crime categories (comma-separated)
    #[clap(help_heading = "Filter Options")]
    #[clap(long, value_delimiter = ',')]
    pub exclude_crime_categories: Vec<String>,

    #[clap(help_heading = "Display Options")]
    /// Show verbose output
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(help_heading = "Display Options")]
    /// Silent mode (no output)
    #[clap(long)]
    pub silent: bool,

    #[clap(help_heading = "Display Options")]
    /// No progress bar
    #[clap(long)]
    pub no_progress: bool,

    #[clap(help_heading = "Network Options")]
    /// Use proxy for HTTP requests (format: http://proxy.example.com:8080)
    #[clap(long)]
    pub proxy: Option<String>,

    /// Proxy authentication credentials (format: username:password)
    #[clap(help_heading = "Network Options")]
    #[clap(long)]
    pub proxy_auth: Option<String>,

    /// Skip SSL certificate verification (accept self-signed certs)
    #[clap(help_heading = "Network Options")]
    #[clap(long)]
    pub insecure: bool,

    /// Use a random User-Agent for HTTP requests
    #[clap(help_heading = "Network Options")]
    #[clap(long)]
    pub random_agent: bool,

    /// Request timeout in seconds
    #[clap(help_heading = "Network Options")]
    #[clap(long, default_value = "30")]
    pub timeout: u64,

    /// Number of retries for failed requests
    #[clap(help_heading = "Network Options")]
    #[clap(long, default_value = "3")]
    pub retries: u32,

    /// Maximum number of sources fetched concurrently per property
    #[clap(help_heading = "Network Options")]
    #[clap(long, default_value = "5")]
    pub parallel: u32,

    /// Rate limit (requests per second) for multi-request sources
    #[clap(help_heading = "Network Options")]
    #[clap(long)]
    pub rate_limit: Option<f32>,

    /// Cache backend to use (sqlite or redis)
    #[clap(help_heading = "Cache Options")]
    #[clap(long, default_value = "sqlite", value_parser = validate_cache_type)]
    pub cache_type: String,

    /// Path to the SQLite cache database
    #[clap(help_heading = "Cache Options")]
    #[clap(long)]
    pub cache_path: Option<PathBuf>,

    /// Redis connection URL (requires the redis-cache feature)
    #[clap(help_heading = "Cache Options")]
    #[clap(long)]
    pub redis_url: Option<String>,

    /// Cache TTL in seconds
    #[clap(help_heading = "Cache Options")]
    #[clap(long, default_value = "86400")]
    pub cache_ttl: u64,

    /// Disable result caching
    #[clap(help_heading = "Cache Options")]
    #[clap(long)]
    pub no_cache: bool,

    /// Run as an MCP server on stdio instead of assessing properties
    #[cfg(feature = "mcp")]
    #[clap(long)]
    pub mcp: bool,
}

pub fn read_addresses_from_stdin() -> anyhow::Result<Vec<String>> {
    use anyhow::Context;
    use std::io::{self, BufRead};

    let stdin = io::stdin();
    let mut addresses = Vec::new();

    for line in stdin.lock().lines() {
        let address = line.context("Failed to read line from stdin")?;
        if !address.trim().is_empty() {
            addresses.push(address.trim().to_string());
        }
    }

    Ok(addresses)
}

fn validate_cache_type(s: &str) -> Result<String, String> {
    match s {
        "sqlite" | "redis" => Ok(s.to_string()),
        _ => Err(format!(
            "Invalid cache type: {}. Allowed values are sqlite or redis",
            s
        )),
    }
}

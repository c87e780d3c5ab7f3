use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;

/// Represents the application configuration loaded from a file
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    pub output: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SourceConfig {
    pub sources: Option<Vec<String>>,
    pub places_api_key: Option<Vec<String>>,
    pub ninja_api_key: Option<Vec<String>>,
    pub floorplan_endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct QueryConfig {
    pub radius: Option<u32>,
    pub deposit_percent: Option<f64>,
    pub mortgage_years: Option<u32>,
    pub projection_years: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FilterConfig {
    pub amenity_categories: Option<Vec<String>>,
    pub exclude_amenity_categories: Option<Vec<String>>,
    pub max_amenity_distance: Option<f64>,
    pub crime_categories: Option<Vec<String>>,
    pub exclude_crime_categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct NetworkConfig {
    pub proxy: Option<String>,
    pub proxy_auth: Option<String>,
    pub insecure: Option<bool>,
    pub random_agent: Option<bool>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub parallel: Option<u32>,
    pub rate_limit: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheConfig {
    pub cache_type: Option<String>,
    pub cache_path: Option<String>,
    pub redis_url: Option<String>,
    pub cache_ttl: Option<u64>,
    pub no_cache: Option<bool>,
}

impl Config {
    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Get the default configuration file path
    /// - Linux/macOS: ~/.config/propscan/config.toml
    /// - Windows: %AppData%\propscan\config.toml
    ///
    /// If the directory doesn't exist, it will be created.
    /// If the file doesn't exist, an empty config.toml file will be created.
    pub fn default_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            if let Some(app_data) = env::var_os("APPDATA").map(PathBuf::from) {
                let config_dir = app_data.join("propscan");
                let config_path = config_dir.join("config.toml");

                if !config_dir.exists() && fs::create_dir_all(&config_dir).is_err() {
                    return None;
                }

                if !config_path.exists() && fs::write(&config_path, "").is_err() {
                    return None;
                }

                return Some(config_path);
            }
        }

        #[cfg(not(windows))]
        {
            if let Some(home) = home_dir() {
                let config_dir = home.join(".config").join("propscan");
                let config_path = config_dir.join("config.toml");

                if !config_dir.exists() && fs::create_dir_all(&config_dir).is_err() {
                    return None;
                }

                if !config_path.exists() && fs::write(&config_path, "").is_err() {
                    return None;
                }

                return Some(config_path);
            }
        }

        None
    }

    /// Load configuration based on command line arguments
    /// Priority: --config flag > default path > default values
    pub fn load(args: &Args) -> Self {
        // Try to load from --config flag first
        if let Some(path) = &args.config {
            if let Ok(config) = Self::from_file(path) {
                return config;
            }
        }

        // Then try default location
        if let Some(default_path) = Self::default_path() {
            if let Ok(config) = Self::from_file(default_path.clone()) {
                return config;
            }
        }

        // Otherwise use default values
        Config::default()
    }

    /// Apply configuration values to Args, respecting priority
    /// Command line arguments take precedence over config file values
    pub fn apply_to_args(self, args: &mut Args) {
        // Output options
        if args.output.is_none() {
            if let Some(output) = self.output.output {
                args.output = Some(PathBuf::from(output));
            }
        }

        if args.format == "plain" && self.output.format.is_some() {
            args.format = self.output.format.unwrap();
        }

        // Source options
        let default_sources = ["postcode", "crime", "amenity", "tax", "rates"];
        if args.sources == default_sources && self.source.sources.is_some() {
            args.sources = self.source.sources.unwrap();
        }

        if args.places_api_key.is_empty() && self.source.places_api_key.is_some() {
            args.places_api_key = self.source.places_api_key.unwrap();
        }

        if args.ninja_api_key.is_empty() && self.source.ninja_api_key.is_some() {
            args.ninja_api_key = self.source.ninja_api_key.unwrap();
        }

        if args.floorplan_endpoint.is_none() && self.source.floorplan_endpoint.is_some() {
            args.floorplan_endpoint = self.source.floorplan_endpoint;
        }

        // Query options
        if args.radius == 1000 && self.query.radius.is_some() {
            args.radius = self.query.radius.unwrap();
        }

        if args.deposit_percent == 10.0 && self.query.deposit_percent.is_some() {
            args.deposit_percent = self.query.deposit_percent.unwrap();
        }

        if args.mortgage_years == 25 && self.query.mortgage_years.is_some() {
            args.mortgage_years = self.query.mortgage_years.unwrap();
        }

        if args.projection_years == 5 && self.query.projection_years.is_some() {
            args.projection_years = self.query.projection_years.unwrap();
        }

        // Filter options
        if args.amenity_categories.is_empty() && self.filter.amenity_categories.is_some() {
            args.amenity_categories = self.filter.amenity_categories.unwrap();
        }

        if args.exclude_amenity_categories.is_empty()
            && self.filter.exclude_amenity_categories.is_some()
        {
            args.exclude_amenity_categories = self.filter.exclude_amenity_categories.unwrap();
        }

        if args.max_amenity_distance.is_none() && self.filter.max_amenity_distance.is_some() {
            args.max_amenity_distance = self.filter.max_amenity_distance;
        }

        if args.crime_categories.is_empty() && self.filter.crime_categories.is_some() {
            args.crime_categories = self.filter.crime_categories.unwrap();
        }

        if args.exclude_crime_categories.is_empty()
            && self.filter.exclude_crime_categories.is_some()
        {
            args.exclude_crime_categories = self.filter.exclude_crime_categories.unwrap();
        }

        // Network options
        if args.proxy.is_none() && self.network.proxy.is_some() {
            args.proxy = self.network.proxy;
        }

        if args.proxy_auth.is_none() && self.network.proxy_auth.is_some() {
            args.proxy_auth = self.network.proxy_auth;
        }

        if !args.insecure && self.network.insecure.unwrap_or(false) {
            args.insecure = true;
        }

        if !args.random_agent && self.network.random_agent.unwrap_or(false) {
            args.random_agent = true;
        }

        if args.timeout == 30 && self.network.timeout.is_some() {
            args.timeout = self.network.timeout.unwrap();
        }

        if args.retries == 3 && self.network.retries.is_some() {
            args.retries = self.network.retries.unwrap();
        }

        if args.parallel == 5 && self.network.parallel.is_some() {
            args.parallel = self.network.parallel.unwrap();
        }

        if args.rate_limit.is_none() && self.network.rate_limit.is_some() {
            args.rate_limit = self.network.rate_limit;
        }

        // Cache options
        if args.cache_type == "sqlite" && self.cache.cache_type.is_some() {
            args.cache_type = self.cache.cache_type.unwrap();
        }

        if args.cache_path.is_none() && self.cache.cache_path.is_some() {
            args.cache_path = self.cache.cache_path.map(PathBuf::from);
        }

        if args.redis_url.is_none() && self.cache.redis_url.is_some() {
            args.redis_url = self.cache.redis_url;
        }

        if args.cache_ttl == 86400 && self.cache.cache_ttl.is_some() {
            args.cache_ttl = self.cache.cache_ttl.unwrap();
        }

        if !args.no_cache && self.cache.no_cache.unwrap_or(false) {
            args.no_cache = true;
        }
    }
}

/// Helper function to get the home directory
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from).or({
        #[cfg(windows)]
        {
            if let Some(profile) = env::var_os("USERPROFILE").map(PathBuf::from) {
                return Some(profile);
            }

            match (env::var_os("HOMEDRIVE"), env::var_os("HOMEPATH")) {
                (Some(drive), Some(path)) => {
                    let mut drive_path = PathBuf::from(drive);
                    drive_path.push(path);
                    Some(drive_path)
                }
                _ => None,
            }
        }

        #[cfg(not(windows))]
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_from_file() {
        let config_content = r#"
            [output]
            output = "assessments.json"
            format = "json"

            [source]
            sources = ["postcode", "crime"]
            ninja_api_key = ["test-ninja-key"]

            [query]
            radius = 500
            mortgage_years = 30

            [network]
            timeout = 60
        "#;

        let temp_file = create_temp_config_file(config_content);
        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.output.output, Some("assessments.json".to_string()));
        assert_eq!(config.output.format, Some("json".to_string()));
        assert_eq!(
            config.source.sources,
            Some(vec!["postcode".to_string(), "crime".to_string()])
        );
        assert_eq!(
            config.source.ninja_api_key,
            Some(vec!["test-ninja-key".to_string()])
        );
        assert_eq!(config.query.radius, Some(500));
        assert_eq!(config.query.mortgage_years, Some(30));
        assert_eq!(config.network.timeout, Some(60));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.output.output, None);
        assert_eq!(config.output.format, None);
        assert_eq!(config.source.sources, None);
        assert_eq!(config.query.radius, None);
        assert_eq!(config.cache.cache_type, None);
    }

    #[test]
    fn test_apply_to_args_fills_defaults() {
        let mut config = Config::default();
        config.output.format = Some("json".to_string());
        config.source.sources = Some(vec!["postcode".to_string()]);
        config.query.radius = Some(250);

        let mut args = Args::parse_from(["propscan", "SW1A 2AA"]);
        assert_eq!(args.format, "plain");

        config.apply_to_args(&mut args);

        assert_eq!(args.format, "json");
        assert_eq!(args.sources, vec!["postcode"]);
        assert_eq!(args.radius, 250);
    }

    #[test]
    fn test_apply_to_args_cli_takes_precedence() {
        let mut config = Config::default();
        config.output.format = Some("json".to_string());
        config.query.radius = Some(250);

        let mut args = Args::parse_from(["propscan", "--format", "csv", "--radius", "2000", "SW1A 2AA"]);
        config.apply_to_args(&mut args);

        assert_eq!(args.format, "csv");
        assert_eq!(args.radius, 2000);
    }

    #[test]
    fn test_invalid_config_file_is_error() {
        let temp_file = create_temp_config_file("not [valid toml");
        assert!(Config::from_file(temp_file.path()).is_err());
    }
}

use anyhow::Result;
use clap::Parser;

mod aggregator;
mod api_key_rotation;
mod assessment;
mod cache;
mod cli;
mod config;
mod filters;
mod mcp;
mod network;
mod output;
mod progress;
mod providers;
mod scoring;
mod utils;

use aggregator::{add_provider, assess_queries};
use assessment::PropertyQuery;
use cache::CacheManager;
use cli::{read_addresses_from_stdin, Args};
use config::Config;
use filters::{AmenityFilter, CrimeFilter};
use network::NetworkSettings;
use output::create_outputter;
use progress::ProgressManager;
use providers::{
    AgencyProvider, AmenityProvider, CrimeProvider, FloorplanProvider, PostcodeProvider, Provider,
    RatesProvider, TaxRulesProvider,
};
use utils::verbose_print;

fn build_query(address: String, args: &Args) -> PropertyQuery {
    let mut query = PropertyQuery::new(address);
    query.price = args.price;
    query.first_time_buyer = args.first_time_buyer;
    query.additional_property = args.additional_property;
    query.monthly_rent = args.monthly_rent;
    query.deposit_percent = args.deposit_percent;
    query.mortgage_years = args.mortgage_years;
    query.projection_years = args.projection_years;
    query.radius_m = args.radius;
    query.floorplan_url = args.floorplan_url.clone();
    query
}

fn build_providers(args: &Args, network_settings: &NetworkSettings) -> Vec<Box<dyn Provider>> {
    let mut providers: Vec<Box<dyn Provider>> = Vec::new();

    for source in &args.sources {
        match source.as_str() {
            "postcode" => {
                add_provider(args, network_settings, &mut providers, PostcodeProvider::new)
            }
            "crime" => add_provider(args, network_settings, &mut providers, CrimeProvider::new),
            "amenity" => {
                add_provider(args, network_settings, &mut providers, AmenityProvider::new)
            }
            "tax" => add_provider(args, network_settings, &mut providers, TaxRulesProvider::new),
            "rates" => {
                if args.ninja_api_key.is_empty() {
                    if !args.silent {
                        eprintln!(
                            "Skipping rates source: no API Ninjas key configured (--ninja-api-key)"
                        );
                    }
                } else {
                    let keys = args.ninja_api_key.clone();
                    add_provider(args, network_settings, &mut providers, || {
                        RatesProvider::new_with_keys(keys)
                    });
                }
            }
            "agency" => {
                if args.places_api_key.is_empty() {
                    if !args.silent {
                        eprintln!(
                            "Skipping agency source: no Google Places key configured (--places-api-key)"
                        );
                    }
                } else {
                    let keys = args.places_api_key.clone();
                    add_provider(args, network_settings, &mut providers, || {
                        AgencyProvider::new_with_keys(keys)
                    });
                }
            }
            "floorplan" => match &args.floorplan_endpoint {
                Some(endpoint) => {
                    let endpoint = endpoint.clone();
                    add_provider(args, network_settings, &mut providers, || {
                        FloorplanProvider::new(endpoint)
                    });
                }
                None => {
                    if !args.silent {
                        eprintln!(
                            "Skipping floorplan source: no measurement endpoint configured (--floorplan-endpoint)"
                        );
                    }
                }
            },
            other => {
                if !args.silent {
                    eprintln!(
                        "Unknown source '{}' (valid: postcode, crime, amenity, tax, rates, agency, floorplan)",
                        other
                    );
                }
            }
        }
    }

    providers
}

async fn open_cache(args: &Args) -> Option<CacheManager> {
    if args.no_cache {
        return None;
    }

    match args.cache_type.as_str() {
        #[cfg(feature = "redis-cache")]
        "redis" => {
            let url = args
                .redis_url
                .clone()
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());
            match CacheManager::new_redis(&url).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    if !args.silent {
                        eprintln!("Cache disabled: {}", e);
                    }
                    None
                }
            }
        }
        #[cfg(not(feature = "redis-cache"))]
        "redis" => {
            if !args.silent {
                eprintln!("Cache disabled: rebuild with the redis-cache feature to use Redis");
            }
            None
        }
        _ => {
            let db_path = args.cache_path.clone().unwrap_or_else(|| {
                dirs_cache_path().unwrap_or_else(|| std::path::PathBuf::from("propscan-cache.db"))
            });
            match CacheManager::new_sqlite(&db_path).await {
                Ok(cache) => {
                    if let Err(e) = cache.cleanup_expired(args.cache_ttl).await {
                        log::warn!("Cache cleanup failed: {}", e);
                    }
                    Some(cache)
                }
                Err(e) => {
                    if !args.silent {
                        eprintln!("Cache disabled: {}", e);
                    }
                    None
                }
            }
        }
    }
}

/// Default SQLite cache location: ~/.cache/propscan/cache.db
fn dirs_cache_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .map(|home| home.join(".cache").join("propscan").join("cache.db"))
}

#[cfg(feature = "mcp")]
async fn run_mcp_server(args: &Args) -> Result<()> {
    use rmcp::ServiceExt;

    let server = mcp::PropscanMcpServer::new();
    server.set_places_api_keys(args.places_api_key.clone()).await;
    server.set_ninja_api_keys(args.ninja_api_key.clone()).await;

    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = Args::parse();
    Config::load(&args).apply_to_args(&mut args);

    #[cfg(feature = "mcp")]
    if args.mcp {
        return run_mcp_server(&args).await;
    }

    // Collect addresses either from arguments or stdin
    let addresses = if args.addresses.is_empty() {
        read_addresses_from_stdin()?
    } else {
        args.addresses.clone()
    };

    if addresses.is_empty() {
        if !args.silent {
            eprintln!("No addresses provided. Please specify addresses or pipe them through stdin.");
        }
        return Ok(());
    }

    let network_settings = NetworkSettings::from_args(&args);
    let providers = build_providers(&args, &network_settings);

    if providers.is_empty() {
        if !args.silent {
            eprintln!("Error: No valid sources specified. Please use --sources with valid source names (postcode, crime, amenity, tax, rates, agency, floorplan)");
        }
        return Ok(());
    }

    let progress_check = args.no_progress || args.silent;
    let progress_manager = ProgressManager::new(progress_check);

    let cache = open_cache(&args).await;

    let queries: Vec<PropertyQuery> = addresses
        .into_iter()
        .map(|address| build_query(address, &args))
        .collect();

    let mut assessments =
        assess_queries(queries, &args, &progress_manager, &providers, cache.as_ref()).await;

    // Apply category and distance filters
    let mut amenity_filter = AmenityFilter::new();
    amenity_filter
        .with_categories(args.amenity_categories.clone())
        .with_exclude_categories(args.exclude_amenity_categories.clone())
        .with_max_distance(args.max_amenity_distance);

    let mut crime_filter = CrimeFilter::new();
    crime_filter
        .with_categories(args.crime_categories.clone())
        .with_exclude_categories(args.exclude_crime_categories.clone());

    if !amenity_filter.is_empty() || !crime_filter.is_empty() {
        let filter_bar = progress_manager.create_filter_bar();
        filter_bar.set_message("Applying filters...");

        for assessment in assessments.iter_mut() {
            filters::apply_filters(assessment, &amenity_filter, &crime_filter);
        }

        filter_bar.finish_with_message("Filters applied");
    }

    // Compute the deterministic estimates
    let scoring_bar = progress_manager.create_scoring_bar(assessments.len());
    for (idx, assessment) in assessments.iter_mut().enumerate() {
        scoring_bar.set_position(idx as u64);
        scoring_bar.set_message(format!("Scoring {}", assessment.query.address));
        scoring::score(assessment);
    }
    scoring_bar.finish_with_message("Scoring complete");

    let incomplete = assessments.iter().filter(|a| !a.is_complete()).count();
    verbose_print(
        &args,
        format!(
            "Assessed {} properties ({} with missing sources)",
            assessments.len(),
            incomplete
        ),
    );

    // Output results
    let outputter = create_outputter(&args.format);

    match outputter.output(&assessments, args.output.clone(), args.silent) {
        Ok(_) => {
            if args.verbose && !args.silent {
                if let Some(path) = &args.output {
                    println!("Results written to: {}", path.display());
                }
            }
        }
        Err(e) => {
            if !args.silent {
                eprintln!("Error writing output: {}", e);
            }
        }
    }

    Ok(())
}

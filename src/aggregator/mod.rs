use futures::future::join_all;
use std::sync::Arc;
use tokio::task;

use crate::assessment::{
    Location, PropertyAssessment, PropertyQuery, SourcePayload, SourceResult, SourceStatus,
};
use crate::cache::{CacheEntry, CacheKey, CacheManager, CacheOptions};
use crate::cli::Args;
use crate::network::NetworkSettings;
use crate::progress::ProgressManager;
use crate::providers::Provider;
use crate::utils::verbose_print;

/// Helper function to apply network settings to a source adapter
pub fn apply_network_settings(provider: &mut dyn Provider, settings: &NetworkSettings) {
    *provider.settings_mut() = settings.clone();
}

/// Register a source adapter, logging the applied settings in verbose mode
pub fn add_provider<T: Provider + 'static>(
    args: &Args,
    network_settings: &NetworkSettings,
    providers: &mut Vec<Box<dyn Provider>>,
    provider_builder: impl FnOnce() -> T,
) {
    let mut provider = provider_builder();
    apply_network_settings(&mut provider, network_settings);

    if args.verbose && !args.silent {
        println!("Adding {} source", provider.name());
        if network_settings.proxy.is_some() {
            println!(
                "Using proxy for {}: {}",
                provider.name(),
                network_settings.proxy.as_deref().unwrap_or("")
            );
        }
        println!(
            "Timeout set to {} seconds for {}",
            network_settings.timeout,
            provider.name()
        );
        println!(
            "Retries set to {} for {}",
            network_settings.retries,
            provider.name()
        );
        if let Some(rate) = network_settings.rate_limit {
            println!(
                "Rate limit set to {} requests/second for {}",
                rate,
                provider.name()
            );
        }
    }

    providers.push(Box::new(provider));
}

/// Turn one adapter outcome into a `SourceResult`
fn into_source_result(
    source: &str,
    outcome: anyhow::Result<crate::providers::FetchOutcome>,
) -> SourceResult {
    match outcome {
        Ok(fetched) => {
            let mut result = SourceResult::success(source, fetched.payload);
            if let Some(note) = fetched.note {
                result.status = SourceStatus::Partial;
                result.error = Some(note);
            }
            result
        }
        Err(e) => SourceResult::failed(source, e),
    }
}

/// Fetch all sources for a single query.
///
/// The geocoding source runs first because the location-dependent sources
/// cannot start without its output; everything else fans out concurrently.
/// A failing source never aborts the others.
pub async fn fetch_sources(
    query: &PropertyQuery,
    args: &Args,
    progress_manager: &ProgressManager,
    providers: &[Box<dyn Provider>],
) -> Vec<SourceResult> {
    let source_names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();
    let source_bars = Arc::new(progress_manager.create_source_bars(&source_names));

    let mut results: Vec<SourceResult> = Vec::new();
    let mut location: Option<Location> = None;

    // Stage 1: geocode
    for (idx, provider) in providers.iter().enumerate() {
        if !provider.provides_location() {
            continue;
        }

        let bar = &source_bars[idx];
        bar.set_message(format!("Geocoding {}", query.address));
        bar.set_position(30);

        let result = into_source_result(provider.name(), provider.fetch(query, None).await);

        match &result.status {
            SourceStatus::Failed => {
                bar.set_position(100);
                bar.set_message(format!(
                    "Error: {}",
                    result.error.as_deref().unwrap_or("unknown")
                ));
            }
            _ => {
                if let Some(SourcePayload::Location(loc)) = &result.payload {
                    location = Some(loc.clone());
                }
                bar.set_position(100);
                bar.set_message("Location resolved".to_string());
            }
        }

        results.push(result);
    }

    // Stage 2: everything else, concurrently in chunks of --parallel
    let mut pending: Vec<usize> = Vec::new();

    for (idx, provider) in providers.iter().enumerate() {
        if provider.provides_location() {
            continue;
        }

        if provider.needs_location() && location.is_none() {
            results.push(SourceResult::failed(
                provider.name(),
                "skipped: no geocoded location available",
            ));
            source_bars[idx].set_position(100);
            source_bars[idx].set_message("Skipped (no location)".to_string());
            continue;
        }

        pending.push(idx);
    }

    let chunk_size = (args.parallel.max(1)) as usize;

    for chunk in pending.chunks(chunk_size) {
        let mut tasks = Vec::new();

        for &idx in chunk {
            let provider_clone = providers[idx].clone_box();
            let source_name = providers[idx].name().to_string();
            let query_clone = query.clone();
            let location_clone = location.clone();
            let bars = Arc::clone(&source_bars);

            bars[idx].set_message(format!("Starting fetch for {}", query_clone.address));

            let task = task::spawn(async move {
                let bar = &bars[idx];
                bar.set_message(format!("Fetching data for {}", query_clone.address));
                bar.set_position(30);

                let outcome = provider_clone
                    .fetch(&query_clone, location_clone.as_ref())
                    .await;
                let result = into_source_result(&source_name, outcome);

                bar.set_position(100);
                match &result.status {
                    SourceStatus::Failed => bar.set_message(format!(
                        "Error: {}",
                        result.error.as_deref().unwrap_or("unknown")
                    )),
                    SourceStatus::Partial => bar.set_message("Done (partial)".to_string()),
                    SourceStatus::Success => bar.set_message("Done".to_string()),
                }

                result
            });

            tasks.push(task);
        }

        for task_result in join_all(tasks).await {
            match task_result {
                Ok(result) => results.push(result),
                Err(e) => {
                    if !args.silent {
                        eprintln!("Task error: {}", e);
                    }
                }
            }
        }
    }

    for bar in source_bars.iter() {
        bar.finish();
    }

    results
}

/// Assess each query against the configured sources.
///
/// Source results are cached per (address, source set, fetch options) so a
/// re-run with different financial parameters does not refetch.
pub async fn assess_queries(
    queries: Vec<PropertyQuery>,
    args: &Args,
    progress_manager: &ProgressManager,
    providers: &[Box<dyn Provider>],
    cache: Option<&CacheManager>,
) -> Vec<PropertyAssessment> {
    let source_names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();
    let total_queries = queries.len();
    let query_bar = progress_manager.create_query_bar(total_queries);

    let mut assessments = Vec::with_capacity(total_queries);

    for (idx, query) in queries.into_iter().enumerate() {
        query_bar.set_position(idx as u64);
        query_bar.set_message(format!("Assessing {}", query.address));

        verbose_print(
            args,
            format!(
                "Assessing property [{}/{}]: {}",
                idx + 1,
                total_queries,
                query.address
            ),
        );

        let cache_key = CacheKey::new(
            &query.address,
            &source_names,
            &CacheOptions::from_query(&query),
        );

        let cached = match cache {
            Some(manager) => match manager.get_fresh(&cache_key, args.cache_ttl).await {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Cache lookup failed for {}: {}", query.address, e);
                    None
                }
            },
            None => None,
        };

        let results = match cached {
            Some(entry) => {
                verbose_print(args, format!("Using cached results for {}", query.address));
                entry.results
            }
            None => {
                let results = fetch_sources(&query, args, progress_manager, providers).await;

                if let Some(manager) = cache {
                    let entry = CacheEntry::new(results.clone());
                    if let Err(e) = manager.store(&cache_key, &entry).await {
                        log::warn!("Failed to cache results for {}: {}", query.address, e);
                    }
                }

                results
            }
        };

        let assessment = PropertyAssessment::from_results(query, results);

        if args.verbose && !args.silent {
            println!("Results for {}:", assessment.query.address);
            for source in &assessment.sources_used {
                println!("  - {}: ok", source);
            }
            for failed in &assessment.sources_failed {
                println!("  - {}: {}", failed.source, failed.error);
            }
        }

        assessments.push(assessment);
    }

    query_bar.finish_with_message("All properties assessed");
    assessments
}

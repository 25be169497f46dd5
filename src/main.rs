/// Command-line entry point for the aquarium tracker.
///
/// Usage:
///   aquarium_tracker table                       reference table as JSON
///   aquarium_tracker classify <param> [value]    classify one reading
///   aquarium_tracker precache                    install + activate the
///                                                configured asset bucket
///
/// Configuration comes from `aquarium.toml` (or `$AQUARIUM_CONFIG`).

use std::process::ExitCode;
use std::sync::Arc;

use serde_json::json;

use aquarium_tracker::cache::{CacheRegistration, CacheStorage, HttpFetcher, MemoryCacheStorage};
use aquarium_tracker::classify::{Classifier, status_to_display_class};
use aquarium_tracker::config::AppConfig;
use aquarium_tracker::logging::{self, Component};

fn usage() -> ExitCode {
    eprintln!("usage: aquarium_tracker <table | classify <param> [value] | precache>");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.init_logging() {
        eprintln!("configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("table") => print_table(&config),
        Some("classify") if args.len() >= 2 => {
            print_classification(&config, &args[1], args.get(2).map(String::as_str))
        }
        Some("precache") => precache(&config).await,
        _ => return usage(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            logging::error(Component::System, None, &message);
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn print_table(config: &AppConfig) -> Result<(), String> {
    let table = config.reference_table().map_err(|e| e.to_string())?;
    let rows: Vec<_> = table
        .iter()
        .map(|spec| {
            json!({
                "key": spec.key,
                "label": spec.label,
                "range": spec.range_summary(),
                "description": spec.description,
                "spec": spec.range,
            })
        })
        .collect();
    let out = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn print_classification(config: &AppConfig, parameter: &str, value: Option<&str>) -> Result<(), String> {
    let table = config.reference_table().map_err(|e| e.to_string())?;
    let classifier = Classifier::new(table, config.classification.parsing);

    if classifier.table().get(parameter).is_none() {
        logging::warn(Component::Classifier, Some(parameter), "unknown parameter");
    }

    let status = classifier.classify(parameter, value);
    let display_class = status_to_display_class(status);
    let out = json!({
        "parameter": parameter,
        "value": value,
        "status": status,
        "display_class": display_class,
        "css_class": display_class.css_class(),
    });
    println!("{}", out);
    Ok(())
}

async fn precache(config: &AppConfig) -> Result<(), String> {
    let storage = Arc::new(MemoryCacheStorage::new());
    let registration = CacheRegistration::new(storage.clone(), Arc::new(HttpFetcher::new()));

    let controller = registration
        .update(&config.cache)
        .await
        .map_err(|e| e.to_string())?;

    let buckets = storage.keys().await.map_err(|e| e.to_string())?;
    let out = json!({
        "bucket": controller.bucket_name(),
        "state": controller.state().to_string(),
        "entries": storage.entry_count(controller.bucket_name()),
        "buckets": buckets,
    });
    println!("{}", out);
    Ok(())
}

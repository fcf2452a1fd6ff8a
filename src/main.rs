use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptm_core::{
    Dashboard, Dataset, DiseaseFilter, EnvValues, FileCacheStore, StatisticsService,
    resolve_from_env_values,
};

/// Output document of one run.
#[derive(Serialize)]
struct RunReport {
    generated_at: DateTime<Utc>,
    cache_years_rebuilt: usize,
    dashboard: Dashboard,
}

/// Main entry point for the PTM statistics runner
///
/// Loads the dataset from the data directory, rebuilds the statistics cache for the current
/// year across all facilities in parallel, and prints the yearly facility ranking as JSON.
///
/// # Environment Variables
/// - `PTM_DATA_DIR`: dataset and cache directory (default: "ptm_data")
/// - `PTM_CONTROLLED_RULE`: `history` or `latest` (default: "history")
/// - `PTM_ACHIEVEMENT_BASIS`: `standard` or `total` (default: "standard")
/// - `PTM_HIGHLIGHT_COUNT`: size of the top/bottom slices (default: 5)
/// - `PTM_CURRENT_YEAR`: reporting year (default: the calendar year)
///
/// # Returns
/// * `Ok(())` - If the dataset loads and the cache is rebuilt
/// * `Err(anyhow::Error)` - If configuration, loading or cache writes fail
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("ptm=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Arc::new(resolve_from_env_values(EnvValues::capture())?);
    let year = cfg.current_year();
    tracing::info!(
        data_dir = %cfg.data_dir().display(),
        year,
        rule = ?cfg.controlled_rule(),
        basis = ?cfg.achievement_basis(),
        "starting statistics run"
    );

    let dataset = Dataset::load(cfg.data_dir(), year)?;
    let facilities = dataset.facilities;
    let service = StatisticsService::new(
        cfg.clone(),
        Arc::new(dataset.examinations),
        Arc::new(dataset.targets),
        Arc::new(FileCacheStore::new(cfg.cache_dir())),
    );

    let cache_years_rebuilt = service.recompute_year_for_all(&facilities, year)?;
    let dashboard = service.dashboard(&facilities, year, None, DiseaseFilter::Both)?;

    let report = RunReport {
        generated_at: Utc::now(),
        cache_years_rebuilt,
        dashboard,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

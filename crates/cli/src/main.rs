use clap::{Parser, Subcommand};
use ptm_core::{
    resolve_from_env_values, CacheEntry, Dataset, DiseaseFilter, DiseaseType, EnvValues,
    FacilityId, FileCacheStore, Month, PatientId, RecomputeJob, Scope, StatisticsService,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ptm")]
#[command(about = "Chronic-disease programme statistics CLI")]
struct Cli {
    /// Data directory (overrides PTM_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one patient as standard/controlled
    Classify {
        /// Patient id
        patient: PatientId,
        /// Disease code (HT or DM)
        disease: DiseaseType,
        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Classify up to and including this month (1-12)
        #[arg(long)]
        month: Option<u32>,
    },
    /// Aggregate a scope directly from the examination log
    Aggregate {
        /// Facility id
        facility: FacilityId,
        /// Disease code (HT or DM)
        disease: DiseaseType,
        #[arg(long)]
        year: Option<i32>,
        /// Single month (1-12); omit for the year plus its monthly breakdown
        #[arg(long)]
        month: Option<u32>,
    },
    /// Rebuild cached rows from the examination log
    Recompute {
        #[arg(long)]
        year: Option<i32>,
        /// Only this facility (requires --disease)
        #[arg(long, requires = "disease")]
        facility: Option<FacilityId>,
        /// Only this disease (requires --facility)
        #[arg(long, requires = "facility")]
        disease: Option<DiseaseType>,
        /// First month to rebuild (1-12)
        #[arg(long, default_value_t = 1)]
        from_month: u32,
    },
    /// Read cached statistics for a month, or the year
    Summary {
        /// Facility id
        facility: FacilityId,
        /// Disease code (HT or DM)
        disease: DiseaseType,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Rank facilities against their yearly targets
    Rank {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        /// Rank on one disease only
        #[arg(long)]
        disease: Option<DiseaseType>,
    },
}

/// Cached figures for a whole year.
#[derive(Serialize)]
struct YearSummary {
    /// Sum of the monthly rows; a patient counts once per month seen.
    months_summed: CacheEntry,
    /// Each patient once.
    patients: CacheEntry,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("ptm=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut env = EnvValues::capture();
    if let Some(dir) = &cli.data_dir {
        env.data_dir = Some(dir.display().to_string());
    }
    let cfg = Arc::new(resolve_from_env_values(env)?);

    let Some(command) = cli.command else {
        println!("Use --help to see available commands.");
        return Ok(());
    };

    let dataset = Dataset::load(cfg.data_dir(), cfg.current_year())?;
    let facilities = dataset.facilities;
    let service = StatisticsService::new(
        cfg.clone(),
        Arc::new(dataset.examinations),
        Arc::new(dataset.targets),
        Arc::new(FileCacheStore::new(cfg.cache_dir())),
    );
    let year_or_current = |year: Option<i32>| year.unwrap_or(cfg.current_year());

    match command {
        Commands::Classify {
            patient,
            disease,
            year,
            month,
        } => {
            let classification = service.classify_patient(
                &patient,
                disease,
                year_or_current(year),
                parse_month(month)?,
            )?;
            print_json(&classification)?;
        }
        Commands::Aggregate {
            facility,
            disease,
            year,
            month,
        } => {
            let year = year_or_current(year);
            match parse_month(month)? {
                Some(m) => {
                    let scope = Scope::month(facility, disease, year, m);
                    print_json(&service.aggregate(&scope)?)?;
                }
                None => print_json(&service.aggregate_year(&facility, disease, year)?)?,
            }
        }
        Commands::Recompute {
            year,
            facility,
            disease,
            from_month,
        } => {
            let year = year_or_current(year);
            match (facility, disease) {
                (Some(facility), Some(disease)) => {
                    let job = RecomputeJob {
                        facility,
                        disease,
                        year,
                        from_month: Month::new(from_month)?,
                    };
                    match service.run_recompute(&job) {
                        Ok(_) => println!("Recomputed {job}"),
                        Err(e) => eprintln!("Error recomputing {job}: {e}"),
                    }
                }
                _ => {
                    let jobs = service.recompute_year_for_all(&facilities, year)?;
                    println!("Recomputed {jobs} facility/disease years for {year}");
                }
            }
        }
        Commands::Summary {
            facility,
            disease,
            year,
            month,
        } => {
            let year = year_or_current(year);
            match parse_month(month)? {
                Some(m) => print_json(&service.monthly_cache(&facility, disease, year, m)?)?,
                None => print_json(&YearSummary {
                    months_summed: service.yearly_summary(&facility, disease, year)?,
                    patients: service.yearly_patients(&facility, disease, year)?,
                })?,
            }
        }
        Commands::Rank {
            year,
            month,
            disease,
        } => {
            let dashboard = service.dashboard(
                &facilities,
                year_or_current(year),
                parse_month(month)?,
                DiseaseFilter::from(disease),
            )?;
            if dashboard.rows.is_empty() {
                println!("No facilities found.");
            } else {
                print_json(&dashboard)?;
            }
        }
    }

    Ok(())
}

fn parse_month(month: Option<u32>) -> Result<Option<Month>, Box<dyn std::error::Error>> {
    Ok(month.map(Month::new).transpose()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

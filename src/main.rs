use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod filter;
mod grid;
mod mapping;
mod models;
mod report;

use mapping::{DefaultMappingTable, MappingResolver};
use models::{Axis, ContributesTo, SignalAxisMapping, SignalSnapshot};

#[derive(Parser)]
#[command(name = "talent-signals")]
#[command(about = "Aggregates talent signals into 9-box performance and potential scores", long_about = None)]
struct Cli {
    /// JSON file replacing the built-in category default mappings
    #[arg(long, global = true)]
    defaults: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import signal snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the category default mapping table
    Defaults,
    /// Create company mappings from the category defaults
    InitDefaults {
        #[arg(long)]
        company: String,
    },
    /// Preview the effective mapping for a signal definition
    Resolve {
        #[arg(long)]
        company: String,
        #[arg(long)]
        definition: String,
    },
    /// Create or replace a company's custom mapping
    SetMapping {
        #[arg(long)]
        company: String,
        #[arg(long)]
        definition: String,
        #[arg(long)]
        contributes_to: String,
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
        #[arg(long, default_value_t = mapping::DEFAULT_MINIMUM_CONFIDENCE)]
        min_confidence: f64,
    },
    /// Deactivate a company's custom mapping
    DeactivateMapping {
        #[arg(long)]
        company: String,
        #[arg(long)]
        definition: String,
    },
    /// Compute performance and potential scores for one employee
    Score {
        #[arg(long)]
        company: String,
        #[arg(long)]
        employee: String,
    },
    /// Generate a markdown 9-box report for a company
    Report {
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "talent-grid.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_defaults(path: Option<&Path>) -> anyhow::Result<DefaultMappingTable> {
    let table = match path {
        Some(path) => DefaultMappingTable::load(path)?,
        None => DefaultMappingTable::builtin(),
    };
    if table.is_empty() {
        warn!("default mapping table is empty; only custom mappings will apply");
    }
    Ok(table)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let defaults = load_defaults(cli.defaults.as_deref())?;

    if let Commands::Defaults = cli.command {
        for entry in defaults.entries() {
            println!(
                "- {}: {} (weight {:.2}) {}",
                entry.category, entry.contributes_to, entry.weight, entry.rationale
            );
        }
        return Ok(());
    }

    let settings = config::AppConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Defaults => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} snapshots from {}.", csv.display());
        }
        Commands::InitDefaults { company } => {
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let definitions = db::fetch_active_definitions(&pool).await?;
            let planned = mapping::plan_default_mappings(company_id, &definitions, &defaults);

            if planned.is_empty() {
                println!("No active signal definitions match a default category; nothing to initialize.");
                return Ok(());
            }

            let inserted = db::insert_mappings(&pool, &planned).await?;
            info!(%company, planned = planned.len(), inserted, "default mappings initialized");
            println!(
                "Initialized {inserted} of {} default mappings for {company} ({} already present).",
                planned.len(),
                planned.len() - inserted
            );
        }
        Commands::Resolve {
            company,
            definition,
        } => {
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let (mappings, definition) = tokio::try_join!(
                db::fetch_company_mappings(&pool, company_id),
                db::fetch_definition(&pool, &definition),
            )?;
            let resolver = MappingResolver::new(&mappings, &defaults);

            match resolver.resolve(definition.id, &definition.category) {
                Some(effective) => println!(
                    "{} ({}, {}): {} weight {:.2}, minimum confidence {:.2} [{}]",
                    definition.code,
                    definition.name,
                    definition.category,
                    effective.contributes_to,
                    effective.weight,
                    effective.minimum_confidence,
                    effective.source.as_str()
                ),
                None => println!(
                    "{} ({}, {}) contributes to no axis.",
                    definition.code, definition.name, definition.category
                ),
            }
        }
        Commands::SetMapping {
            company,
            definition,
            contributes_to,
            weight,
            min_confidence,
        } => {
            mapping::validate_mapping(weight, min_confidence)?;
            let contributes_to: ContributesTo = contributes_to.parse()?;
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let definition = db::fetch_definition(&pool, &definition).await?;

            let custom = SignalAxisMapping {
                company_id,
                signal_definition_id: definition.id,
                contributes_to,
                weight,
                minimum_confidence: min_confidence,
                is_active: true,
            };
            db::upsert_mapping(&pool, &custom).await?;
            info!(%company, definition = %definition.code, %contributes_to, weight, "custom mapping saved");
            println!(
                "{} now contributes to {} for {company}.",
                definition.code, contributes_to
            );
        }
        Commands::DeactivateMapping {
            company,
            definition,
        } => {
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let definition = db::fetch_definition(&pool, &definition).await?;
            if db::deactivate_mapping(&pool, company_id, definition.id).await? {
                println!("Deactivated custom mapping for {}.", definition.code);
            } else {
                println!(
                    "No active custom mapping for {}; category default applies.",
                    definition.code
                );
            }
        }
        Commands::Score { company, employee } => {
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let employee = db::fetch_employee(&pool, company_id, &employee).await?;
            let (mappings, signals) = tokio::try_join!(
                db::fetch_company_mappings(&pool, company_id),
                db::fetch_current_signals(&pool, employee.id),
            )?;

            let resolver = MappingResolver::new(&mappings, &defaults);
            let scores = aggregate::aggregate_axis_scores(&signals, &resolver);
            let placement = grid::Placement::from_scores(&scores);

            println!("{} ({})", employee.full_name, employee.email);
            for axis in Axis::ALL {
                let score = scores.get(axis);
                println!("  {}: {}", axis, report::describe_axis(score));
                for contribution in score.map(|s| s.breakdown.as_slice()).unwrap_or_default() {
                    println!(
                        "    - {}: {:.2} x {:.2} (confidence {:.2})",
                        contribution.signal_name,
                        contribution.adjusted_score,
                        contribution.weight,
                        contribution.confidence
                    );
                }
            }
            match placement.box_number() {
                Some(number) => println!("  placement: {} (box {number})", placement.label()),
                None => println!("  placement: {}", placement.label()),
            }
        }
        Commands::Report { company, out } => {
            let company_id = db::fetch_company_id(&pool, &company).await?;
            let (mappings, employees, signals) = tokio::try_join!(
                db::fetch_company_mappings(&pool, company_id),
                db::fetch_company_employees(&pool, company_id),
                db::fetch_company_current_signals(&pool, company_id),
            )?;

            let resolver = MappingResolver::new(&mappings, &defaults);
            let mut by_employee: HashMap<Uuid, Vec<SignalSnapshot>> = HashMap::new();
            for signal in signals {
                by_employee.entry(signal.employee_id).or_default().push(signal);
            }

            let entries: Vec<report::EmployeeGridEntry> = employees
                .into_iter()
                .map(|employee| {
                    let signals = by_employee.remove(&employee.id).unwrap_or_default();
                    let scores = aggregate::aggregate_axis_scores(&signals, &resolver);
                    report::EmployeeGridEntry::new(employee, scores)
                })
                .collect();

            let generated_on = chrono::Utc::now().date_naive();
            let report = report::build_report(&company, generated_on, &entries);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(%company, employees = entries.len(), "report generated");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

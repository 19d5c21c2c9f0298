use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use lis_core::collaborators::{LogMailer, NoopCache};
use lis_core::constants::DEFAULT_LAB_DATA_DIR;
use lis_core::models::{compute_is_abnormal, NormalRange, ValueType};
use lis_core::{
    CollectionStatus, CoreConfig, EntityId, LabServices, LabStore, Lifecycle, OrderStatus,
    ReportStatus, ResultStatus,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lis")]
#[command(about = "Laboratory information system CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Entity {
    Order,
    Sample,
    Result,
    Report,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether a measured value is abnormal against a reference range
    Flag {
        /// Measured value; JSON literals are accepted, anything else is read as text
        #[arg(long)]
        value: String,
        /// Declared result type (number, text, boolean, array, object)
        #[arg(long = "type", default_value = "number")]
        value_type: String,
        /// Lower bound of the reference range
        #[arg(long)]
        min: Option<f64>,
        /// Upper bound of the reference range
        #[arg(long)]
        max: Option<f64>,
    },
    /// Print the strict status transition table of an entity
    Transitions {
        #[arg(value_enum)]
        entity: Entity,
    },
    /// Print sample counts and mean processing time per collection status
    Stats {
        /// Directory holding the lab documents
        #[arg(long, default_value = DEFAULT_LAB_DATA_DIR)]
        data_dir: PathBuf,
    },
    /// List samples waiting for collection, most urgent first
    Pending {
        /// Directory holding the lab documents
        #[arg(long, default_value = DEFAULT_LAB_DATA_DIR)]
        data_dir: PathBuf,
    },
    /// Expire every sample whose expiry date has passed
    Expire {
        /// Directory holding the lab documents
        #[arg(long, default_value = DEFAULT_LAB_DATA_DIR)]
        data_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Flag {
            value,
            value_type,
            min,
            max,
        }) => {
            let abnormal = flag(&value, &value_type, min, max)?;
            println!("{}", if abnormal { "abnormal" } else { "normal" });
        }
        Some(Commands::Transitions { entity }) => {
            for line in transition_lines(entity) {
                println!("{line}");
            }
        }
        Some(Commands::Stats { data_dir }) => {
            let services = open_services(data_dir)?;
            let stats = services.samples.get_collection_stats();
            if stats.is_empty() {
                println!("No samples found.");
            }
            for stat in stats {
                match stat.avg_processing_minutes {
                    Some(avg) => println!(
                        "{}: {} (avg processing {:.1} min)",
                        stat.status, stat.count, avg
                    ),
                    None => println!("{}: {}", stat.status, stat.count),
                }
            }
        }
        Some(Commands::Pending { data_dir }) => {
            let services = open_services(data_dir)?;
            let pending = services.samples.get_pending_samples();
            if pending.is_empty() {
                println!("No pending samples.");
            }
            for sample in pending {
                println!(
                    "{} [{}] {} order {}",
                    sample.sample_id, sample.priority, sample.sample_type, sample.order
                );
            }
        }
        Some(Commands::Expire { data_dir }) => {
            let services = open_services(data_dir)?;
            let expired = services
                .samples
                .expire_overdue_samples(Utc::now(), EntityId::system())?;
            println!("Expired {} sample(s)", expired.len());
        }
        None => {
            println!("Use 'lis --help' for commands");
        }
    }

    Ok(())
}

fn open_services(data_dir: PathBuf) -> Result<LabServices, Box<dyn std::error::Error>> {
    let defaults = CoreConfig::default();
    let cfg = CoreConfig::new(
        Some(data_dir),
        defaults.transition_policy(),
        defaults.sample_expiry_days(),
    )?;
    let store = LabStore::open(&cfg)?;
    Ok(LabServices::new(
        Arc::new(cfg),
        store,
        Arc::new(NoopCache),
        Arc::new(LogMailer),
    ))
}

fn flag(
    raw: &str,
    value_type: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let value_type: ValueType = value_type.parse()?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.into()));
    let range = NormalRange {
        min,
        max,
        ..NormalRange::default()
    };
    Ok(compute_is_abnormal(value_type, &value, &range))
}

fn transition_lines(entity: Entity) -> Vec<String> {
    match entity {
        Entity::Order => table::<OrderStatus>(),
        Entity::Sample => table::<CollectionStatus>(),
        Entity::Result => table::<ResultStatus>(),
        Entity::Report => table::<ReportStatus>(),
    }
}

fn table<S: Lifecycle>() -> Vec<String> {
    S::all()
        .iter()
        .map(|from| {
            if from.is_terminal() {
                return format!("{from}: terminal");
            }
            let targets: Vec<String> = from
                .allowed_targets()
                .iter()
                .map(ToString::to_string)
                .collect();
            format!("{from} -> {}", targets.join(", "))
        })
        .collect()
}

//! patient-registry - command-line front-end for hospital patient registration.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use patient_registry_client::{ClientConfig, ConfigLayer, HttpDirectory};
use patient_registry_core::export::{default_file_name, RosterExport};
use patient_registry_core::roster::{sort_newest_first, RosterFilter, RosterSummary};
use patient_registry_core::{
    Allocator, CounterStore, Database, PatientDetails, PatientDirectory, PatientRecord,
    RegistrationError, RegistrationSession,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "patient-registry", version, about = "Register and look up hospital patients")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the Patient Directory Service
    #[arg(long, env = "PATIENT_REGISTRY_API_URL", global = true)]
    api_url: Option<String>,

    /// SQLite file holding device-local state
    #[arg(long, env = "PATIENT_REGISTRY_STATE_PATH", global = true)]
    state_path: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PATIENT_REGISTRY_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            api_url: self.api_url.clone(),
            state_path: self.state_path.clone(),
            timeout_secs: self.timeout_secs,
            log_json: self.log_json.then_some(true),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the IP and serial numbers the next registration would get
    Allocate,
    /// Register a new patient
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        place: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        referral: Option<String>,
    },
    /// List registered patients, newest first
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one patient's details
    Show { id: String },
    /// Delete a patient record
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Export the (filtered) roster
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output file (defaults to patients_export_<date>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check whether the directory service is up
    Health,
    /// Print the device-local fallback serial counter
    Counter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    ip: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    serial: Option<String>,
    #[arg(long)]
    place: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Registered on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Registered on or before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl From<FilterArgs> for RosterFilter {
    fn from(args: FilterArgs) -> Self {
        RosterFilter {
            ip_number: args.ip,
            patient_name: args.name,
            serial_number: args.serial,
            place: args.place,
            phone_number: args.phone,
            start_date: args.from,
            end_date: args.to,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_layer = match &cli.config {
        Some(path) => ConfigLayer::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigLayer::default(),
    };
    let config = ClientConfig::resolve(cli.layer().or(file_layer))?;
    init_tracing(config.log_json);

    let directory = HttpDirectory::from_config(&config);

    match cli.command {
        Command::Allocate => {
            let db = open_state(&config)?;
            let allocator = Allocator::with_system_clock(&directory, &db);
            let allocation = allocator.allocate().await;
            println!("IP Number:     {}", allocation.ip_number);
            println!("Serial Number: {}", allocation.serial_number);
            println!("Source:        {:?}", allocation.source);
        }
        Command::Register {
            name,
            age,
            place,
            phone,
            referral,
        } => {
            let db = open_state(&config)?;
            let details = PatientDetails {
                patient_name: name,
                age: Some(age),
                place,
                phone_number: phone,
                referral,
            };
            register(&directory, &db, &details).await?;
        }
        Command::List { filters, json } => {
            let records = fetch_roster(&directory).await?;
            let filter = RosterFilter::from(filters);
            let shown = filter.apply(&records);

            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                let summary = RosterSummary::compute(&records, Local::now().date_naive(), &Local);
                print_table(&shown);
                println!(
                    "\n{} shown / {} total / {} registered today",
                    shown.len(),
                    summary.total,
                    summary.today
                );
            }
        }
        Command::Show { id } => {
            let records = fetch_roster(&directory).await?;
            let Some(record) = records.iter().find(|r| r.id == id) else {
                bail!("no patient with id {}", id);
            };
            print_details(record);
        }
        Command::Delete { id, yes } => {
            if !yes {
                bail!("refusing to delete patient {} without --yes", id);
            }
            directory
                .delete_patient(&id)
                .await
                .context("Failed to delete patient. Please try again.")?;
            info!(id = %id, "Patient deleted");
            println!("Patient {} deleted", id);
        }
        Command::Export {
            filters,
            format,
            out,
        } => {
            let records = fetch_roster(&directory).await?;
            let filter = RosterFilter::from(filters);
            let export = RosterExport::from_records(filter.apply(&records));

            let (content, default_name) = match format {
                ExportFormat::Csv => (export.to_csv(), default_file_name(Local::now().date_naive())),
                ExportFormat::Json => (
                    export.to_json()?,
                    default_file_name(Local::now().date_naive()).replace(".csv", ".json"),
                ),
            };
            let path = out.unwrap_or_else(|| PathBuf::from(default_name));
            std::fs::write(&path, content)
                .with_context(|| format!("writing export to {}", path.display()))?;
            info!(path = %path.display(), rows = export.rows.len(), "Roster exported");
            println!("Exported {} patients to {}", export.rows.len(), path.display());
        }
        Command::Health => {
            if directory.health().await {
                println!("Directory service is up ({})", config.api_url);
            } else {
                bail!("Directory service is not reachable at {}", config.api_url);
            }
        }
        Command::Counter => {
            let db = open_state(&config)?;
            match db.read()? {
                Some(counter) => println!("{} {}", counter.date, counter.count),
                None => println!("No fallback counter stored"),
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_state(config: &ClientConfig) -> anyhow::Result<Database> {
    Database::open(&config.state_path)
        .with_context(|| format!("opening state database {}", config.state_path.display()))
}

async fn register(
    directory: &HttpDirectory,
    db: &Database,
    details: &PatientDetails,
) -> anyhow::Result<()> {
    let allocator = Allocator::with_system_clock(directory, db);
    let mut session = RegistrationSession::open(allocator).await;

    match session.submit(details).await {
        Ok(registered) => {
            println!(
                "{}",
                registered
                    .message
                    .as_deref()
                    .unwrap_or("Patient registered successfully!")
            );
            println!("IP Number:     {}", registered.ip_number);
            println!("Serial Number: {}", registered.serial_number);
            info!(next_serial_number = %registered.next.serial_number, "Form re-filled");
            Ok(())
        }
        Err(err @ RegistrationError::SerialConflict { .. }) => {
            let next = session.current();
            println!("Next IP Number:     {}", next.ip_number);
            println!("Next Serial Number: {}", next.serial_number);
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

async fn fetch_roster(directory: &HttpDirectory) -> anyhow::Result<Vec<PatientRecord>> {
    let mut records = directory.list_patients().await.context(
        "Failed to load dashboard data. Please check if the server is running.",
    )?;
    sort_newest_first(&mut records);
    Ok(records)
}

fn print_table(records: &[&PatientRecord]) {
    println!(
        "{:<26} {:<16} {:<16} {:<24} {:>4} {:<16} {:<12} {}",
        "ID", "IP Number", "Serial Number", "Patient Name", "Age", "Place", "Phone", "Registered"
    );
    for record in records {
        println!(
            "{:<26} {:<16} {:<16} {:<24} {:>4} {:<16} {:<12} {}",
            record.id,
            or_dash(&record.ip_number),
            or_dash(&record.serial_number),
            or_dash(&record.patient_name),
            or_dash(&record.age),
            or_dash(&record.place),
            record.clean_phone_number().unwrap_or_else(|| "-".into()),
            record
                .registration_date
                .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
}

fn print_details(record: &PatientRecord) {
    let na = |field: &Option<String>| field.clone().unwrap_or_else(|| "N/A".into());
    println!("IP Number:         {}", na(&record.ip_number));
    println!("Serial Number:     {}", na(&record.serial_number));
    println!("Patient Name:      {}", na(&record.patient_name));
    println!("Age:               {}", na(&record.age));
    println!("Place:             {}", na(&record.place));
    println!("Phone Number:      {}", na(&record.clean_phone_number()));
    println!("Referral:          {}", na(&record.referral));
    println!(
        "Registration Date: {}",
        record
            .registration_date
            .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "N/A".into())
    );
}

fn or_dash(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    // Only test in this binary that touches these variables
    #[test]
    fn test_flags_beat_env_beat_file() {
        std::env::remove_var("PATIENT_REGISTRY_API_URL");
        std::env::set_var("PATIENT_REGISTRY_STATE_PATH", "/tmp/from-env.db");
        std::env::set_var("PATIENT_REGISTRY_TIMEOUT_SECS", "20");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_url = "https://registry.example.org/api"
state_path = "/var/lib/registry/state.db"
timeout_secs = 30
"#
        )
        .unwrap();
        let from_file = || ConfigLayer::load(file.path()).unwrap();

        let with_flag =
            Cli::try_parse_from(["patient-registry", "--timeout-secs", "5", "health"]).unwrap();
        let config = ClientConfig::resolve(with_flag.layer().or(from_file())).unwrap();
        assert_eq!(config.api_url.as_str(), "https://registry.example.org/api");
        assert_eq!(config.state_path, PathBuf::from("/tmp/from-env.db"));
        assert_eq!(config.timeout, Duration::from_secs(5));

        let env_only = Cli::try_parse_from(["patient-registry", "health"]).unwrap();
        let config = ClientConfig::resolve(env_only.layer().or(from_file())).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));

        std::env::remove_var("PATIENT_REGISTRY_STATE_PATH");
        std::env::remove_var("PATIENT_REGISTRY_TIMEOUT_SECS");

        let file_only =
            Cli::try_parse_from(["patient-registry", "--log-json", "counter"]).unwrap();
        let config = ClientConfig::resolve(file_only.layer().or(from_file())).unwrap();
        assert_eq!(config.state_path, PathBuf::from("/var/lib/registry/state.db"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.log_json);
    }
}

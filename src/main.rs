use chrono::Utc;
use clap::{Parser, Subcommand};
use farepay::application::orchestrator::{PaymentOrchestrator, PaymentRequest};
use farepay::bootstrap::{Backend, build_orchestrator};
use farepay::config::Settings;
use farepay::domain::geo::Coordinates;
use farepay::infrastructure::argon2_pin::Argon2PinVerifier;
use farepay::infrastructure::notifications::LogNotificationSink;
use farepay::interfaces::csv::outcome_writer::{OutcomeRow, OutcomeWriter};
use farepay::interfaces::csv::payment_reader::PaymentReader;
use farepay::interfaces::seed::Seed;
use farepay::telemetry::init_tracing;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file. Defaults to $FAREPAY_CONFIG when set.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a CSV batch of fare payments and print one outcome per row
    Pay {
        /// JSON fixture with accounts, merchants, devices, routes and fares
        seed: PathBuf,
        /// Input payments CSV file
        payments: PathBuf,
    },
    /// Print the detected boarding stop and priced destinations as JSON
    Trips {
        seed: PathBuf,
        #[arg(long)]
        device_token: String,
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
}

fn open_backend(db_path: Option<&Path>) -> Result<Backend> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Backend::rocksdb(path).into_diagnostic(),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Backend::in_memory())
        }
        None => Ok(Backend::in_memory()),
    }
}

async fn prepare(cli_config: Option<&Path>, db_path: Option<&Path>, seed: &Path) -> Result<PaymentOrchestrator> {
    let settings = Settings::load(cli_config).into_diagnostic()?;
    let backend = open_backend(db_path)?;

    let pins = Argon2PinVerifier::new();
    Seed::from_path(seed)
        .into_diagnostic()?
        .apply(&backend, &pins, Utc::now())
        .await
        .into_diagnostic()?;

    Ok(build_orchestrator(
        &settings,
        &backend,
        Arc::new(pins),
        Arc::new(LogNotificationSink),
    ))
}

async fn pay(orchestrator: &PaymentOrchestrator, payments: &Path) -> Result<()> {
    let file = File::open(payments).into_diagnostic()?;
    let reader = PaymentReader::new(file);
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    for row in reader.rows() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "skipping unreadable payment row");
                continue;
            }
        };
        let reference = row.reference.clone();
        let result = match PaymentRequest::try_from(row) {
            Ok(request) => orchestrator.process_payment(request).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(%reference, code = e.code(), error = %e, "payment not completed");
        }
        writer
            .write(&OutcomeRow::from_result(&reference, &result))
            .into_diagnostic()?;
    }

    writer.flush().into_diagnostic()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Pay { seed, payments } => {
            let orchestrator =
                prepare(cli.config.as_deref(), cli.db_path.as_deref(), &seed).await?;
            pay(&orchestrator, &payments).await?;
        }
        Command::Trips {
            seed,
            device_token,
            lat,
            lon,
        } => {
            let orchestrator =
                prepare(cli.config.as_deref(), cli.db_path.as_deref(), &seed).await?;
            let payer_fix = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon).into_diagnostic()?),
                _ => None,
            };
            let options = orchestrator
                .trip_options(&device_token, payer_fix)
                .await
                .into_diagnostic()?;
            let json = serde_json::to_string_pretty(&options).into_diagnostic()?;
            println!("{json}");
        }
    }

    Ok(())
}

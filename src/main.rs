//! CLI entry point for the GTFS stop to GeoJSON converter.
//!
//! Provides subcommands for converting every operator in the directory,
//! converting a single feed archive, and listing the directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfs_stop_geojson::{
    fetch::{BasicClient, load_source},
    infra::csv_directory::CsvOperatorDirectory,
    output::append_record,
    pipeline::{OutputSettings, S3Target, parse, process_operator, resolve_operator, write},
    services::operator_directory::OperatorDirectory,
    stats::{ConversionReport, FailureKind},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_stop_geojson")]
#[command(about = "Converts GTFS bus stops into localized GeoJSON, one file per operator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the feed of every operator in the directory
    Convert {
        /// Operator directory CSV (operator_id, operator, operator:en, url)
        #[arg(short, long, default_value = "agency_table.csv")]
        directory: PathBuf,

        /// Directory the GeoJSON files are written to
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,

        /// Maximum number of operators converted at once
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Optional: CSV file to append one report row per operator to
        #[arg(short, long)]
        report: Option<String>,

        /// Optional: S3 bucket name to also upload documents to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress documents before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Convert a single GTFS archive from a file or URL
    ConvertFeed {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Operator directory used to resolve the feed's agency
        #[arg(short, long, default_value = "agency_table.csv")]
        directory: PathBuf,

        /// Directory the GeoJSON file is written to
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,

        /// Optional: CSV file to append the report row to
        #[arg(short, long)]
        report: Option<String>,
    },
    /// List the operators in the directory
    ListOperators {
        /// Operator directory CSV
        #[arg(short, long, default_value = "agency_table.csv")]
        directory: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_stop_geojson.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_stop_geojson.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            directory,
            output_dir,
            concurrency,
            report,
            s3_bucket,
            gzip,
        } => {
            let s3 = match s3_bucket {
                Some(bucket) => {
                    info!(bucket = %bucket, gzip, "S3 upload enabled");
                    let config = aws_config::load_from_env().await;
                    Some(S3Target {
                        client: aws_sdk_s3::Client::new(&config),
                        bucket,
                        gzip,
                    })
                }
                None => None,
            };
            let settings = OutputSettings { output_dir, s3 };
            convert_all(&directory, settings, concurrency, report).await?;
        }
        Commands::ConvertFeed {
            source,
            directory,
            output_dir,
            report,
        } => {
            let row = convert_feed(&source, &directory, &OutputSettings::local(output_dir)).await?;
            if let Some(path) = report {
                append_record(&path, &row)?;
            }
            row.ensure_success()?;
        }
        Commands::ListOperators { directory } => {
            let operators = CsvOperatorDirectory::new(&directory).list_operators().await?;

            for operator in &operators {
                info!(
                    operator_id = %operator.id,
                    operator = %operator.name,
                    operator_en = %operator.name_en,
                    url = %operator.url,
                    file = %operator.document_file_name(),
                    "Operator"
                );
            }
            info!(total = operators.len(), "Operator list summary");
        }
    }

    Ok(())
}

/// Converts every operator in the directory, at most `concurrency` at a time.
///
/// A failed operator is reported and skipped; only an unreadable directory
/// aborts the run.
#[tracing::instrument(skip(directory, settings, report), fields(directory = %directory.display()))]
async fn convert_all(
    directory: &Path,
    settings: OutputSettings,
    concurrency: usize,
    report: Option<String>,
) -> Result<()> {
    let operators = CsvOperatorDirectory::new(directory)
        .list_operators()
        .await
        .context("failed to load operator directory")?;
    info!(operator_count = operators.len(), "Operators ready for processing");

    let client = Arc::new(BasicClient::new()?);
    let settings = Arc::new(settings);
    // With a single permit operators run strictly one at a time.
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));

    let mut tasks = vec![];

    for operator in operators {
        let sem = semaphore.clone();
        let client = client.clone();
        let settings = settings.clone();

        let task = tokio::spawn(async move {
            let _permit = sem.acquire().await;
            process_operator(client.as_ref(), &operator, &settings).await
        });

        tasks.push(task);
    }

    let total = tasks.len();
    let mut failed = 0;

    for task in tasks {
        let row = match task.await {
            Ok(row) => row,
            Err(e) => {
                error!(error = %e, "Operator task panicked");
                failed += 1;
                continue;
            }
        };

        if row.is_error() {
            failed += 1;
        }

        if let Some(path) = &report {
            if let Err(e) = append_record(path, &row) {
                error!(error = %e, "Failed to write report row");
            }
        }
    }

    info!(total, failed, output_dir = %settings.output_dir.display(), "Finished processing all operators");
    Ok(())
}

/// Converts a single archive, resolving its operator through the directory.
///
/// A write failure comes back as an error row so it can still be reported.
#[tracing::instrument(skip(directory, settings), fields(directory = %directory.display()))]
async fn convert_feed(
    source: &str,
    directory: &Path,
    settings: &OutputSettings,
) -> Result<ConversionReport> {
    let operators = CsvOperatorDirectory::new(directory).list_operators().await?;

    let client = BasicClient::new()?;
    let bytes = load_source(&client, source).await?;
    let tables = parse(bytes)
        .await
        .with_context(|| format!("failed to parse {source}"))?;
    let ctx = resolve_operator(&operators, &tables)?;

    let row = ConversionReport::from_tables(&tables).with_context(&ctx);
    match write(&ctx, &tables, settings, row).await {
        Ok(row) => {
            info!("{} -> {}", source, ctx.operator.document_file_name());
            Ok(row)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Conversion failed");
            Ok(ConversionReport::from_error(FailureKind::Write, &format!("{e:#}")).with_context(&ctx))
        }
    }
}

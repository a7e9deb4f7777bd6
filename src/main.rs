//! Delirisk: delirium risk scoring at intake.
//!
//! Reads one form submission (JSON) from a file argument or stdin, scores it
//! and exports the record to the configured collector.
//!
//! Usage:
//!   delirisk [submission.json | -]
//!   delirisk --diagnoses

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use delirisk::adapters::form::{diagnosis_options, read_submission, read_submission_file};
use delirisk::adapters::http::HttpExporter;
use delirisk::adapters::model::load_artifacts;
use delirisk::adapters::sanitize::SanitizingMakeWriter;
use delirisk::adapters::sqlite::SqliteExporter;
use delirisk::application::{DeliveryStatus, ScoringService};
use delirisk::config::{ExportTarget, LogMode, Settings};
use delirisk::ports::Exporter;

fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    // Results go to stdout; keep logs out of an interactive terminal.
    let use_file = match settings.log_mode {
        LogMode::File => true,
        LogMode::Stdout => false,
        LogMode::Auto => std::io::stdout().is_terminal(),
    };

    let (writer, _guard) = if use_file {
        if let Some(parent) = settings.log_file.parent() {
            // Startup continues without the directory; open() reports the failure.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_file)
            .with_context(|| format!("opening log file {}", settings.log_file.display()))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Delirisk...");

    let artifacts = load_artifacts(&settings.model_dir, settings.require_manifest)
        .with_context(|| format!("loading model from {}", settings.model_dir.display()))?;

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--diagnoses") {
        for name in diagnosis_options(&artifacts.catalog) {
            println!("{name}");
        }
        return Ok(());
    }

    let input = match arg.as_deref() {
        None | Some("-") => read_submission(std::io::stdin().lock())?,
        Some(path) => read_submission_file(Path::new(path))?,
    };

    let mut service = ScoringService::new(Arc::new(artifacts.catalog), Arc::new(artifacts.model));
    if let Some(exporter) = build_exporter(&settings.export)? {
        service = service.with_exporter(exporter);
    }

    let outcome = service.score(&input)?;
    let record = &outcome.record;

    println!("Risk: {}", record.risk_tier().label());
    println!("{}", record.risk_tier().description());
    println!("Record: {}", record.unique_identifier());
    println!("Captured: {}", record.timestamp());

    match &outcome.delivery {
        DeliveryStatus::Delivered => println!("Record exported."),
        DeliveryStatus::Skipped => println!("Export disabled; record not sent."),
        DeliveryStatus::Failed(e) => eprintln!("Warning: record could not be exported: {e}"),
    }

    tracing::info!("Delirisk shutdown complete.");
    Ok(())
}

fn build_exporter(target: &ExportTarget) -> Result<Option<Arc<dyn Exporter>>> {
    let exporter: Arc<dyn Exporter> = match target {
        ExportTarget::Http { url, timeout } => Arc::new(HttpExporter::new(url.clone(), *timeout)?),
        ExportTarget::Sqlite { path } => Arc::new(
            SqliteExporter::new(path)
                .with_context(|| format!("opening record store {}", path.display()))?,
        ),
        ExportTarget::Disabled => return Ok(None),
    };
    tracing::info!("Exporting records via {}", exporter.target());
    Ok(Some(exporter))
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;

use crate::config::AppConfig;
use crate::data;
use crate::models::processing::DailyStats;
use crate::services::classification_service;
use crate::services::correction_service;
use crate::services::extraction_service;
use crate::services::file_service::LocalFiles;
use crate::services::ocr_service::{TesseractOcr, TextSource};
use crate::services::pipeline_service::{Pipeline, PipelineSettings};
use crate::services::record_service::AirtableClient;
use crate::services::rename_service;
use crate::services::report_service;
use crate::services::watch_service::{self, WatchSession};

#[derive(Parser)]
#[command(name = "mailroom")]
#[command(about = "Scanned-letter intake: OCR, classify, file and record")]
#[command(version)]
pub struct Cli {
    /// Audit database path (overrides MAILROOM_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process what is already in the scan folders, then watch for new letters
    Watch,

    /// Process specific files once
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show how a letter would be classified and named, without changing anything
    Classify {
        file: PathBuf,
        /// Treat FILE as plain text instead of running OCR
        #[arg(long)]
        text: bool,
    },

    /// Daily summary from the audit log
    Stats {
        /// Day to report (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List letters that could not be classified
    Unknown {
        /// Only this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Record the correct type for a misclassified letter
    Correct {
        /// File name as it appears in the audit log
        file_name: String,
        /// Document type label, e.g. "IR Ack"; close matches are accepted
        document_type: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Correction counts by type and the most recent corrections
    Corrections {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?.with_database_path(cli.db.as_deref());

    match cli.command {
        Commands::Watch => cmd_watch(&config),
        Commands::Process { files } => cmd_process(&config, &files),
        Commands::Classify { file, text } => cmd_classify(&config, &file, text),
        Commands::Stats { date } => cmd_stats(&config, date.as_deref()),
        Commands::Unknown { date, limit } => cmd_unknown(&config, date.as_deref(), limit),
        Commands::Correct {
            file_name,
            document_type,
            note,
        } => cmd_correct(&config, &file_name, &document_type, note.as_deref()),
        Commands::Corrections { limit } => cmd_corrections(&config, limit),
    }
}

fn open_db(config: &AppConfig) -> anyhow::Result<Connection> {
    data::open(&config.database_path).with_context(|| {
        format!(
            "failed to open audit database at {}",
            config.database_path.display()
        )
    })
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<Pipeline> {
    let folders = config.folders()?;
    let records = AirtableClient::new(config.airtable()?)?;
    let db = Arc::new(Mutex::new(open_db(config)?));

    let settings = PipelineSettings {
        clients_root: folders.clients_root(),
        letters_subfolder: folders.letters_subfolder.clone(),
        history_policy: config.history_policy,
        date_override: None,
    };
    Ok(Pipeline::new(
        Box::new(TesseractOcr::new(config.ocr_max_pages, config.ocr_dpi)),
        Box::new(records),
        Box::new(LocalFiles),
        settings,
    )
    .with_audit_db(db))
}

fn cmd_watch(config: &AppConfig) -> anyhow::Result<()> {
    let dirs = watch_service::monitored_dirs(config.folders()?)?;
    let pipeline = build_pipeline(config)?;

    let session = WatchSession::start(pipeline, &dirs, config.settle_delay)?;
    info!("press Ctrl-C to stop");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl-C")?;

    info!("shutting down, waiting for the current file");
    let stats = session.shutdown()?;
    info!("daily summary: {}", stats.summary_line());
    Ok(())
}

fn cmd_process(config: &AppConfig, files: &[PathBuf]) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let mut stats = DailyStats::new(Local::now().date_naive());

    for file in files {
        if !file.is_file() {
            eprintln!("{}: not a file", file.display());
            continue;
        }
        let report = pipeline.process(file);
        stats.record(report.outcome, report.document_type);

        let mut line = format!("{}: {}", report.file_name(), report.outcome.as_str());
        if let Some(t) = report.document_type {
            line.push_str(&format!(" [{t}]"));
        }
        if let Some(new_path) = &report.new_path {
            line.push_str(&format!(" -> {}", new_path.display()));
        }
        if let Some(failure) = &report.failure {
            line.push_str(&format!(" ({failure})"));
        }
        if report.manual_intervention {
            line.push_str(" MANUAL INTERVENTION REQUIRED");
        }
        println!("{line}");
    }

    println!("{}", stats.summary_line());
    Ok(())
}

fn cmd_classify(config: &AppConfig, file: &Path, as_text: bool) -> anyhow::Result<()> {
    let text = if as_text {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    } else {
        TesseractOcr::new(config.ocr_max_pages, config.ocr_dpi)
            .extract_text(file)?
            .unwrap_or_default()
    };

    let result = classification_service::classify(&text);
    let fields = extraction_service::extract_for_type(&text, result.document_type);
    let (case_id, client_name) = (fields.case_id.as_deref(), fields.client_name.as_deref());

    println!("Type:        {}", result.document_type);
    println!("Confidence:  {:.2}", result.confidence);
    println!("Reason:      {}", result.reason);
    println!("Case ID:     {}", case_id.unwrap_or("-"));
    println!("Client:      {}", client_name.unwrap_or("-"));
    if extraction_service::validate_for_type(case_id, client_name, result.document_type) {
        println!(
            "Filename:    {}",
            rename_service::generate_filename(&result, client_name, None)
        );
    } else if result.document_type.is_known() {
        let missing = extraction_service::missing_fields(case_id, client_name, result.document_type);
        println!("Missing:     {}", missing.join(", "));
    }
    Ok(())
}

fn cmd_stats(config: &AppConfig, date: Option<&str>) -> anyhow::Result<()> {
    let day = match date {
        Some(raw) => report_service::parse_date(raw)?,
        None => Local::now().date_naive(),
    };
    let conn = open_db(config)?;
    let (stats, entries) = report_service::daily_stats(&conn, day)?;
    print!("{}", report_service::format_daily_report(&stats, &entries));
    Ok(())
}

fn cmd_unknown(config: &AppConfig, date: Option<&str>, limit: u32) -> anyhow::Result<()> {
    let day = date.map(report_service::parse_date).transpose()?;
    let conn = open_db(config)?;
    let entries = report_service::unknown_documents(&conn, day, limit)?;
    print!("{}", report_service::format_unknown(&entries));
    Ok(())
}

fn cmd_correct(
    config: &AppConfig,
    file_name: &str,
    document_type: &str,
    note: Option<&str>,
) -> anyhow::Result<()> {
    let conn = open_db(config)?;
    let correction = correction_service::record_correction(&conn, file_name, document_type, note)?;
    println!(
        "{}: {} -> {}",
        correction.file_name,
        correction
            .original_type
            .map(|t| t.label())
            .unwrap_or("-"),
        correction.corrected_type
    );
    Ok(())
}

fn cmd_corrections(config: &AppConfig, limit: u32) -> anyhow::Result<()> {
    let conn = open_db(config)?;
    let counts = data::repository::correction_counts(&conn)?;
    let recent = data::repository::list_corrections(&conn, limit)?;
    print!("{}", correction_service::format_corrections(&counts, &recent));
    Ok(())
}

// # -----------------------------
// # crates/cli/src/main.rs
// # -----------------------------
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use daily_prompt_backend_brevo::BrevoMailer;
use daily_prompt_backend_openai::OpenAiGenerator;
use daily_prompt_cli::core::{
    render, AppConfig, DailyPromptError, DailyRunner, Delivery, HistoryLog, RunOutcome,
    RunSettings,
};

#[derive(Parser, Debug)]
#[command(
    name = "daily-prompt",
    version,
    about = "Generate, record and email one journaling question a day in five languages",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to $DAILY_PROMPT_CONFIG, then ./daily-prompt.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error, off). Overrides RUST_LOG if set.
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Enable structured JSON logging
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate today's entry, append it to the history log and email it (default)
    Run {
        /// Generate and print the message without appending or sending
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the most recent entries
    Show {
        #[arg(long, default_value_t = 5)]
        tail: usize,
    },
    /// Report malformed lines and duplicate dates in the history log
    Check,
}

fn init_logging(log_level: Option<&str>, json_logs: bool) -> Result<()> {
    // CLI arg overrides RUST_LOG
    let filter = if let Some(level) = log_level {
        match level.to_lowercase().as_str() {
            "off" => EnvFilter::new("off"),
            "error" => EnvFilter::new("error"),
            "warn" | "warning" => EnvFilter::new("warn"),
            "info" => EnvFilter::new("info"),
            "debug" => EnvFilter::new("debug"),
            "trace" => EnvFilter::new("trace"),
            _ => {
                eprintln!("Warning: Invalid log level '{}', using 'info'", level);
                EnvFilter::new("info")
            }
        }
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = if json_logs {
        builder
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init()
    } else {
        // Less noise for human reading
        builder.with_target(false).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("initialise logging: {e}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_level.as_deref(), cli.json_logs) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }
    tracing::debug!("CLI arguments: {:?}", cli);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => match err.downcast_ref::<DailyPromptError>() {
            Some(typed) => report(typed),
            None => {
                tracing::error!(error = %format!("{err:#}"), "run failed");
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config)?;
    match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => run(&config, dry_run).await,
        Commands::Show { tail } => show(&config, tail),
        Commands::Check => check(&config),
    }
}

async fn run(config: &AppConfig, dry_run: bool) -> Result<ExitCode> {
    // Resolve every credential before any file or network access.
    let generation = config.generation_settings()?;
    let delivery = if dry_run {
        None
    } else {
        let (settings, sender, recipient) = config.delivery_settings()?;
        let mailer = BrevoMailer::new(settings).context("build delivery client")?;
        Some(Delivery {
            mailer: Box::new(mailer),
            sender,
            recipient,
        })
    };
    let generator = OpenAiGenerator::new(generation).context("build generation client")?;

    let runner = DailyRunner::new(
        RunSettings::from_config(config, dry_run),
        Box::new(generator),
        delivery,
    );

    match runner.run(Utc::now()).await? {
        RunOutcome::Delivered { entry, subject } => {
            println!("Delivered '{subject}' ({})", entry.date);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::AlreadyGenerated { date } => {
            println!("Entry for {date} already generated; nothing to do");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::DryRun { subject, body, .. } => {
            println!("Subject: {subject}\n\n{body}");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::CommittedDeliveryFailed { entry, error } => {
            eprintln!("Entry for {} was committed to the history log.", entry.date);
            Ok(report(&error))
        }
    }
}

fn show(config: &AppConfig, tail: usize) -> Result<ExitCode> {
    let (log, report) = HistoryLog::read(&config.history_path, config.timezone)?;
    for (i, entry) in log.tail(tail).iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", render::body(entry));
    }
    for skipped in &report.skipped {
        eprintln!("skipped line {}: {}", skipped.line_number, skipped.reason);
    }
    Ok(ExitCode::SUCCESS)
}

fn check(config: &AppConfig) -> Result<ExitCode> {
    let (log, report) = HistoryLog::read(&config.history_path, config.timezone)?;
    let duplicates = log.duplicate_dates();

    println!("{}: {} entries", log.path().display(), log.len());
    if report.legacy > 0 {
        println!("{} entries in the five-line format", report.legacy);
    }
    for skipped in &report.skipped {
        println!("malformed line {}: {}", skipped.line_number, skipped.reason);
    }
    for (date, count) in &duplicates {
        println!("duplicate date {date}: {count} entries");
    }

    if report.is_clean() && duplicates.is_empty() {
        println!("ok");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn report(err: &DailyPromptError) -> ExitCode {
    tracing::error!(code = err.error_code(), error = %err, "run failed");
    eprintln!("error[{}]: {}", err.error_code(), err);
    for hint in err.recovery_hints() {
        eprintln!("  hint: {hint}");
    }
    ExitCode::from(err.exit_code())
}

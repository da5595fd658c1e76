use clap::{Parser, Subcommand};
use mediapress::app_log;
use mediapress::config::Settings;
use mediapress::error::{PressError, PressResult};
use mediapress::events::LoggingSink;
use mediapress::logger::{init_tracing, LogLevel, LOGGER};
use mediapress::pipeline::{
    create_standard_pipeline, CancelHandle, Outcome, PipelineResult, StageResult, StageValue,
};
use mediapress::providers::ProviderSet;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "mediapress", about = "Turn a media recording into a published article", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline on a media file
    Run {
        /// Audio or video file to process
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Settings file (defaults to $MEDIAPRESS_CONFIG or the user config dir)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Use local stand-in providers instead of ffmpeg and remote services
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which providers are configured
    Check {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Write default settings to the user config dir
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn execute(command: Command) -> PressResult<ExitCode> {
    match command {
        Command::Run {
            file,
            config,
            dry_run,
            json,
        } => {
            let settings = Settings::load(config.as_deref())?;
            init_logging(&settings);

            let providers = if dry_run {
                ProviderSet::mock(settings.extractor.work_dir())
            } else {
                ProviderSet::from_settings(&settings)?
            };
            let pipeline = create_standard_pipeline(&providers, &settings)?;

            let cancel = CancelHandle::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    app_log!(LogLevel::Warn, "cli", "Interrupt received, cancelling run");
                    signal.cancel();
                }
            });

            let result = pipeline.run_file(file, &cancel, &LoggingSink).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
            if result.outcome == Outcome::Failed {
                print_log_tail();
            }

            Ok(exit_code(result.outcome))
        }
        Command::Check { config } => {
            let settings = Settings::load(config.as_deref())?;
            let providers = ProviderSet::from_settings(&settings)?;

            for (name, available) in providers.availability() {
                let status = if available { "configured" } else { "not configured" };
                println!("{:<16} {}", name, status);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { force } => {
            let path = Settings::default_path()
                .ok_or_else(|| PressError::ConfigError("No user config directory".to_string()))?;
            if path.exists() && !force {
                return Err(PressError::ConfigError(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            Settings::default().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(settings: &Settings) {
    let level = settings.logging.level();
    init_tracing(level);
    LOGGER.set_min_level(level);
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Success => ExitCode::SUCCESS,
        Outcome::PartialSuccess => ExitCode::from(2),
        Outcome::Failed => ExitCode::from(1),
    }
}

fn print_report(result: &PipelineResult) {
    println!("{} ({}): {}", result.pipeline_name, result.run_id, result.outcome);
    for record in &result.stages {
        let detail = match &record.result {
            StageResult::Succeeded(value) => format!("ok       {}", value.summary()),
            StageResult::Skipped(reason) => format!("skipped  {}", reason),
            StageResult::Failed { kind, message } => format!("failed   {}: {}", kind, message),
        };
        println!("  {:<12} {:>7}ms  {}", record.stage_id, record.duration_ms, detail);
    }
    for warning in &result.cleanup_warnings {
        println!("  cleanup warning: {}", warning);
    }
    match result.last_succeeded_value() {
        Some(StageValue::Text(text)) => println!("\n{}", text),
        Some(StageValue::Receipt(receipt)) => {
            println!("\n{}", receipt.locator.as_deref().unwrap_or(&receipt.message))
        }
        _ => {}
    }
}

fn print_log_tail() {
    let tail = LOGGER.tail(20);
    if tail.is_empty() {
        return;
    }
    eprintln!("\nRecent log:");
    for entry in tail {
        eprintln!(
            "  {} {:<5} [{}] {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.source,
            entry.message
        );
    }
}

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use text_to_audio::app;
use text_to_audio::cli::Cli;
use text_to_audio::error::{AppError, ExitStatus};
use text_to_audio::infrastructure::config::{Config, LogFormat, LogLevel};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with status 2 from inside clap
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitStatus::Setup.into();
        }
    };
    app::apply_overrides(&mut config, &cli);

    // Initialize logging
    init_logging(config.log_format, config.log_level);

    let abort = app::interrupt_signal();
    let result = match app::run(&cli, &config, abort).await {
        Ok(report) => print_report(&report).map(|()| ExitStatus::from_report(&report)),
        Err(e) => Err(e),
    };

    match result {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!(error = %e, "Conversion failed");
            eprintln!("error: {}", e);
            e.exit_status().into()
        }
    }
}

fn print_report(report: &text_to_audio::domain::pipeline::RunReport) -> Result<(), AppError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", report).context("failed to print run report")?;
    Ok(())
}

fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("text_to_audio={}", level.as_str()).into());

    // stdout carries the run report, logs go to stderr
    if format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

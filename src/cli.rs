//! Command-line interface for text-to-audio

use crate::domain::audio::OutputFormat;
use crate::infrastructure::config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Convert long text documents into a single audio file with Yandex SpeechKit
#[derive(Parser, Debug)]
#[command(name = "text-to-audio", version)]
pub struct Cli {
    /// Input document (.txt, .md, .markdown, .html, .htm)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output audio file
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Output format (default: DEFAULT_FORMAT or wav)
    #[arg(short, long, value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Directory for intermediate chunk audio (default: TEMP_DIR)
    #[arg(long, value_name = "PATH")]
    pub temp_dir: Option<PathBuf>,

    /// Log verbosity (default: LOG_LEVEL or info)
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Voice override
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Speaking role / emotion override
    #[arg(long, value_name = "ROLE")]
    pub role: Option<String>,
}

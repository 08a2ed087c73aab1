use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tfetch",
    about = "Fetch YouTube transcripts with automatic fallback across caption sources",
    version,
    long_about = "A CLI tool that retrieves video transcripts by trying an ordered chain of \
caption sources (watch page, player API, yt-dlp, Data API, scraping service) until one \
succeeds, with retries and a circuit breaker guarding flaky upstreams."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript for a video
    Fetch {
        /// Video id or URL (watch, youtu.be, shorts, embed, live)
        #[arg(value_name = "VIDEO")]
        input: String,

        /// Preferred caption languages, in order ("*" matches any)
        #[arg(short, long, value_delimiter = ',', default_value = "en,*")]
        languages: Vec<String>,

        /// Omit the [HH:MM:SS] prefix on each line
        #[arg(long)]
        no_timestamps: bool,

        /// Per-strategy timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the configured extraction strategies in try order
    Strategies,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text transcript
    Text,
    /// Full outcome as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod captions;
mod classify;
mod cli;
mod config;
mod orchestrator;
mod output;
mod resilience;
mod strategies;
mod token;
mod utils;

use cli::{Cli, Commands};
use config::Config;
use orchestrator::{ExtractionOrchestrator, ExtractionOutcome};
use strategies::ExtractionOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "transcript_fetcher=debug"
    } else {
        "transcript_fetcher=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Fetch {
            input,
            languages,
            no_timestamps,
            timeout_ms,
            output,
            format,
        } => {
            // Optional; only the yt-dlp strategy needs an external binary.
            let missing_deps = utils::check_dependencies().await;
            if !missing_deps.is_empty() {
                for dep in missing_deps {
                    tracing::warn!("{}", dep);
                }
            }

            let orchestrator = ExtractionOrchestrator::from_config(&config);
            let defaults = config.default_options();
            let options = ExtractionOptions {
                preferred_languages: languages,
                include_timestamps: !no_timestamps,
                timeout_ms: timeout_ms.unwrap_or(defaults.timeout_ms),
            };

            let spinner = if cli.quiet {
                None
            } else {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_message(format!("Fetching transcript for {}", input));
                bar.enable_steady_tick(Duration::from_millis(100));
                Some(bar)
            };

            let outcome = orchestrator.extract(&input, Some(options)).await;

            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            match output {
                Some(path) => {
                    output::save_to_file(&outcome, &path, &format).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&outcome, &format)?;
                }
            }

            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Strategies => {
            let orchestrator = ExtractionOrchestrator::from_config(&config);
            println!("Strategies in try order:");
            for descriptor in orchestrator.descriptors() {
                let status = if descriptor.enabled { "enabled" } else { "disabled" };
                println!(
                    "  {:<14} priority {:>3}  timeout {:>6}ms  {}",
                    descriptor.name, descriptor.priority, descriptor.timeout_ms, status
                );
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written; edit it and re-run with --show to review.");
            }
        }
    }

    Ok(())
}

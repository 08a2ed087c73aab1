//! Transcript Fetcher - resilient YouTube transcript extraction.
//!
//! Retrieves video transcripts by trying an ordered chain of caption
//! backends until one succeeds. Each attempt runs behind a circuit breaker,
//! transient failures are retried with jittered exponential backoff, and raw
//! caption payloads (WebVTT, SRT, timed-text XML) are normalized into a
//! single deduplicated transcript.

pub mod captions;
pub mod classify;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod output;
pub mod resilience;
pub mod strategies;
pub mod token;
pub mod utils;

pub use classify::{ErrorKind, ExtractionError};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use orchestrator::{ExtractionOrchestrator, ExtractionOutcome};
pub use strategies::{ExtractionOptions, TranscriptPayload, TranscriptStrategy};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

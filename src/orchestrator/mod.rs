//! Ordered fallback orchestration: try each enabled, available strategy in
//! priority order behind the shared circuit breaker until one yields a
//! transcript.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{ErrorKind, ExtractionError};
use crate::config::Config;
use crate::resilience::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use crate::strategies::{
    data_api::DataApiStrategy, innertube::InnertubeStrategy, scraping_api::ScrapingApiStrategy,
    watch_page::WatchPageStrategy, ytdlp::YtdlpStrategy, ExtractionOptions, StrategyDescriptor,
    TranscriptStrategy,
};
use crate::token::TokenProvider;
use crate::utils;

/// Final result of one extraction request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success {
        transcript: String,
        /// Name of the strategy that produced the transcript
        source_strategy: String,
        segment_count: usize,
    },
    Failure {
        message: String,
        kind: ErrorKind,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    fn failure(error: ExtractionError) -> Self {
        ExtractionOutcome::Failure {
            message: error.message,
            kind: error.kind,
        }
    }
}

/// One failed strategy attempt, kept in loop-encounter order
#[derive(Debug, Clone)]
struct RecordedFailure {
    strategy: String,
    position: usize,
    error: ExtractionError,
}

/// Drives the fallback loop over an ordered strategy list.
///
/// By default one circuit breaker is shared across all strategies and all
/// concurrent requests: sustained upstream failure from any backend opens it
/// and fails every attempt fast until the open timeout elapses. Per-strategy
/// breakers are available behind `breaker.per_strategy`.
pub struct ExtractionOrchestrator {
    strategies: Vec<Arc<dyn TranscriptStrategy>>,
    shared_breaker: Arc<CircuitBreaker>,
    per_strategy_breakers: Option<Vec<Arc<CircuitBreaker>>>,
    defaults: ExtractionOptions,
}

impl ExtractionOrchestrator {
    /// Assemble the orchestrator from configuration, registering every
    /// enabled backend and applying the memory gate to the player-API one.
    pub fn from_config(config: &Config) -> Self {
        let mut strategies: Vec<Arc<dyn TranscriptStrategy>> = Vec::new();

        strategies.push(Arc::new(WatchPageStrategy::new(
            config.strategies.watch_page.enabled,
            config.retry.clone(),
        )));

        let innertube = &config.strategies.innertube;
        if InnertubeStrategy::has_memory_headroom(innertube.min_free_memory_mb) {
            strategies.push(Arc::new(InnertubeStrategy::new(
                innertube.enabled,
                innertube.min_free_memory_mb,
            )));
        } else {
            tracing::warn!(
                min_free_memory_mb = innertube.min_free_memory_mb,
                "memory headroom too low, player-api strategy not registered"
            );
        }

        strategies.push(Arc::new(YtdlpStrategy::new(
            config.strategies.ytdlp.enabled,
            config.strategies.ytdlp.path.clone(),
        )));

        strategies.push(Arc::new(DataApiStrategy::new(
            config.strategies.data_api.enabled,
            config.strategies.data_api.api_key.clone(),
        )));

        let scraping = &config.strategies.scraping_api;
        let token_provider = Arc::new(TokenProvider::new(
            scraping.token_endpoint.clone(),
            Duration::from_secs(scraping.token_ttl_secs),
        ));
        strategies.push(Arc::new(ScrapingApiStrategy::new(
            scraping.enabled,
            scraping.endpoint.clone(),
            token_provider,
        )));

        Self::new(
            strategies,
            config.breaker_config(),
            config.breaker.per_strategy,
            config.default_options(),
        )
    }

    /// Build from an explicit strategy list. Strategies are stable-sorted by
    /// priority once here; equal priorities keep registration order.
    pub fn new(
        mut strategies: Vec<Arc<dyn TranscriptStrategy>>,
        breaker_config: CircuitBreakerConfig,
        per_strategy_breakers: bool,
        defaults: ExtractionOptions,
    ) -> Self {
        strategies.sort_by_key(|strategy| strategy.priority());

        let per_strategy = per_strategy_breakers.then(|| {
            strategies
                .iter()
                .map(|strategy| {
                    Arc::new(CircuitBreaker::new(strategy.name(), breaker_config.clone()))
                })
                .collect()
        });

        Self {
            strategies,
            shared_breaker: Arc::new(CircuitBreaker::new("extraction", breaker_config)),
            per_strategy_breakers: per_strategy,
            defaults,
        }
    }

    /// Static descriptors of the registered strategies, in try order.
    pub fn descriptors(&self) -> Vec<StrategyDescriptor> {
        self.strategies
            .iter()
            .map(|strategy| StrategyDescriptor {
                name: strategy.name().to_string(),
                priority: strategy.priority(),
                timeout_ms: self.defaults.timeout_ms,
                enabled: strategy.is_enabled(),
            })
            .collect()
    }

    pub fn breaker_snapshot(&self) -> CircuitBreakerSnapshot {
        self.shared_breaker.snapshot()
    }

    pub fn default_options(&self) -> ExtractionOptions {
        self.defaults.clone()
    }

    fn breaker_for(&self, index: usize) -> &CircuitBreaker {
        match &self.per_strategy_breakers {
            Some(breakers) => &breakers[index],
            None => &self.shared_breaker,
        }
    }

    /// Run the fallback loop for one video.
    ///
    /// Resolves the input to a canonical id, then tries each enabled and
    /// available strategy in priority order. The first success wins; a
    /// permanent failure (private, unavailable, live) stops the loop; a
    /// breaker-open rejection is recorded but does not abort the loop. When
    /// everything fails, the most actionable recorded failure is surfaced.
    pub async fn extract(&self, input: &str, options: Option<ExtractionOptions>) -> ExtractionOutcome {
        let options = options.unwrap_or_else(|| self.defaults.clone());

        let Some(video_id) = utils::resolve_video_id(input) else {
            return ExtractionOutcome::failure(ExtractionError::new(
                ErrorKind::Unknown,
                format!("could not resolve a video id from '{}'", input),
            ));
        };

        let timeout = Duration::from_millis(options.timeout_ms);
        let mut recorded: Vec<RecordedFailure> = Vec::new();
        let mut position = 0usize;

        for (index, strategy) in self.strategies.iter().enumerate() {
            if !strategy.is_enabled() {
                tracing::debug!(strategy = strategy.name(), "skipping disabled strategy");
                continue;
            }
            if !strategy.is_available().await {
                tracing::debug!(strategy = strategy.name(), "skipping unavailable strategy");
                continue;
            }

            position += 1;
            tracing::info!(
                strategy = strategy.name(),
                position,
                video_id = %video_id,
                "attempting extraction"
            );

            let attempt = self
                .breaker_for(index)
                .execute(|| async {
                    match tokio::time::timeout(timeout, strategy.extract(&video_id, &options)).await
                    {
                        Ok(result) => result,
                        // The raced operation's eventual result is discarded.
                        Err(_) => Err(ExtractionError::new(
                            ErrorKind::Timeout,
                            format!(
                                "strategy '{}' timed out after {}ms",
                                strategy.name(),
                                options.timeout_ms
                            ),
                        )),
                    }
                })
                .await;

            match attempt {
                Ok(payload) => {
                    if position > 1 {
                        tracing::warn!(
                            strategy = strategy.name(),
                            position,
                            "degraded: transcript served by a non-primary strategy"
                        );
                    }
                    return ExtractionOutcome::Success {
                        transcript: payload.text,
                        source_strategy: strategy.name().to_string(),
                        segment_count: payload.segment_count,
                    };
                }
                Err(BreakerError::Open { name }) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        breaker = %name,
                        "breaker open, strategy rejected without attempt"
                    );
                    recorded.push(RecordedFailure {
                        strategy: strategy.name().to_string(),
                        position,
                        error: ExtractionError::new(
                            ErrorKind::Unknown,
                            format!("circuit breaker '{}' is open", name),
                        ),
                    });
                }
                Err(BreakerError::Inner(error)) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        kind = %error.kind,
                        message = %error.message,
                        "strategy failed"
                    );
                    let permanent = error.kind.is_permanent();
                    recorded.push(RecordedFailure {
                        strategy: strategy.name().to_string(),
                        position,
                        error: error.clone(),
                    });
                    if permanent {
                        // A video-level condition; no other backend can help.
                        return ExtractionOutcome::failure(error);
                    }
                }
            }
        }

        match select_best_failure(&recorded) {
            Some(failure) => {
                tracing::info!(
                    strategy = %failure.strategy,
                    kind = %failure.error.kind,
                    attempts = recorded.len(),
                    "all strategies failed"
                );
                ExtractionOutcome::failure(failure.error.clone())
            }
            None => ExtractionOutcome::failure(ExtractionError::new(
                ErrorKind::Unknown,
                "no extraction strategies available",
            )),
        }
    }
}

/// Pick the most actionable recorded failure; ties go to the failure
/// observed earliest in the loop (`min_by_key` keeps the first minimum).
fn select_best_failure(recorded: &[RecordedFailure]) -> Option<&RecordedFailure> {
    recorded
        .iter()
        .min_by_key(|failure| failure.error.kind.surface_priority())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{MockTranscriptStrategy, TranscriptPayload};
    use async_trait::async_trait;

    fn test_breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout_ms: 1_000,
            success_threshold: 2,
        }
    }

    fn orchestrator(strategies: Vec<Arc<dyn TranscriptStrategy>>) -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(
            strategies,
            test_breaker_config(),
            false,
            ExtractionOptions::default(),
        )
    }

    fn mock(name: &'static str, priority: u32) -> MockTranscriptStrategy {
        let mut strategy = MockTranscriptStrategy::new();
        strategy.expect_name().return_const(name);
        strategy.expect_priority().return_const(priority);
        strategy.expect_is_enabled().return_const(true);
        strategy.expect_is_available().returning(|| true);
        strategy
    }

    fn success_payload() -> TranscriptPayload {
        TranscriptPayload {
            text: "[00:00:00] hello".to_string(),
            segment_count: 1,
        }
    }

    const VIDEO_ID: &str = "dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let mut first = mock("first", 10);
        first
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));
        let mut second = mock("second", 20);
        second.expect_extract().times(0);

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Success {
                source_strategy,
                segment_count,
                ..
            } => {
                assert_eq!(source_strategy, "first");
                assert_eq!(segment_count, 1);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_next_strategy() {
        let mut first = mock("first", 10);
        first.expect_extract().times(1).returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::NoCaptions, "nothing here"))
        });
        let mut second = mock("second", 20);
        second
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Success { source_strategy, .. } => {
                assert_eq!(source_strategy, "second");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_the_loop() {
        let mut first = mock("first", 10);
        first.expect_extract().times(1).returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::VideoPrivate, "video is private"))
        });
        let mut second = mock("second", 20);
        second.expect_extract().times(0);

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::VideoPrivate),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_age_restricted_does_not_stop_the_loop() {
        let mut first = mock("first", 10);
        first.expect_extract().times(1).returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::AgeRestricted, "sign in to confirm"))
        });
        let mut second = mock("second", 20);
        second
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_disabled_and_unavailable_strategies_skipped() {
        let mut disabled = MockTranscriptStrategy::new();
        disabled.expect_name().return_const("disabled");
        disabled.expect_priority().return_const(10u32);
        disabled.expect_is_enabled().return_const(false);
        disabled.expect_extract().times(0);

        let mut unavailable = MockTranscriptStrategy::new();
        unavailable.expect_name().return_const("unavailable");
        unavailable.expect_priority().return_const(20u32);
        unavailable.expect_is_enabled().return_const(true);
        unavailable.expect_is_available().returning(|| false);
        unavailable.expect_extract().times(0);

        let mut working = mock("working", 30);
        working
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));

        let orchestrator = orchestrator(vec![
            Arc::new(disabled),
            Arc::new(unavailable),
            Arc::new(working),
        ]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Success { source_strategy, .. } => {
                assert_eq!(source_strategy, "working");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_best_error_selection() {
        let mut first = mock("first", 10);
        first.expect_extract().returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::Timeout, "timed out"))
        });
        let mut second = mock("second", 20);
        second.expect_extract().returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::NoCaptions, "captions disabled"))
        });
        let mut third = mock("third", 30);
        third.expect_extract().returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::Unknown, "mystery"))
        });

        let orchestrator =
            orchestrator(vec![Arc::new(first), Arc::new(second), Arc::new(third)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::NoCaptions);
                assert_eq!(message, "captions disabled");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_best_error_tie_breaks_by_first_occurrence() {
        let mut first = mock("first", 10);
        first.expect_extract().returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::Timeout, "first timeout"))
        });
        let mut second = mock("second", 20);
        second.expect_extract().returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::Timeout, "second timeout"))
        });

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Failure { message, .. } => assert_eq!(message, "first timeout"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_any_strategy() {
        let mut strategy = mock("untouched", 10);
        strategy.expect_extract().times(0);

        let orchestrator = orchestrator(vec![Arc::new(strategy)]);
        let outcome = orchestrator.extract("definitely not a video", None).await;

        match outcome {
            ExtractionOutcome::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::Unknown);
                assert!(message.contains("could not resolve"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_strategy_list_yields_generic_failure() {
        let orchestrator = orchestrator(Vec::new());
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::Unknown);
                assert!(message.contains("no extraction strategies"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_registration_order() {
        let mut first = mock("registered_first", 10);
        first
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));
        let mut second = mock("registered_second", 10);
        second.expect_extract().times(0);

        let orchestrator = orchestrator(vec![Arc::new(first), Arc::new(second)]);
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Success { source_strategy, .. } => {
                assert_eq!(source_strategy, "registered_first");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_breaker_rejects_later_strategies_but_loop_continues() {
        // Threshold 1: the first failure opens the shared breaker, so the
        // second strategy is rejected without being invoked, yet the loop
        // still records it and finishes normally.
        let mut first = mock("first", 10);
        first.expect_extract().times(1).returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::NetworkError, "connection refused"))
        });
        let mut second = mock("second", 20);
        second.expect_extract().times(0);

        let orchestrator = ExtractionOrchestrator::new(
            vec![Arc::new(first), Arc::new(second)],
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout_ms: 60_000,
                success_threshold: 2,
            },
            false,
            ExtractionOptions::default(),
        );
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        // NetworkError beats the breaker-open Unknown in surface priority.
        match outcome {
            ExtractionOutcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::NetworkError),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!orchestrator.breaker_snapshot().name.is_empty());
    }

    #[tokio::test]
    async fn test_per_strategy_breakers_isolate_failures() {
        let mut first = mock("first", 10);
        first.expect_extract().times(1).returning(|_, _| {
            Err(ExtractionError::new(ErrorKind::NetworkError, "connection refused"))
        });
        let mut second = mock("second", 20);
        second
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));

        let orchestrator = ExtractionOrchestrator::new(
            vec![Arc::new(first), Arc::new(second)],
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout_ms: 60_000,
                success_threshold: 2,
            },
            true,
            ExtractionOptions::default(),
        );
        let outcome = orchestrator.extract(VIDEO_ID, None).await;
        assert!(outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_strategy_times_out_and_loop_continues() {
        struct SlowStrategy;

        #[async_trait]
        impl TranscriptStrategy for SlowStrategy {
            fn name(&self) -> &'static str {
                "slow"
            }
            fn priority(&self) -> u32 {
                10
            }
            async fn extract(
                &self,
                _video_id: &str,
                _options: &ExtractionOptions,
            ) -> Result<TranscriptPayload, ExtractionError> {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(success_payload())
            }
        }

        let mut fallback = mock("fallback", 20);
        fallback
            .expect_extract()
            .times(1)
            .returning(|_, _| Ok(success_payload()));

        let orchestrator = ExtractionOrchestrator::new(
            vec![Arc::new(SlowStrategy), Arc::new(fallback)],
            test_breaker_config(),
            false,
            ExtractionOptions {
                timeout_ms: 5_000,
                ..Default::default()
            },
        );
        let outcome = orchestrator.extract(VIDEO_ID, None).await;

        match outcome {
            ExtractionOutcome::Success { source_strategy, .. } => {
                assert_eq!(source_strategy, "fallback");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_outcome_serializes_with_status_tag() {
        let outcome = ExtractionOutcome::Failure {
            message: "captions disabled".to_string(),
            kind: ErrorKind::NoCaptions,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "NoCaptions");
    }
}

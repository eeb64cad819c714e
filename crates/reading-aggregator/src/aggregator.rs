//! Reading Aggregator Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_model::{Reading, Snapshot, SourceFailure};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ConfigError, SourceError};
use crate::normalizer::Normalizer;
use crate::validator::{PlausibilityConfig, Validator};

/// A provider of health readings (wearable, fitness app, lab system, ...)
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable identifier of the source
    fn id(&self) -> &str;

    /// Fetch readings for a user observed since the given instant
    async fn fetch(&self, user_id: &str, since: DateTime<Utc>)
        -> Result<Vec<Reading>, SourceError>;
}

/// Longest accepted staleness window (one year)
const MAX_STALENESS_SECS: u64 = 365 * 24 * 3600;
/// Longest accepted source timeout or collection deadline (one hour)
const MAX_DEADLINE_MS: u64 = 3_600_000;

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Readings older than this are dropped (seconds, default: 3600)
    pub staleness_window_secs: u64,
    /// Timeout for a single source fetch (ms)
    pub source_timeout_ms: u64,
    /// Deadline for the whole fan-out (ms)
    pub collect_deadline_ms: u64,
    /// Plausibility ranges
    pub plausibility: PlausibilityConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: 3600,
            source_timeout_ms: 3000,
            collect_deadline_ms: 5000,
            plausibility: PlausibilityConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("staleness_window_secs", self.staleness_window_secs, MAX_STALENESS_SECS),
            ("source_timeout_ms", self.source_timeout_ms, MAX_DEADLINE_MS),
            ("collect_deadline_ms", self.collect_deadline_ms, MAX_DEADLINE_MS),
        ];
        for (field, value, max) in checks {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
            if value > max {
                return Err(ConfigError::TooLarge { field, max });
            }
        }
        Ok(())
    }
}

/// Fans out to every data source and folds the results into one snapshot
pub struct ReadingAggregator {
    sources: Vec<Arc<dyn DataSource>>,
    config: AggregatorConfig,
    normalizer: Normalizer,
    validator: Validator,
}

impl ReadingAggregator {
    /// Create an aggregator over the given sources
    pub fn new(sources: Vec<Arc<dyn DataSource>>, config: AggregatorConfig) -> Self {
        debug!("Creating reading aggregator with {} sources", sources.len());
        Self {
            sources,
            validator: Validator::new(config.plausibility.clone()),
            normalizer: Normalizer::new(),
            config,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Oldest observation time still considered fresh at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = self.config.staleness_window_secs.min(MAX_STALENESS_SECS) as i64;
        now.checked_sub_signed(chrono::Duration::seconds(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Collect one snapshot for a user.
    ///
    /// Never fails: unavailable sources mark the snapshot partial, and a
    /// snapshot with no fresh readings is flagged empty. Readings observed
    /// before `since` or outside the staleness window are dropped. Dropping
    /// the returned future aborts every outstanding fetch.
    pub async fn collect(&self, user_id: &str, cycle_id: u64, since: DateTime<Utc>) -> Snapshot {
        let collected_at = Utc::now();
        let stale_before = self.window_start(collected_at).max(since);

        let mut set = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let user_id = user_id.to_string();
            let source_timeout_ms = self.config.source_timeout_ms.min(MAX_DEADLINE_MS);

            set.spawn(async move {
                let fetch = source.fetch(&user_id, since);
                let result = match timeout(Duration::from_millis(source_timeout_ms), fetch).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(source_timeout_ms)),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Vec<Reading>, SourceError>>> =
            (0..self.sources.len()).map(|_| None).collect();
        let deadline =
            Instant::now() + Duration::from_millis(self.config.collect_deadline_ms.min(MAX_DEADLINE_MS));

        loop {
            match timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((index, result)))) => results[index] = Some(result),
                Ok(Some(Err(e))) => warn!(user_id, "Source task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(user_id, "Collection deadline reached, abandoning slow sources");
                    set.abort_all();
                    break;
                }
            }
        }

        let mut readings = Vec::new();
        let mut failed_sources = Vec::new();

        for (source, result) in self.sources.iter().zip(results) {
            let source_id = source.id();
            match result {
                Some(Ok(batch)) => {
                    debug!(user_id, source_id, "Fetched {} readings", batch.len());
                    for reading in batch {
                        if let Some(reading) = self.accept(source_id, reading, stale_before) {
                            readings.push(reading);
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(user_id, source_id, "Source failed: {}", e);
                    failed_sources.push(SourceFailure {
                        source_id: source_id.to_string(),
                        error: e.to_string(),
                    });
                }
                None => failed_sources.push(SourceFailure {
                    source_id: source_id.to_string(),
                    error: "did not complete before the collection deadline".to_string(),
                }),
            }
        }

        // Stable sort keeps source order for readings observed at the same instant
        readings.sort_by_key(|r| r.observed_at);

        let snapshot = Snapshot {
            user_id: user_id.to_string(),
            cycle_id,
            empty: readings.is_empty(),
            partial: !failed_sources.is_empty(),
            readings,
            collected_at,
            failed_sources,
        };

        debug!(
            user_id,
            cycle_id,
            readings = snapshot.readings.len(),
            partial = snapshot.partial,
            empty = snapshot.empty,
            "Snapshot collected"
        );

        snapshot
    }

    fn accept(
        &self,
        source_id: &str,
        mut reading: Reading,
        stale_before: DateTime<Utc>,
    ) -> Option<Reading> {
        if reading.source_id.is_empty() {
            reading.source_id = source_id.to_string();
        }

        if reading.observed_at < stale_before {
            debug!(source_id, metric = %reading.metric, "Dropping stale reading");
            return None;
        }

        let reading = self.normalizer.normalize(reading);
        if let Err(e) = self.validator.validate(&reading) {
            warn!(source_id, "Dropping implausible reading: {}", e);
            return None;
        }

        Some(reading)
    }
}

//! Metrics context - wires the storage tiers, coordinator and sweeper

use std::sync::Arc;
use std::time::Duration;

use callstats_core::{
    AggregationEngine, CoordinatorConfig, DurableMetricStore, MetricRecordedEvent,
    RecentMetricStore, RetentionTarget, StorageCoordinator,
};
use callstats_domain::{
    AggregatedMetrics, CallStatsError, Config, MetricRecord, NewMetricRecord, Result,
    StorageStatus, TimeRange,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};

use crate::database::SqliteMetricStore;
use crate::recent::build_recent_store;
use crate::scheduling::{RetentionSweeper, SchedulerError, SweeperConfig};

const SWEEPER_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns every metrics component for the lifetime of the application.
pub struct MetricsContext {
    pub config: Config,
    pub coordinator: Arc<StorageCoordinator>,
    pub engine: Arc<AggregationEngine>,
    sweeper: Mutex<Option<RetentionSweeper>>,
}

impl MetricsContext {
    /// Build and initialise the full stack described by `config`.
    ///
    /// A durable store that fails to open does not fail bootstrap; the
    /// returned context runs on the recent store and reports the failure via
    /// [`MetricsContext::status`].
    ///
    /// # Errors
    /// Returns `CallStatsError::Config` for an invalid configuration and
    /// `CallStatsError::Storage` if the recent store cannot be opened.
    #[instrument(skip(config), fields(db_path = %config.storage.path))]
    pub async fn bootstrap(config: Config) -> Result<Self> {
        config.validate()?;

        let durable: Arc<dyn DurableMetricStore> =
            Arc::new(SqliteMetricStore::from_config(&config.storage));
        let recent: Arc<dyn RecentMetricStore> = Arc::new(build_recent_store(&config.recent)?);

        let coordinator = Arc::new(StorageCoordinator::new(
            durable,
            recent,
            CoordinatorConfig::from(&config.retention),
        ));
        let status = coordinator.init().await;
        let engine = Arc::new(AggregationEngine::new(Arc::clone(&coordinator)));

        let sweeper = if config.retention.enabled {
            Some(start_sweeper(&coordinator, &config).await?)
        } else {
            None
        };

        info!(
            durable_ready = status.durable_ready,
            recent_count = status.recent_count,
            retention_enabled = config.retention.enabled,
            "metrics context ready"
        );

        Ok(Self { config, coordinator, engine, sweeper: Mutex::new(sweeper) })
    }

    /// Record one completed call in both tiers.
    pub async fn save_metric(&self, metric: NewMetricRecord) -> Result<MetricRecord> {
        self.coordinator.save_metric(metric).await
    }

    /// Aggregated report for `range`.
    pub async fn get_aggregated_metrics(&self, range: TimeRange) -> Result<AggregatedMetrics> {
        self.engine.get_aggregated_metrics(range).await
    }

    /// Up to `limit` most recent records, newest first.
    pub async fn get_recent_metrics(&self, limit: usize) -> Result<Vec<MetricRecord>> {
        self.coordinator.get_recent_metrics(limit).await
    }

    /// Durable records with `start <= timestamp <= end`, ascending.
    pub async fn get_metrics_in_range(&self, start: i64, end: i64) -> Result<Vec<MetricRecord>> {
        self.coordinator.get_metrics_in_range(start, end).await
    }

    /// Every durable record, ascending.
    pub async fn get_all_metrics(&self) -> Result<Vec<MetricRecord>> {
        self.coordinator.get_all_metrics().await
    }

    /// Empty both tiers.
    pub async fn clear_all(&self) -> Result<()> {
        self.coordinator.clear_all().await
    }

    /// Subscribe to "metric recorded" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MetricRecordedEvent> {
        self.coordinator.subscribe()
    }

    /// Readiness of both tiers.
    pub async fn status(&self) -> StorageStatus {
        self.coordinator.status().await
    }

    /// Whether the retention sweeper is running.
    pub async fn is_sweeping(&self) -> bool {
        match self.sweeper.lock().await.as_ref() {
            Some(sweeper) => sweeper.is_running().await,
            None => false,
        }
    }

    /// Stop the sweeper and close the durable store.
    ///
    /// Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(mut sweeper) = self.sweeper.lock().await.take() {
            match sweeper.stop().await {
                Ok(()) | Err(SchedulerError::NotRunning) => {}
                Err(err) => warn!(error = %err, "retention sweeper did not stop cleanly"),
            }
        }

        self.coordinator.close().await?;
        info!("metrics context shut down");
        Ok(())
    }
}

async fn start_sweeper(
    coordinator: &Arc<StorageCoordinator>,
    config: &Config,
) -> Result<RetentionSweeper> {
    let target: Arc<dyn RetentionTarget> = coordinator.clone();
    let mut sweeper = RetentionSweeper::new(target, SweeperConfig::from(&config.retention));

    tokio::time::timeout(SWEEPER_START_TIMEOUT, sweeper.start())
        .await
        .map_err(|_| {
            tracing::error!(
                timeout_secs = SWEEPER_START_TIMEOUT.as_secs(),
                "RetentionSweeper start timed out"
            );
            CallStatsError::Internal("RetentionSweeper start timed out".into())
        })??;

    Ok(sweeper)
}

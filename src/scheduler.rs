use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::Fetch;
use crate::pipeline::{check_source, KeywordSet, SourceOutcome};

/// Totals for one pass over every configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub sources_checked: usize,
    pub sources_skipped: usize,
    pub sources_failed: usize,
    pub items_inserted: usize,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            sources_checked: 0,
            sources_skipped: 0,
            sources_failed: 0,
            items_inserted: 0,
        }
    }
}

/// Run the pipeline over every source, one at a time.
///
/// Sources and keywords are read fresh on every call. A failing source is
/// logged and counted; it never stops the remaining ones.
pub async fn run_cycle<F: Fetch>(repository: &Repository, fetcher: &F) -> Result<CycleReport> {
    let mut report = CycleReport::new(Utc::now());

    let sources = repository.list_sources().await?;
    let keywords = KeywordSet::from(repository.list_keywords().await?.as_slice());

    if sources.is_empty() || keywords.is_empty() {
        tracing::debug!("No sources or keywords configured, skipping check");
        return Ok(report);
    }

    for source in &sources {
        match check_source(repository, fetcher, &source.url, &keywords).await {
            Ok(SourceOutcome::Skipped { .. }) => report.sources_skipped += 1,
            Ok(SourceOutcome::Ingested { inserted, .. }) => {
                report.sources_checked += 1;
                report.items_inserted += inserted;
            }
            Err(e) => {
                tracing::warn!("Failed to check {}: {}", source.url, e);
                report.sources_failed += 1;
            }
        }
    }

    Ok(report)
}

/// Repeats [`run_cycle`] on a fixed start-to-start interval.
pub struct Scheduler<F> {
    repository: Arc<Repository>,
    fetcher: Arc<F>,
    interval: Duration,
}

/// Owner of a running [`Scheduler`] task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop and wait for it. An in-flight cycle is aborted.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|e| -> AppError {
            anyhow::anyhow!("scheduler task ended abnormally: {}", e).into()
        })
    }
}

impl<F: Fetch> Scheduler<F> {
    pub fn new(repository: Arc<Repository>, fetcher: Arc<F>, interval: Duration) -> Self {
        Self {
            repository,
            fetcher,
            interval,
        }
    }

    /// Start the schedule on a background task. The first cycle runs immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            // Overrunning cycles are followed by back-to-back catch-up ticks
            timer.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let mut cycle = self.spawn_cycle();
                        tokio::select! {
                            joined = &mut cycle => log_cycle_result(joined),
                            _ = shutdown_rx.changed() => {
                                cycle.abort();
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            tracing::info!("Feed scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }

    fn spawn_cycle(&self) -> JoinHandle<Result<CycleReport>> {
        let repository = Arc::clone(&self.repository);
        let fetcher = Arc::clone(&self.fetcher);

        tokio::spawn(async move {
            tracing::info!("Starting feed check");
            run_cycle(&repository, fetcher.as_ref()).await
        })
    }
}

fn log_cycle_result(joined: std::result::Result<Result<CycleReport>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(report)) => tracing::info!(
            "Feed check finished: {} checked, {} skipped, {} failed, {} new items",
            report.sources_checked,
            report.sources_skipped,
            report.sources_failed,
            report.items_inserted
        ),
        Ok(Err(e)) => tracing::warn!("Feed check aborted: {}", e),
        Err(e) if e.is_panic() => tracing::error!("Feed check panicked: {}", e),
        Err(e) => tracing::warn!("Feed check cancelled: {}", e),
    }
}

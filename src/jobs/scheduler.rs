//! Cron wiring for the ledger jobs

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::{AccrualJob, PenaltyJob};
use crate::otp::OtpStore;

/// Evict stale OTP codes once a minute
pub const OTP_PURGE_CRON: &str = "0 * * * * *";

/// Cron expressions for the scheduled jobs, seconds field first and
/// evaluated in UTC
#[derive(Debug, Clone)]
pub struct Schedules {
    pub accrual: String,
    pub penalty: String,
}

/// Run `task` unless the previous run guarded by `guard` is still going.
///
/// Returns whether the task ran.
pub async fn run_exclusive<F, Fut>(guard: &Mutex<()>, job: &str, task: F) -> bool
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let Ok(_running) = guard.try_lock() else {
        tracing::warn!(job, "Previous run still in progress, skipping this tick");
        return false;
    };
    task().await;
    true
}

/// Running cron scheduler owning the ledger jobs
pub struct LedgerScheduler {
    scheduler: JobScheduler,
}

impl LedgerScheduler {
    pub async fn start(
        schedules: Schedules,
        accrual: AccrualJob,
        penalty: PenaltyJob,
        otp_store: OtpStore,
    ) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {:?}", e))?;

        let accrual_guard = Arc::new(Mutex::new(()));
        let accrual_job = Job::new_async(schedules.accrual.as_str(), move |_id, _scheduler| {
            let accrual = accrual.clone();
            let guard = accrual_guard.clone();
            Box::pin(async move {
                run_exclusive(&guard, "accrual", || async {
                    if let Err(e) = accrual.run().await {
                        tracing::error!(error = %e, "Interest accrual run failed");
                    }
                })
                .await;
            })
        })
        .map_err(|e| anyhow!("Invalid accrual schedule '{}': {:?}", schedules.accrual, e))?;

        let penalty_guard = Arc::new(Mutex::new(()));
        let penalty_job = Job::new_async(schedules.penalty.as_str(), move |_id, _scheduler| {
            let penalty = penalty.clone();
            let guard = penalty_guard.clone();
            Box::pin(async move {
                run_exclusive(&guard, "penalty", || async {
                    if let Err(e) = penalty.run().await {
                        tracing::error!(error = %e, "Penalty check run failed");
                    }
                })
                .await;
            })
        })
        .map_err(|e| anyhow!("Invalid penalty schedule '{}': {:?}", schedules.penalty, e))?;

        let purge_job = Job::new_async(OTP_PURGE_CRON, move |_id, _scheduler| {
            let otp_store = otp_store.clone();
            Box::pin(async move {
                let purged = otp_store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Expired OTP codes purged");
                }
            })
        })
        .map_err(|e| anyhow!("Invalid OTP purge schedule: {:?}", e))?;

        for job in [accrual_job, penalty_job, purge_job] {
            scheduler
                .add(job)
                .await
                .map_err(|e| anyhow!("Failed to register job: {:?}", e))?;
        }
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {:?}", e))?;

        tracing::info!(
            accrual = %schedules.accrual,
            penalty = %schedules.penalty,
            "Ledger jobs scheduled"
        );
        Ok(Self { scheduler })
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {:?}", e))
    }
}

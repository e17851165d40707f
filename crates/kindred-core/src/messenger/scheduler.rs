//! Thin wrapper over `tokio-cron-scheduler` for the messenger's jobs.
//!
//! Expressions are 6-field cron (with seconds). Daily jobs fire in local
//! time, since "good morning" at 07:30 UTC means little to the user.

use std::collections::HashMap;
use std::sync::Arc;

use kindred_types::error::MessengerError;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Invoked each time a job fires.
pub type JobCallback = Arc<dyn Fn() -> futures_util::future::BoxFuture<'static, ()> + Send + Sync>;

pub const CHECK_EVERY_5_MIN: &str = "0 */5 * * * *";

/// Cron for a daily job at `hour:minute`.
pub fn daily_at(hour: u32, minute: u32) -> String {
    format!("0 {minute} {hour} * * *")
}

pub struct MessengerScheduler {
    inner: RwLock<Option<JobScheduler>>,
    /// owner -> job ids
    jobs: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl MessengerScheduler {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn start(&self) -> Result<(), MessengerError> {
        let mut inner = self.inner.write().await;
        if inner.is_some() {
            return Ok(());
        }
        let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;
        scheduler.start().await.map_err(scheduler_error)?;
        *inner = Some(scheduler);
        tracing::info!("messenger scheduler started");
        Ok(())
    }

    /// Shut down and forget every job.
    pub async fn stop(&self) -> Result<(), MessengerError> {
        if let Some(mut scheduler) = self.inner.write().await.take() {
            scheduler.shutdown().await.map_err(scheduler_error)?;
            tracing::info!("messenger scheduler stopped");
        }
        self.jobs.write().await.clear();
        Ok(())
    }

    /// Add a job owned by `owner`. `local` selects the local time zone.
    pub async fn add(
        &self,
        owner: Uuid,
        cron: &str,
        local: bool,
        callback: JobCallback,
    ) -> Result<Uuid, MessengerError> {
        let inner = self.inner.read().await;
        let scheduler = inner
            .as_ref()
            .ok_or_else(|| MessengerError::Scheduler("scheduler not started".to_string()))?;

        let job = if local {
            Job::new_async_tz(cron, chrono::Local, move |_id, _lock| {
                let cb = Arc::clone(&callback);
                Box::pin(async move { cb().await })
            })
        } else {
            Job::new_async(cron, move |_id, _lock| {
                let cb = Arc::clone(&callback);
                Box::pin(async move { cb().await })
            })
        }
        .map_err(scheduler_error)?;

        let job_id = job.guid();
        scheduler.add(job).await.map_err(scheduler_error)?;
        self.jobs.write().await.entry(owner).or_default().push(job_id);

        tracing::debug!(%owner, %job_id, cron, "messenger job added");
        Ok(job_id)
    }

    /// Remove every job owned by `owner`. Returns how many were removed.
    pub async fn remove_owner(&self, owner: &Uuid) -> Result<usize, MessengerError> {
        let Some(ids) = self.jobs.write().await.remove(owner) else {
            return Ok(0);
        };
        if let Some(scheduler) = self.inner.read().await.as_ref() {
            for id in &ids {
                scheduler.remove(id).await.map_err(scheduler_error)?;
            }
        }
        Ok(ids.len())
    }

    pub async fn job_count(&self, owner: &Uuid) -> usize {
        self.jobs.read().await.get(owner).map_or(0, Vec::len)
    }
}

impl Default for MessengerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn scheduler_error(e: impl std::fmt::Display) -> MessengerError {
    MessengerError::Scheduler(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> JobCallback {
        Arc::new(|| -> futures_util::future::BoxFuture<'static, ()> { Box::pin(async {}) })
    }

    #[test]
    fn test_daily_cron() {
        assert_eq!(daily_at(7, 45), "0 45 7 * * *");
    }

    #[tokio::test]
    async fn test_add_before_start_fails() {
        let scheduler = MessengerScheduler::new();
        let err = scheduler
            .add(Uuid::now_v7(), CHECK_EVERY_5_MIN, false, noop())
            .await
            .unwrap_err();
        assert!(matches!(err, MessengerError::Scheduler(_)));
    }

    #[tokio::test]
    async fn test_jobs_grouped_by_owner() {
        let scheduler = MessengerScheduler::new();
        scheduler.start().await.unwrap();

        let owner = Uuid::now_v7();
        scheduler.add(owner, CHECK_EVERY_5_MIN, false, noop()).await.unwrap();
        scheduler.add(owner, &daily_at(8, 15), true, noop()).await.unwrap();
        assert_eq!(scheduler.job_count(&owner).await, 2);

        assert_eq!(scheduler.remove_owner(&owner).await.unwrap(), 2);
        assert_eq!(scheduler.job_count(&owner).await, 0);
        assert_eq!(scheduler.remove_owner(&owner).await.unwrap(), 0);

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
    }
}

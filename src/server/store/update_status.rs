//! `UpdateStatus`: transitioning a job between lifecycle states, with deadlock-bounded retry.

use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};

use entity::job;
use entity::sea_orm_active_enums::JobStatus;

use crate::server::error::retry::ErrorRetryStrategy;
use crate::server::error::store::StoreError;
use crate::server::error::Error;
use crate::server::store::JobStore;

/// Observability fields recorded alongside a transition to DONE.
#[derive(Debug, Clone, Default)]
pub struct CompletionInfo {
    /// Wall-clock milliseconds the job spent in RUN.
    pub runtime_msec: Option<i32>,
    /// Number of store round-trips the job's runnable made, if tracked.
    pub query_count: Option<i32>,
}

/// Maximum number of attempts `UpdateStatus` makes against a deadlocking transaction before
/// giving up and surfacing the error.
const MAX_DEADLOCK_ATTEMPTS: u32 = 3;

/// Linear backoff applied between deadlock retries.
const DEADLOCK_BACKOFF: Duration = Duration::from_secs(1);

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Transitions `job_id` to `status`, recording completion fields when `status` is DONE.
    ///
    /// Wrapped in a bounded retry that only swallows the backend's own deadlock-restart
    /// error; every other failure propagates on the first attempt.
    pub async fn update_status(
        &self,
        job_id: i32,
        status: JobStatus,
        completion: Option<CompletionInfo>,
    ) -> Result<job::Model, Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.update_status_once(job_id, status, completion.clone()).await {
                Ok(job) => return Ok(job),
                Err(err) => {
                    let retry = matches!(err.to_retry_strategy(), ErrorRetryStrategy::Retry)
                        && is_deadlock_err(&err);
                    if !retry || attempt >= MAX_DEADLOCK_ATTEMPTS {
                        if retry {
                            return Err(StoreError::DeadlockRetriesExhausted {
                                attempts: attempt,
                                last_error: err.to_string(),
                            }
                            .into());
                        }
                        return Err(err);
                    }
                    tokio::time::sleep(DEADLOCK_BACKOFF).await;
                }
            }
        }
    }

    async fn update_status_once(
        &self,
        job_id: i32,
        status: JobStatus,
        completion: Option<CompletionInfo>,
    ) -> Result<job::Model, Error> {
        let existing = job::Entity::find_by_id(job_id)
            .one(self.db)
            .await?
            .ok_or(StoreError::UnknownJob(job_id))?;

        let previous_status = existing.status;
        let mut active: job::ActiveModel = existing.into();
        active.status = Set(status);

        if status == JobStatus::Done {
            active.completed = Set(Some(Utc::now().naive_utc()));
            if let Some(info) = &completion {
                if info.runtime_msec.is_some() {
                    active.runtime_msec = Set(info.runtime_msec);
                }
                if info.query_count.is_some() {
                    active.query_count = Set(info.query_count);
                }
            }
        }

        let updated = job::Entity::update(active).exec(self.db).await?;

        self.on_status_transition(&updated, previous_status).await?;

        Ok(updated)
    }

    /// Mirrors a job's terminal transition into `analysis_stats` counters and, for DONE or
    /// PASSED_ON, decrements the job's funnel semaphore.
    ///
    /// The counter statements are skipped when the store was constructed with
    /// [`JobStore::with_stats_mode`]`(_, true)`, for deployments that keep `analysis_stats` in
    /// sync with database triggers instead. The semaphore decrement always runs — it is part
    /// of this crate's own dataflow bookkeeping, not a derived statistic.
    async fn on_status_transition(
        &self,
        job: &job::Model,
        previous_status: JobStatus,
    ) -> Result<(), Error> {
        if previous_status == job.status {
            return Ok(());
        }

        let backend = self.db.get_database_backend();

        if !self.stats_by_trigger {
            if job.status == JobStatus::Done || job.status == JobStatus::Failed {
                let counter =
                    if job.status == JobStatus::Done { "done_job_count" } else { "failed_job_count" };
                let ph = crate::server::store::placeholders(backend, 1);
                let sql = format!(
                    "UPDATE analysis_stats SET {counter} = {counter} + 1 WHERE analysis_id = {}",
                    ph[0]
                );
                self.db
                    .execute(Statement::from_sql_and_values(backend, &sql, [job.analysis_id.into()]))
                    .await?;
            } else if job.status == JobStatus::Ready && job.semaphore_count <= 0 {
                // A job re-entering READY (GC's bare reset, or `ReleaseAndAge`'s retry) becomes
                // claimable again, so it rejoins the unclaimed count it left when claimed.
                let ph = crate::server::store::placeholders(backend, 1);
                let sql = format!(
                    "UPDATE analysis_stats SET unclaimed_job_count = unclaimed_job_count + 1 \
                     WHERE analysis_id = {}",
                    ph[0]
                );
                self.db
                    .execute(Statement::from_sql_and_values(backend, &sql, [job.analysis_id.into()]))
                    .await?;
            }
        }

        // A funnel's semaphore_count counts fan children that have not yet reached a terminal
        // state that will never ask to run again: DONE, PASSED_ON, or FAILED (retry budget
        // exhausted) all free up the funnel's wait just as much as a clean completion does.
        if job.status.is_terminal() {
            if let Some(funnel_id) = job.semaphored_job_id {
                self.increment_semaphore_count(funnel_id, -1).await?;
            }
        }

        Ok(())
    }

    /// Resets a `CLAIMED` job back to `READY` with no worker and no retry increment, used by
    /// the garbage collector for jobs that were claimed but never started.
    pub async fn reset_claimed_to_ready(&self, job_id: i32) -> Result<job::Model, Error> {
        let existing = job::Entity::find_by_id(job_id)
            .one(self.db)
            .await?
            .ok_or(StoreError::UnknownJob(job_id))?;

        let previous_status = existing.status;
        let mut active: job::ActiveModel = existing.into();
        active.status = Set(JobStatus::Ready);
        active.worker_id = Set(None);

        let updated = job::Entity::update(active).exec(self.db).await?;
        self.on_status_transition(&updated, previous_status).await?;
        Ok(updated)
    }

    /// `ReleaseAndAge`: ages a job out of a working state into `READY` (eligible for another
    /// attempt) or `FAILED` (retry budget exhausted, or the caller forbids retrying a
    /// resource-overusage death), incrementing `retry_count` either way.
    ///
    /// The eligibility check reads the job's `retry_count` from *before* this call's own
    /// increment — a job with `retry_count == max_retry_count` on entry gets one more
    /// attempt, and its `retry_count` becomes `max_retry_count + 1` only once it is actually
    /// retried and fails again.
    pub async fn release_and_age(
        &self,
        job_id: i32,
        max_retry_count: i32,
        may_retry: bool,
    ) -> Result<job::Model, Error> {
        let existing = job::Entity::find_by_id(job_id)
            .one(self.db)
            .await?
            .ok_or(StoreError::UnknownJob(job_id))?;

        let previous_status = existing.status;
        let previous_retry_count = existing.retry_count;
        let next_status = if may_retry && previous_retry_count < max_retry_count {
            JobStatus::Ready
        } else {
            JobStatus::Failed
        };

        let mut active: job::ActiveModel = existing.into();
        active.status = Set(next_status);
        active.worker_id = Set(None);
        active.retry_count = Set(previous_retry_count + 1);

        let updated = job::Entity::update(active).exec(self.db).await?;
        self.on_status_transition(&updated, previous_status).await?;
        Ok(updated)
    }
}

fn is_deadlock_err(err: &Error) -> bool {
    matches!(err, Error::DbErr(db_err) if {
        let msg = db_err.to_string().to_lowercase();
        msg.contains("deadlock") || msg.contains("database is locked")
    })
}

#[cfg(test)]
mod tests {
    // Deadlock-retry behavior (scenario S5: two simulated deadlocks then success) is exercised
    // in the top-level store integration tests, where a connection wrapper can inject failures
    // that a bare in-memory SQLite connection cannot produce on its own.
}

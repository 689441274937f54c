//! `ClaimJobsForWorker` and `ReclaimJob`: handing READY jobs to a worker.

use sea_orm::{
    ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, Set, Statement,
};

use entity::job;
use entity::sea_orm_active_enums::JobStatus;

use crate::server::error::store::StoreError;
use crate::server::error::Error;
use crate::server::store::JobStore;

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Claims up to `batch_size` READY, unsemaphored jobs for `analysis_id` on behalf of
    /// `worker_id`.
    ///
    /// Jobs that have never failed (`retry_count = 0`) are preferred; the batch is topped up
    /// with retried jobs only once virgin jobs are exhausted, so a flaky analysis doesn't starve
    /// fresh work. Selection happens as a plain `SELECT ... LIMIT` (portable across every
    /// backend this crate targets, unlike `UPDATE ... LIMIT`), and the subsequent `UPDATE`
    /// guards on `status = 'READY'` so a job another worker claimed in between is silently
    /// skipped rather than double-claimed.
    pub async fn claim_jobs_for_worker(
        &self,
        worker_id: i32,
        analysis_id: i32,
        batch_size: u64,
    ) -> Result<Vec<job::Model>, Error> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let virgin: Vec<i32> = job::Entity::find()
            .filter(job::Column::AnalysisId.eq(analysis_id))
            .filter(job::Column::Status.eq(JobStatus::Ready))
            .filter(job::Column::SemaphoreCount.lte(0))
            .filter(job::Column::RetryCount.eq(0))
            .order_by(job::Column::JobId, Order::Asc)
            .limit(batch_size)
            .all(self.db)
            .await?
            .into_iter()
            .map(|j| j.job_id)
            .collect();

        let mut candidate_ids = virgin;
        let remaining = batch_size - candidate_ids.len() as u64;

        if remaining > 0 {
            let retried: Vec<i32> = job::Entity::find()
                .filter(job::Column::AnalysisId.eq(analysis_id))
                .filter(job::Column::Status.eq(JobStatus::Ready))
                .filter(job::Column::SemaphoreCount.lte(0))
                .filter(job::Column::RetryCount.gt(0))
                .order_by(job::Column::JobId, Order::Asc)
                .limit(remaining)
                .all(self.db)
                .await?
                .into_iter()
                .map(|j| j.job_id)
                .collect::<Vec<_>>();

            candidate_ids.extend(retried);
        }

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let backend = self.db.get_database_backend();
        let sql = match backend {
            sea_orm::DbBackend::MySql => format!(
                "UPDATE job SET status = ?, worker_id = ? WHERE status = ? AND job_id IN ({})",
                candidate_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
            ),
            _ => format!(
                "UPDATE job SET status = $1, worker_id = $2 WHERE status = $3 AND job_id IN ({})",
                (0..candidate_ids.len())
                    .map(|i| format!("${}", i + 4))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        let mut values: Vec<sea_orm::Value> =
            vec![JobStatus::Claimed.to_value(), worker_id.into(), JobStatus::Ready.to_value()];
        values.extend(candidate_ids.iter().copied().map(sea_orm::Value::from));

        self.db
            .execute(Statement::from_sql_and_values(backend, &sql, values))
            .await?;

        let claimed = job::Entity::find()
            .filter(job::Column::JobId.is_in(candidate_ids))
            .filter(job::Column::WorkerId.eq(worker_id))
            .filter(job::Column::Status.eq(JobStatus::Claimed))
            .all(self.db)
            .await?;

        if !claimed.is_empty() && !self.stats_by_trigger {
            self.decrement_unclaimed_count(analysis_id, claimed.len() as i64)
                .await?;
        }

        Ok(claimed)
    }

    /// Forces `job_id` to `CLAIMED` under `worker_id` regardless of its current status, for the
    /// worker CLI's single-job debug mode.
    pub async fn reclaim_job(&self, worker_id: i32, job_id: i32) -> Result<job::Model, Error> {
        let existing = job::Entity::find_by_id(job_id)
            .one(self.db)
            .await?
            .ok_or(StoreError::UnknownJob(job_id))?;

        let mut active: job::ActiveModel = existing.into();
        active.status = Set(JobStatus::Claimed);
        active.worker_id = Set(Some(worker_id));

        let updated = job::Entity::update(active).exec(self.db).await?;
        Ok(updated)
    }

    /// Flips every `BLOCKED` job of `analysis_id` to `READY`, used once its control rules are
    /// all satisfied (§4.4). Jobs with a positive `semaphore_count` become `READY` too — they
    /// were always going to wait on their funnel counter regardless of the control rule — but
    /// only unsemaphored ones rejoin `unclaimed_job_count`, matching the same invariant
    /// `ClaimJobsForWorker` and [`JobStore::update_status`] read.
    pub async fn unblock_jobs(&self, analysis_id: i32) -> Result<u64, Error> {
        let blocked: Vec<job::Model> = job::Entity::find()
            .filter(job::Column::AnalysisId.eq(analysis_id))
            .filter(job::Column::Status.eq(JobStatus::Blocked))
            .all(self.db)
            .await?;

        if blocked.is_empty() {
            return Ok(0);
        }

        let backend = self.db.get_database_backend();
        let ph = crate::server::store::placeholders(backend, 3);
        let sql = format!(
            "UPDATE job SET status = {} WHERE analysis_id = {} AND status = {}",
            ph[0], ph[1], ph[2]
        );
        self.db
            .execute(Statement::from_sql_and_values(
                backend,
                &sql,
                [JobStatus::Ready.to_value(), analysis_id.into(), JobStatus::Blocked.to_value()],
            ))
            .await?;

        if !self.stats_by_trigger {
            let newly_unclaimed = blocked.iter().filter(|j| j.semaphore_count <= 0).count() as i64;
            if newly_unclaimed > 0 {
                self.increment_unclaimed_count(analysis_id, newly_unclaimed).await?;
            }
        }

        Ok(blocked.len() as u64)
    }

    async fn increment_unclaimed_count(&self, analysis_id: i32, count: i64) -> Result<(), Error> {
        self.decrement_unclaimed_count(analysis_id, -count).await
    }

    async fn decrement_unclaimed_count(&self, analysis_id: i32, count: i64) -> Result<(), Error> {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            sea_orm::DbBackend::MySql => {
                "UPDATE analysis_stats SET unclaimed_job_count = unclaimed_job_count - ? \
                 WHERE analysis_id = ?"
            }
            _ => {
                "UPDATE analysis_stats SET unclaimed_job_count = unclaimed_job_count - $1 \
                 WHERE analysis_id = $2"
            }
        };
        self.db
            .execute(Statement::from_sql_and_values(backend, sql, [count.into(), analysis_id.into()]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against an in-memory SQLite database in the worker loop's
    // integration tests, where analysis/job fixtures are available.
}

//! `CreateJob`: idempotent job insertion with fan/funnel semaphore bookkeeping.

use sea_orm::{ActiveEnum, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, Statement};
use serde_json::Value;

use entity::job;
use entity::sea_orm_active_enums::JobStatus;

use crate::server::error::store::StoreError;
use crate::server::error::Error;
use crate::server::store::analysis_data::{offload_token, OFFLOAD_THRESHOLD};
use crate::server::store::JobStore;

/// How a newly created job's funnel membership is determined.
///
/// `InheritFromPrev` and an explicit "join no funnel" are kept as distinct variants rather than
/// folding the latter into a bare `None`: a fan's children (or a pass-through job further down
/// the same fan) need the inherit behavior to stay joined to their parent's funnel, but a job
/// that is *not* a fan child of `prev_job_id` — e.g. a GC-dataflowed handler job standing in for
/// a dead job — must not pick up `prev_job_id`'s own funnel by accident.
#[derive(Debug, Clone, Copy, Default)]
pub enum FunnelJoin {
    /// Inherit `semaphored_job_id` from `prev_job.semaphored_job_id`. Behaves like `None` if
    /// `prev_job_id` isn't set.
    #[default]
    InheritFromPrev,
    /// Join this specific funnel job.
    Explicit(i32),
    /// Join no funnel, regardless of what `prev_job_id`'s own funnel is.
    None,
}

/// Parameters for [`JobStore::create_job`].
pub struct CreateJobRequest {
    /// The analysis the new job belongs to.
    pub analysis_id: i32,
    /// The job's structured input parameters, canonicalized to a stable string before the
    /// dedup check.
    pub params: Value,
    /// The job that produced this one, if any (`None` for seed jobs).
    pub prev_job_id: Option<i32>,
    /// If `true`, the job is created with status `BLOCKED` (its controlling analyses have not
    /// all reached DONE) instead of `READY`.
    pub blocked: bool,
    /// The new job's own `semaphore_count`, e.g. `0` for a freshly created funnel awaiting
    /// its fan. Defaults to `0`.
    pub semaphore_count: Option<i32>,
    /// The funnel job this new job should decrement on completion.
    pub semaphored_job_id: FunnelJoin,
}

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Canonicalizes `params` to a stable string and inserts a new job unless one already
    /// exists for `(analysis_id, input_id)`.
    ///
    /// Returns `Ok(Some(job_id))` on a fresh insert, `Ok(None)` if the `UNIQUE(analysis_id,
    /// input_id)` constraint discarded the insert because an equivalent job already exists.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<Option<i32>, Error> {
        let input_id = self.canonicalize_input_id(&request.params).await?;

        let semaphored_job_id = match request.semaphored_job_id {
            FunnelJoin::Explicit(id) => Some(id),
            FunnelJoin::None => None,
            FunnelJoin::InheritFromPrev => match request.prev_job_id {
                Some(prev_id) => {
                    job::Entity::find_by_id(prev_id)
                        .one(self.db)
                        .await?
                        .and_then(|prev| prev.semaphored_job_id)
                }
                None => None,
            },
        };

        if let Some(funnel_id) = semaphored_job_id {
            self.increment_semaphore_count(funnel_id, 1).await?;
        }

        let status = if request.blocked {
            JobStatus::Blocked
        } else {
            JobStatus::Ready
        };
        let semaphore_count = request.semaphore_count.unwrap_or(0);

        let backend = self.db.get_database_backend();
        let insert_sql = match backend {
            DbBackend::Sqlite => {
                "INSERT OR IGNORE INTO job \
                 (analysis_id, input_id, prev_job_id, status, semaphore_count, semaphored_job_id, retry_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, 0)"
            }
            DbBackend::Postgres => {
                "INSERT INTO job \
                 (analysis_id, input_id, prev_job_id, status, semaphore_count, semaphored_job_id, retry_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, 0) \
                 ON CONFLICT (analysis_id, input_id) DO NOTHING"
            }
            DbBackend::MySql => {
                "INSERT IGNORE INTO job \
                 (analysis_id, input_id, prev_job_id, status, semaphore_count, semaphored_job_id, retry_count) \
                 VALUES (?, ?, ?, ?, ?, ?, 0)"
            }
        };

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                backend,
                insert_sql,
                [
                    request.analysis_id.into(),
                    input_id.clone().into(),
                    request.prev_job_id.into(),
                    status.to_value().into(),
                    semaphore_count.into(),
                    semaphored_job_id.into(),
                ],
            ))
            .await?;

        if result.rows_affected() == 0 {
            // Lost the dedup race: cancel the speculative funnel increment made above.
            if let Some(funnel_id) = semaphored_job_id {
                self.increment_semaphore_count(funnel_id, -1).await?;
            }
            return Ok(None);
        }

        let inserted = job::Entity::find()
            .filter(job::Column::AnalysisId.eq(request.analysis_id))
            .filter(job::Column::InputId.eq(input_id))
            .one(self.db)
            .await?
            .ok_or_else(|| {
                Error::InternalError("job row vanished immediately after insert".to_string())
            })?;

        let counts_as_unclaimed = !request.blocked && semaphore_count <= 0;
        self.bump_stats_on_create(request.analysis_id, counts_as_unclaimed).await?;

        Ok(Some(inserted.job_id))
    }

    /// Canonicalizes structured `params` to the stable string used as `job.input_id`,
    /// offloading it to `analysis_data` first if it exceeds the inline length threshold.
    pub(crate) async fn canonicalize_input_id(&self, params: &Value) -> Result<String, Error> {
        let canonical = serde_json::to_string(params)
            .map_err(|e| Error::ParseError(format!("failed to canonicalize input params: {e}")))?;

        if canonical.len() >= OFFLOAD_THRESHOLD {
            let analysis_data_id = self.store_analysis_data_if_needed(&canonical).await?;
            Ok(offload_token(analysis_data_id))
        } else {
            Ok(canonical)
        }
    }

    /// Looks up the job id that would already exist for `(analysis_id, params)`, without
    /// inserting anything. `None` if no such job exists, or if `params` would offload to
    /// `analysis_data` content that was never stored (meaning no job referencing it could
    /// possibly exist either).
    pub async fn find_job_by_input(&self, analysis_id: i32, params: &Value) -> Result<Option<i32>, Error> {
        let canonical = serde_json::to_string(params)
            .map_err(|e| Error::ParseError(format!("failed to canonicalize input params: {e}")))?;

        let input_id = if canonical.len() >= OFFLOAD_THRESHOLD {
            match self.lookup_analysis_data_id(&canonical).await? {
                Some(id) => offload_token(id),
                None => return Ok(None),
            }
        } else {
            canonical
        };

        let existing = job::Entity::find()
            .filter(job::Column::AnalysisId.eq(analysis_id))
            .filter(job::Column::InputId.eq(input_id))
            .one(self.db)
            .await?;

        Ok(existing.map(|j| j.job_id))
    }

    /// Adjusts a funnel job's `semaphore_count` by `delta` in a single relative `UPDATE`, so
    /// two concurrent fan children completing at once each apply their own decrement instead
    /// of racing on a read-then-write of the same snapshot (§5: every mutation is a single SQL
    /// statement; I3 requires the DONE-time decrement to be atomic).
    pub(crate) async fn increment_semaphore_count(
        &self,
        funnel_job_id: i32,
        delta: i32,
    ) -> Result<(), Error> {
        let backend = self.db.get_database_backend();
        let ph = crate::server::store::placeholders(backend, 3);
        let sql = format!(
            "UPDATE job SET semaphore_count = semaphore_count + {} \
             WHERE job_id = {} AND semaphore_count + {} >= 0",
            ph[0], ph[1], ph[2]
        );
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                backend,
                &sql,
                [delta.into(), funnel_job_id.into(), delta.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            let exists = job::Entity::find_by_id(funnel_job_id).one(self.db).await?.is_some();
            if !exists {
                return Err(StoreError::UnknownJob(funnel_job_id).into());
            }
            return Err(crate::server::error::dataflow::DataflowError::SemaphoreUnderflow(
                funnel_job_id,
            )
            .into());
        }

        Ok(())
    }

    /// `counts_as_unclaimed` mirrors the `unclaimed_job_count` invariant in §3
    /// (`status=READY, semaphore_count<=0`): a job created BLOCKED, or already joined to a
    /// funnel with a positive `semaphore_count`, cannot be claimed yet and must not inflate
    /// the counter the scheduler feedback (`num_required_workers`) and `ALL_CLAIMED` status
    /// derivation both read.
    async fn bump_stats_on_create(&self, analysis_id: i32, counts_as_unclaimed: bool) -> Result<(), Error> {
        use entity::analysis_stats;
        use entity::sea_orm_active_enums::AnalysisStatus;

        if self.stats_by_trigger {
            return Ok(());
        }

        let backend = self.db.get_database_backend();
        let ph = crate::server::store::placeholders(backend, 1);
        let bump_sql = if counts_as_unclaimed {
            format!(
                "UPDATE analysis_stats \
                 SET total_job_count = total_job_count + 1, \
                     unclaimed_job_count = unclaimed_job_count + 1 \
                 WHERE analysis_id = {}",
                ph[0]
            )
        } else {
            format!("UPDATE analysis_stats SET total_job_count = total_job_count + 1 WHERE analysis_id = {}", ph[0])
        };
        self.db
            .execute(Statement::from_sql_and_values(backend, &bump_sql, [analysis_id.into()]))
            .await?;

        // The new job's own status carries BLOCKED when its controlling analyses aren't done
        // yet, but the analysis's aggregate status only ever flips to LOADING here when it
        // wasn't already BLOCKED by a control rule — a single unblocked job queued behind a
        // blocked pipeline stage doesn't make the stage ready.
        let stats = analysis_stats::Entity::find_by_id(analysis_id).one(self.db).await?;
        if let Some(stats) = stats {
            if stats.status != AnalysisStatus::Blocked && stats.status != AnalysisStatus::Loading {
                let ph2 = crate::server::store::placeholders(backend, 2);
                let status_sql =
                    format!("UPDATE analysis_stats SET status = {} WHERE analysis_id = {}", ph2[0], ph2[1]);
                self.db
                    .execute(Statement::from_sql_and_values(
                        backend,
                        &status_sql,
                        [AnalysisStatus::Loading.to_value().into(), analysis_id.into()],
                    ))
                    .await?;
            }
        }

        Ok(())
    }
}

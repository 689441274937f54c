//! Analysis statistics and scheduler feedback.
//!
//! `analysis_stats` is a cache: this module re-derives its `status` and `num_required_workers`
//! columns from the analysis's own counters and current job rows. It runs periodically (the
//! worker loop calls it after every completed job) rather than on every single counter
//! mutation, since the store operations in [`crate::server::store`] already keep the raw
//! counters current either directly or via database triggers.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use entity::sea_orm_active_enums::{AnalysisStatus, JobStatus};
use entity::{analysis, analysis_stats, job};

use crate::server::dataflow::is_blocked;
use crate::server::error::Error;

/// Re-derives `analysis_stats.status` and `num_required_workers` for `analysis_id` from its
/// current counters, writing the result back if either changed.
pub async fn refresh_stats<C: ConnectionTrait>(
    db: &C,
    analysis_id: i32,
) -> Result<analysis_stats::Model, Error> {
    let analysis = analysis::Entity::find_by_id(analysis_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError(format!("analysis {analysis_id} has no row")))?;
    let stats = analysis_stats::Entity::find_by_id(analysis_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError(format!("analysis {analysis_id} has no stats row")))?;

    let status = derive_status(db, &analysis, &stats).await?;

    if stats.status == AnalysisStatus::Blocked && status != AnalysisStatus::Blocked {
        crate::server::store::JobStore::new(db).unblock_jobs(analysis_id).await?;
    }

    let num_required_workers = required_workers(&analysis, &stats);

    if status == stats.status && num_required_workers == stats.num_required_workers {
        return Ok(stats);
    }

    let mut active: analysis_stats::ActiveModel = stats.into();
    active.status = Set(status);
    active.num_required_workers = Set(num_required_workers);

    let updated = analysis_stats::Entity::update(active).exec(db).await?;
    Ok(updated)
}

/// Derives an analysis's aggregate status from its counters and current job rows, in the
/// precedence order BLOCKED, DONE, FAILED, ALL_CLAIMED, WORKING, READY.
pub async fn derive_status<C: ConnectionTrait>(
    db: &C,
    analysis: &analysis::Model,
    stats: &analysis_stats::Model,
) -> Result<AnalysisStatus, Error> {
    if is_blocked(db, analysis.analysis_id).await? {
        return Ok(AnalysisStatus::Blocked);
    }

    if stats.total_job_count > 0 && stats.done_job_count == stats.total_job_count {
        return Ok(AnalysisStatus::Done);
    }

    if exceeds_failure_tolerance(analysis, stats) {
        return Ok(AnalysisStatus::Failed);
    }

    if stats.unclaimed_job_count == 0 {
        return Ok(AnalysisStatus::AllClaimed);
    }

    if has_working_job(db, analysis.analysis_id).await? {
        return Ok(AnalysisStatus::Working);
    }

    Ok(AnalysisStatus::Ready)
}

/// `num_required_workers` = `min(hive_capacity, ceil(unclaimed_job_count / batch_size))`.
pub fn required_workers(analysis: &analysis::Model, stats: &analysis_stats::Model) -> i32 {
    if stats.unclaimed_job_count <= 0 {
        return 0;
    }

    let batch_size = analysis.batch_size.max(1) as i64;
    let needed = (stats.unclaimed_job_count + batch_size - 1) / batch_size;
    needed.min(analysis.hive_capacity as i64) as i32
}

fn exceeds_failure_tolerance(analysis: &analysis::Model, stats: &analysis_stats::Model) -> bool {
    if stats.total_job_count == 0 {
        return false;
    }

    let failed_pct = (stats.failed_job_count as f64 / stats.total_job_count as f64) * 100.0;
    failed_pct > analysis.failed_job_tolerance as f64
}

async fn has_working_job<C: ConnectionTrait>(db: &C, analysis_id: i32) -> Result<bool, Error> {
    let working = job::Entity::find()
        .filter(job::Column::AnalysisId.eq(analysis_id))
        .filter(job::Column::Status.is_in([
            JobStatus::Claimed,
            JobStatus::Compilation,
            JobStatus::GetInput,
            JobStatus::Run,
            JobStatus::WriteOutput,
        ]))
        .one(db)
        .await?;

    Ok(working.is_some())
}

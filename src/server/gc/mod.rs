//! Garbage collection: reconciling jobs a dead worker left behind.
//!
//! Invoked once per dead worker detected by the supervisor (a missing heartbeat, or an
//! external signal that the worker's host is gone). Reconciliation never runs inside this
//! crate's own loop — the supervisor decides when a worker is dead and calls
//! [`reconcile_dead_worker`] once per worker id.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use entity::sea_orm_active_enums::{CauseOfDeath, JobStatus};
use entity::{analysis, dataflow_rule, job};

use crate::server::error::Error;
use crate::server::store::create_job::{CreateJobRequest, FunnelJoin};
use crate::server::store::JobStore;

/// Reconciles every job claimed or running under `worker_id` when that worker is declared
/// dead with `cause_of_death`.
///
/// Runs the three-step procedure: bare `CLAIMED` jobs go straight back to `READY`; jobs mid
/// execution are first offered to [`gc_dataflow`] (a resource-overusage-specific branch, then
/// the catch-all `ANYFAILURE` branch) and only aged via `ReleaseAndAge` if neither dataflows.
/// Every affected job gets a `job_message` row recording why.
pub async fn reconcile_dead_worker<C: ConnectionTrait>(
    db: &C,
    stats_by_trigger: bool,
    worker_id: i32,
    cause_of_death: CauseOfDeath,
) -> Result<(), Error> {
    let store = JobStore::with_stats_mode(db, stats_by_trigger);

    let claimed = job::Entity::find()
        .filter(job::Column::WorkerId.eq(worker_id))
        .filter(job::Column::Status.eq(JobStatus::Claimed))
        .all(db)
        .await?;

    for row in claimed {
        store.reset_claimed_to_ready(row.job_id).await?;
        store
            .record_message(
                Some(row.job_id),
                row.analysis_id,
                &format!("worker {worker_id} died ({cause_of_death:?}) before running claimed job"),
                true,
            )
            .await?;
    }

    let working = job::Entity::find()
        .filter(job::Column::WorkerId.eq(worker_id))
        .filter(job::Column::Status.is_in([
            JobStatus::Compilation,
            JobStatus::GetInput,
            JobStatus::Run,
            JobStatus::WriteOutput,
        ]))
        .all(db)
        .await?;

    for row in working {
        let resource_overusage = cause_of_death.is_resource_overusage();

        let dataflowed = if resource_overusage {
            gc_dataflow(db, &store, &row, cause_of_death.branch_name()).await?
        } else {
            false
        };

        let dataflowed = if dataflowed {
            true
        } else {
            gc_dataflow(db, &store, &row, "ANYFAILURE").await?
        };

        if !dataflowed {
            let analysis = analysis::Entity::find_by_id(row.analysis_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::InternalError(format!("analysis {} has no row", row.analysis_id)))?;

            store
                .release_and_age(row.job_id, analysis.max_retry_count, !resource_overusage)
                .await?;
        }

        store
            .record_message(
                Some(row.job_id),
                row.analysis_id,
                &format!(
                    "worker {worker_id} died ({cause_of_death:?}) while job was in {:?}",
                    row.status
                ),
                true,
            )
            .await?;
    }

    Ok(())
}

/// Tries to flow a dead job's own input onward along `branch_name`.
///
/// If a dataflow rule is defined for `(job.analysis_id, branch_name)`, creates a new job in
/// the rule's target analysis carrying the dead job's own input, marks the dead job
/// `PASSED_ON` (which also decrements its funnel counter, if any, via the store's normal
/// status-transition bookkeeping), and returns `true`. Returns `false` if no such rule exists,
/// leaving the job untouched for the caller to route through `ReleaseAndAge` instead.
async fn gc_dataflow<C: ConnectionTrait>(
    db: &C,
    store: &JobStore<'_, C>,
    dead_job: &job::Model,
    branch_name: &str,
) -> Result<bool, Error> {
    let rule = dataflow_rule::Entity::find()
        .filter(dataflow_rule::Column::FromAnalysisId.eq(dead_job.analysis_id))
        .filter(dataflow_rule::Column::BranchCode.eq(branch_name))
        .one(db)
        .await?;

    let rule = match rule {
        Some(rule) => rule,
        None => return Ok(false),
    };

    let target = crate::server::resource_url::ResourceUrl::parse(&rule.to_target)?;
    let logic_name = match target.logic_name {
        Some(name) => name,
        None => {
            return Err(crate::server::error::dataflow::DataflowError::UnresolvedTarget(
                rule.to_target,
            )
            .into())
        }
    };

    let target_analysis = analysis::Entity::find()
        .filter(analysis::Column::LogicName.eq(logic_name.clone()))
        .one(db)
        .await?
        .ok_or(crate::server::error::dataflow::DataflowError::UnresolvedTarget(logic_name))?;

    let own_params = store.decode_input(&dead_job.input_id).await?;

    let downstream_params = match &rule.input_id_template {
        Some(raw_template) => {
            let rendered = crate::server::dataflow::template::Template::compile(raw_template)
                .render(&own_params)?;
            serde_json::from_str(&rendered).map_err(|e| {
                Error::ParseError(format!("gc_dataflow template rendered non-JSON input: {e}"))
            })?
        }
        None => own_params,
    };

    let blocked = crate::server::dataflow::is_blocked(db, target_analysis.analysis_id).await?;

    // This handler job stands in for `dead_job` in a different analysis; it is not a fan child
    // of `dead_job`, so it must not inherit `dead_job`'s own funnel the way a fan child would
    // (`CreateJobRequest::prev_job_id` is still recorded for lineage). `dead_job`'s funnel gets
    // its one decrement below, from the PASSED_ON transition itself.
    store
        .create_job(CreateJobRequest {
            analysis_id: target_analysis.analysis_id,
            params: downstream_params,
            prev_job_id: Some(dead_job.job_id),
            blocked,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::None,
        })
        .await?;

    store.update_status(dead_job.job_id, JobStatus::PassedOn, None).await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    // End-to-end coverage (scenarios S2 and S3) lives in the top-level integration tests,
    // where a seeded pipeline with a dead worker's claimed/running jobs is available.
}

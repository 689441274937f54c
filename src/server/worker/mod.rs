//! Worker lifecycle (§4.2): a process bound to one analysis for its lifetime, polling
//! `ClaimJobsForWorker`, running each job through its phases, and retiring with a recorded
//! `cause_of_death`.
//!
//! A worker is the only thing this crate runs as an ongoing process; the supervisor that
//! spawns workers, watches their heartbeats, and calls [`crate::server::gc::reconcile_dead_worker`]
//! on the ones that go quiet is an external collaborator (§1 Non-goals).

use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use tracing::{info, warn};

use entity::sea_orm_active_enums::{CauseOfDeath, JobStatus};
use entity::{analysis, analysis_stats, job, worker as worker_entity};

use crate::server::config::Config;
use crate::server::dataflow::engine::apply_dataflow;
use crate::server::dataflow::template::merge_params;
use crate::server::error::config::ConfigError;
use crate::server::error::store::StoreError;
use crate::server::error::worker::WorkerError;
use crate::server::error::Error;
use crate::server::job_factory::{self, ColumnNames, JobFactoryConfig, Source, JOB_FACTORY_MODULE_NAME};
use crate::server::model::job_status::MAIN_BRANCH;
use crate::server::runnable::{DataflowSink, RecordingDataflowSink, Runnable, RunnableRegistry};
use crate::server::stats::refresh_stats;
use crate::server::store::update_status::CompletionInfo;
use crate::server::store::JobStore;

/// What happened to a single claimed job once it was done executing.
enum JobOutcome {
    /// The job reached DONE.
    Completed,
    /// The job failed and was aged via `ReleaseAndAge`. `contaminated` is set for a failure
    /// severe enough that this worker should not attempt another job on this analysis
    /// (currently: an unregistered runnable module — every job on this analysis will fail
    /// COMPILATION the same way).
    Failed { contaminated: bool },
}

/// Runs one worker process to completion: resolves which analysis to bind to, registers a
/// `worker` row, loops claiming and executing jobs until a termination predicate fires, then
/// retires with the matching `cause_of_death`.
pub async fn run(
    db: &DatabaseConnection,
    config: &Config,
    registry: &RunnableRegistry,
) -> Result<(), Error> {
    let start = Instant::now();
    let mut jobs_run: u32 = 0;

    let (analysis_id, single_job_id) = resolve_target_analysis(db, config).await?;
    let worker_row = register(db, analysis_id).await?;
    let worker_id = worker_row.worker_id;

    info!(worker_id, analysis_id, single_job = single_job_id.is_some(), "worker registered");

    let cause = loop {
        if let Some(limit) = config.job_limit {
            if jobs_run >= limit {
                break CauseOfDeath::JobLimit;
            }
        }
        if let Some(life_span) = config.life_span {
            if start.elapsed() >= Duration::from_secs(life_span.max(0) as u64) {
                break CauseOfDeath::Lifespan;
            }
        }

        let claimed = claim_next_batch(db, config, worker_id, analysis_id, single_job_id).await?;
        if claimed.is_empty() {
            break CauseOfDeath::NoWork;
        }

        let mut contaminated = false;
        for claimed_job in claimed {
            let job_id = claimed_job.job_id;
            match execute_job(db, registry, &claimed_job).await {
                Ok(JobOutcome::Completed) => {}
                Ok(JobOutcome::Failed { contaminated: true }) => {
                    warn!(job_id, "compilation failure; worker is contaminated");
                    contaminated = true;
                }
                Ok(JobOutcome::Failed { contaminated: false }) => {
                    warn!(job_id, "job failed and was released for retry");
                }
                Err(err) => return Err(err),
            }

            jobs_run += 1;
            refresh_stats(db, analysis_id).await?;

            if contaminated {
                break;
            }
        }

        if contaminated {
            break CauseOfDeath::Contaminated;
        }
        if single_job_id.is_some() {
            break CauseOfDeath::NoWork;
        }
    };

    retire(db, worker_id, cause).await?;
    info!(worker_id, cause = ?cause, jobs_run, "worker retired");

    Ok(())
}

async fn claim_next_batch(
    db: &DatabaseConnection,
    config: &Config,
    worker_id: i32,
    analysis_id: i32,
    single_job_id: Option<i32>,
) -> Result<Vec<job::Model>, Error> {
    let store = JobStore::new(db);

    if let Some(job_id) = single_job_id {
        return Ok(vec![store.reclaim_job(worker_id, job_id).await?]);
    }

    let analysis_row = analysis::Entity::find_by_id(analysis_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError(format!("analysis {analysis_id} has no row")))?;
    let batch_size = config.batch_size.unwrap_or(analysis_row.batch_size).max(0) as u64;

    store.claim_jobs_for_worker(worker_id, analysis_id, batch_size).await
}

/// Picks the analysis this worker binds to for its lifetime: the exact job's owner in
/// single-job debug mode, otherwise the first `--analyses_pattern` match that currently needs
/// workers, falling back to the pattern's first match so a narrowly scoped worker still
/// registers (and promptly retires with `NO_WORK`) instead of refusing to start.
async fn resolve_target_analysis(
    db: &DatabaseConnection,
    config: &Config,
) -> Result<(i32, Option<i32>), Error> {
    if let Some(job_id) = config.job_id {
        let job_row = job::Entity::find_by_id(job_id)
            .one(db)
            .await?
            .ok_or(StoreError::UnknownJob(job_id))?;
        return Ok((job_row.analysis_id, Some(job_id)));
    }

    let candidates: Vec<analysis::Model> = match &config.analyses_pattern {
        Some(pattern) => {
            let re = glob_to_regex(pattern)?;
            analysis::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .filter(|a| re.is_match(&a.logic_name))
                .collect()
        }
        None => analysis::Entity::find().all(db).await?,
    };

    let first = candidates.first().ok_or_else(|| {
        Error::from(ConfigError::InvalidValue {
            var: "analyses_pattern".to_string(),
            reason: "no analysis matched".to_string(),
        })
    })?;

    let mut chosen = first.analysis_id;
    for candidate in &candidates {
        if let Some(stats) = analysis_stats::Entity::find_by_id(candidate.analysis_id).one(db).await? {
            if stats.num_required_workers > 0 {
                chosen = candidate.analysis_id;
                break;
            }
        }
    }

    Ok((chosen, None))
}

/// Translates a shell-style glob (`*`, `?`) into an anchored regex, escaping everything else.
fn glob_to_regex(pattern: &str) -> Result<Regex, Error> {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|e| {
        Error::from(ConfigError::InvalidValue {
            var: "analyses_pattern".to_string(),
            reason: e.to_string(),
        })
    })
}

async fn register(db: &DatabaseConnection, analysis_id: i32) -> Result<worker_entity::Model, Error> {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
    let process_id = std::process::id().to_string();

    let active = worker_entity::ActiveModel {
        worker_id: sea_orm::ActiveValue::NotSet,
        analysis_id: Set(analysis_id),
        meadow_type: Set("LOCAL".to_string()),
        host: Set(host),
        process_id: Set(process_id),
        born: Set(Utc::now().naive_utc()),
        died: Set(None),
        cause_of_death: Set(None),
        last_check_in: Set(Some(Utc::now().naive_utc())),
    };

    let result = worker_entity::Entity::insert(active).exec(db).await?;
    worker_entity::Entity::find_by_id(result.last_insert_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError("worker row vanished immediately after insert".to_string()))
}

async fn retire(db: &DatabaseConnection, worker_id: i32, cause: CauseOfDeath) -> Result<(), Error> {
    let existing = worker_entity::Entity::find_by_id(worker_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError(format!("worker {worker_id} vanished before retirement")))?;

    let mut active: worker_entity::ActiveModel = existing.into();
    active.died = Set(Some(Utc::now().naive_utc()));
    active.cause_of_death = Set(Some(cause));

    worker_entity::Entity::update(active).exec(db).await?;
    Ok(())
}

/// Runs one claimed job through COMPILATION, GET_INPUT, RUN, and WRITE_OUTPUT, persisting
/// each status transition before the phase it names so a dead worker's GC pass can attribute
/// the failure correctly (§4.2).
async fn execute_job(
    db: &DatabaseConnection,
    registry: &RunnableRegistry,
    job_row: &job::Model,
) -> Result<JobOutcome, Error> {
    let store = JobStore::new(db);

    let analysis_row = analysis::Entity::find_by_id(job_row.analysis_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::InternalError(format!("analysis {} has no row", job_row.analysis_id)))?;

    store.update_status(job_row.job_id, JobStatus::Compilation, None).await?;

    if analysis_row.module_name == JOB_FACTORY_MODULE_NAME {
        return run_job_factory(db, &store, &analysis_row, job_row).await;
    }

    let runnable = match registry.build(&analysis_row.module_name) {
        Ok(runnable) => runnable,
        Err(err) => {
            fail_job(&store, job_row, &analysis_row, &err).await?;
            return Ok(JobOutcome::Failed { contaminated: true });
        }
    };

    store.update_status(job_row.job_id, JobStatus::GetInput, None).await?;

    let mut params = match build_params(&store, &analysis_row, job_row, runnable.as_ref()).await {
        Ok(params) => params,
        Err(err) => {
            fail_job(&store, job_row, &analysis_row, &err).await?;
            return Ok(JobOutcome::Failed { contaminated: false });
        }
    };

    if let Err(err) = runnable.fetch_input(&mut params) {
        fail_job(&store, job_row, &analysis_row, &err).await?;
        return Ok(JobOutcome::Failed { contaminated: false });
    }

    store.update_status(job_row.job_id, JobStatus::Run, None).await?;

    let mut sink = RecordingDataflowSink::default();
    let run_start = Instant::now();

    if let Err(err) = runnable.run(&params, &mut sink) {
        fail_job(&store, job_row, &analysis_row, &err).await?;
        return Ok(JobOutcome::Failed { contaminated: false });
    }

    store.update_status(job_row.job_id, JobStatus::WriteOutput, None).await?;

    if let Err(err) = runnable.write_output(&params, &mut sink) {
        fail_job(&store, job_row, &analysis_row, &err).await?;
        return Ok(JobOutcome::Failed { contaminated: false });
    }

    let runtime_msec = i32::try_from(run_start.elapsed().as_millis()).ok();
    apply_dataflow(db, false, job_row, &params, sink.into_events()).await?;
    store
        .update_status(
            job_row.job_id,
            JobStatus::Done,
            Some(CompletionInfo { runtime_msec, query_count: None }),
        )
        .await?;

    Ok(JobOutcome::Completed)
}

/// Resolves a job's merged parameter set: `param_defaults()` lowest priority, the analysis's
/// own configured `parameters` next, and the job's own decoded `input_id` highest (§3, §4.2
/// "resolve parameters, including expanding any `_ext_input_analysis_data_id` indirection").
async fn build_params<C: ConnectionTrait>(
    store: &JobStore<'_, C>,
    analysis_row: &analysis::Model,
    job_row: &job::Model,
    runnable: &dyn Runnable,
) -> Result<Value, Error> {
    let own_input = store.decode_input(&job_row.input_id).await?;

    let analysis_params: Value = serde_json::from_str(&analysis_row.parameters).map_err(|e| {
        Error::ParseError(format!(
            "analysis {} parameters are not valid JSON: {e}",
            analysis_row.analysis_id
        ))
    })?;

    let merged = merge_params(&analysis_params, &runnable.param_defaults());
    Ok(merge_params(&own_input, &merged))
}

/// Ages a failed job for retry (or exhaustion) and records why, per the per-job failure
/// handling in §4.2.
async fn fail_job<C: ConnectionTrait>(
    store: &JobStore<'_, C>,
    job_row: &job::Model,
    analysis_row: &analysis::Model,
    err: &Error,
) -> Result<(), Error> {
    store.release_and_age(job_row.job_id, analysis_row.max_retry_count, true).await?;
    store
        .record_message(Some(job_row.job_id), job_row.analysis_id, &err.to_string(), true)
        .await?;
    Ok(())
}

/// Runs the job factory (§4.6) instead of a registered [`Runnable`]: decodes the job's own
/// input as a [`JobFactoryConfig`], expands it into one parameter set per downstream job, and
/// dataflows them all on the main branch exactly as an ordinary runnable's `write_output()`
/// would.
async fn run_job_factory<C: ConnectionTrait>(
    db: &C,
    store: &JobStore<'_, C>,
    analysis_row: &analysis::Model,
    job_row: &job::Model,
) -> Result<JobOutcome, Error> {
    store.update_status(job_row.job_id, JobStatus::GetInput, None).await?;

    let own_input = match store.decode_input(&job_row.input_id).await {
        Ok(value) => value,
        Err(err) => {
            fail_job(store, job_row, analysis_row, &err).await?;
            return Ok(JobOutcome::Failed { contaminated: false });
        }
    };

    let factory_config = match parse_job_factory_config(&own_input) {
        Ok(config) => config,
        Err(err) => {
            fail_job(store, job_row, analysis_row, &err).await?;
            return Ok(JobOutcome::Failed { contaminated: true });
        }
    };

    store.update_status(job_row.job_id, JobStatus::Run, None).await?;

    let rows = match job_factory::expand(db, &factory_config).await {
        Ok(rows) => rows,
        Err(err) => {
            fail_job(store, job_row, analysis_row, &err).await?;
            return Ok(JobOutcome::Failed { contaminated: false });
        }
    };

    store.update_status(job_row.job_id, JobStatus::WriteOutput, None).await?;

    let mut sink = RecordingDataflowSink::default();
    for row in rows {
        sink.dataflow_output_id(row, MAIN_BRANCH);
    }

    apply_dataflow(db, false, job_row, &own_input, sink.into_events()).await?;
    store
        .update_status(job_row.job_id, JobStatus::Done, Some(CompletionInfo::default()))
        .await?;

    Ok(JobOutcome::Completed)
}

/// Parses a job factory job's decoded input into a [`JobFactoryConfig`]. Exactly one of
/// `inputlist`/`inputfile`/`inputquery`/`inputcmd` is required; `randomize`, `step`, and
/// `key_column` mirror the minibatching controls in §4.6.
fn parse_job_factory_config(params: &Value) -> Result<JobFactoryConfig, Error> {
    let obj = params
        .as_object()
        .ok_or_else(|| WorkerError::ParamDecode("JobFactory job input must be an object".to_string()))?;

    let source = if let Some(list) = obj.get("inputlist") {
        Source::InputList(list.clone())
    } else if let Some(path) = obj.get("inputfile").and_then(Value::as_str) {
        Source::InputFile {
            path: path.to_string(),
            delimiter: parse_delimiter(obj),
            column_names: parse_column_names(obj),
        }
    } else if let Some(sql) = obj.get("inputquery").and_then(Value::as_str) {
        Source::InputQuery(sql.to_string())
    } else if let Some(command) = obj.get("inputcmd").and_then(Value::as_str) {
        Source::InputCmd {
            command: command.to_string(),
            delimiter: parse_delimiter(obj),
            column_names: parse_column_names(obj),
        }
    } else {
        return Err(WorkerError::ParamDecode(
            "JobFactory job requires one of inputlist/inputfile/inputquery/inputcmd".to_string(),
        )
        .into());
    };

    Ok(JobFactoryConfig {
        source,
        randomize: obj.get("randomize").and_then(Value::as_bool).unwrap_or(false),
        step: obj.get("step").and_then(Value::as_u64).map(|n| n as usize),
        key_column: obj.get("key_column").and_then(Value::as_str).map(str::to_string),
    })
}

fn parse_delimiter(obj: &serde_json::Map<String, Value>) -> Option<char> {
    obj.get("delimiter").and_then(Value::as_str).and_then(|s| s.chars().next())
}

fn parse_column_names(obj: &serde_json::Map<String, Value>) -> ColumnNames {
    if obj.get("fan_out_header").and_then(Value::as_bool).unwrap_or(false) {
        ColumnNames::FromHeader
    } else if let Some(names) = obj.get("column_names").and_then(Value::as_array) {
        ColumnNames::Explicit(names.iter().filter_map(Value::as_str).map(str::to_string).collect())
    } else {
        ColumnNames::Unnamed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn glob_star_matches_prefix() {
        let re = glob_to_regex("take_*").unwrap();
        assert!(re.is_match("take_b_apart"));
        assert!(!re.is_match("add_together"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("part_multiply.v2").unwrap();
        assert!(re.is_match("part_multiply.v2"));
        assert!(!re.is_match("part_multiplyXv2"));
    }

    #[test]
    fn job_factory_config_requires_a_source() {
        let err = parse_job_factory_config(&json!({})).unwrap_err();
        assert!(matches!(err, Error::WorkerError(WorkerError::ParamDecode(_))));
    }

    #[test]
    fn job_factory_config_parses_inputlist_with_step() {
        let config =
            parse_job_factory_config(&json!({"inputlist": [1, 2, 3], "step": 2, "key_column": "id"}))
                .unwrap();
        assert!(matches!(config.source, Source::InputList(_)));
        assert_eq!(config.step, Some(2));
        assert_eq!(config.key_column.as_deref(), Some("id"));
    }
}

//! Integration tests for the job store (§4.1, §8 invariants I1/I2/I5, scenarios S4/S6).
//!
//! Exercises `CreateJob`, `ClaimJobsForWorker`, `UpdateStatus`, and `ReleaseAndAge` against a
//! real (in-memory) SQLite connection, where the dialect-specific raw SQL this crate issues
//! actually runs instead of being merely type-checked.

mod common;

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use entity::sea_orm_active_enums::JobStatus;
use entity::worker as worker_entity;

use apiary::server::store::analysis_data::OFFLOAD_THRESHOLD;
use apiary::server::store::create_job::{CreateJobRequest, FunnelJoin};
use apiary::server::store::JobStore;

use common::{memory_db, seed_analysis, seed_job, AnalysisFixture};

async fn seed_worker(db: &sea_orm::DatabaseConnection, analysis_id: i32) -> i32 {
    let active = worker_entity::ActiveModel {
        worker_id: sea_orm::ActiveValue::NotSet,
        analysis_id: sea_orm::Set(analysis_id),
        meadow_type: sea_orm::Set("LOCAL".to_string()),
        host: sea_orm::Set("test-host".to_string()),
        process_id: sea_orm::Set("1".to_string()),
        born: sea_orm::Set(Utc::now().naive_utc()),
        died: sea_orm::Set(None),
        cause_of_death: sea_orm::Set(None),
        last_check_in: sea_orm::Set(None),
    };
    worker_entity::Entity::insert(active).exec(db).await.expect("insert worker").last_insert_id
}

/// I1: the same `(analysis_id, input_id)` pair can never produce two jobs.
#[tokio::test]
async fn create_job_dedups_identical_input() {
    let db = memory_db().await;
    let analysis_id = seed_analysis(&db, AnalysisFixture::new("alpha", "Noop")).await;
    let store = JobStore::new(&db);

    let params = json!({"a": 1, "b": 2});
    let first = store
        .create_job(CreateJobRequest {
            analysis_id,
            params: params.clone(),
            prev_job_id: None,
            blocked: false,
            semaphore_count: None,
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap();
    let second = store
        .create_job(CreateJobRequest {
            analysis_id,
            params,
            prev_job_id: None,
            blocked: false,
            semaphore_count: None,
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());

    let stats = entity::analysis_stats::Entity::find_by_id(analysis_id).one(&db).await.unwrap().unwrap();
    assert_eq!(stats.total_job_count, 1);
    assert_eq!(stats.unclaimed_job_count, 1);
}

/// S6: two racing `CreateJob` calls against the same funnel, with the same input, leave the
/// funnel's `semaphore_count` incremented by exactly one — the losing side must cancel its
/// own speculative increment.
#[tokio::test]
async fn create_job_race_cancels_losing_sides_semaphore_increment() {
    let db = memory_db().await;
    let fan_analysis = seed_analysis(&db, AnalysisFixture::new("fan", "Noop")).await;
    let funnel_analysis = seed_analysis(&db, AnalysisFixture::new("funnel", "Noop")).await;
    let store = JobStore::new(&db);

    let funnel_id = store
        .create_job(CreateJobRequest {
            analysis_id: funnel_analysis,
            params: json!({"funnel": true}),
            prev_job_id: None,
            blocked: false,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap()
        .unwrap();

    let request = || CreateJobRequest {
        analysis_id: fan_analysis,
        params: json!({"digit": 3}),
        prev_job_id: None,
        blocked: false,
        semaphore_count: Some(0),
        semaphored_job_id: FunnelJoin::Explicit(funnel_id),
    };

    let first = store.create_job(request()).await.unwrap();
    let second = store.create_job(request()).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());

    let funnel = entity::job::Entity::find_by_id(funnel_id).one(&db).await.unwrap().unwrap();
    assert_eq!(funnel.semaphore_count, 1);
}

/// I2 + virgin-then-retry ordering (§4.1): a batch claim prefers jobs that have never failed,
/// only falling back to previously-retried jobs once the virgin pool is exhausted, and no
/// claimed job is ever handed to two workers.
#[tokio::test]
async fn claim_prefers_virgin_jobs_before_retried_ones() {
    let db = memory_db().await;
    let analysis_id = seed_analysis(&db, AnalysisFixture::new("alpha", "Noop").batch_size(2)).await;
    let worker_id = seed_worker(&db, analysis_id).await;
    let store = JobStore::new(&db);

    // A job that has already failed once (retry_count = 1 after ReleaseAndAge ages it back
    // to READY).
    let retried_job = seed_job(&db, analysis_id, json!({"k": "retried"})).await;
    store.update_status(retried_job, JobStatus::Claimed, None).await.unwrap();
    store.update_status(retried_job, JobStatus::Run, None).await.unwrap();
    store.release_and_age(retried_job, 3, true).await.unwrap();

    // Two virgin jobs, seeded after the retried one.
    let virgin_a = seed_job(&db, analysis_id, json!({"k": "virgin_a"})).await;
    let virgin_b = seed_job(&db, analysis_id, json!({"k": "virgin_b"})).await;

    let claimed = store.claim_jobs_for_worker(worker_id, analysis_id, 2).await.unwrap();

    let claimed_ids: Vec<i32> = claimed.iter().map(|j| j.job_id).collect();
    assert_eq!(claimed_ids.len(), 2);
    assert!(claimed_ids.contains(&virgin_a));
    assert!(claimed_ids.contains(&virgin_b));
    assert!(!claimed_ids.contains(&retried_job));

    for job in &claimed {
        assert_eq!(job.status, JobStatus::Claimed);
        assert_eq!(job.worker_id, Some(worker_id));
    }

    // The retried job is picked up once the virgin pool is exhausted.
    let second_batch = store.claim_jobs_for_worker(worker_id, analysis_id, 2).await.unwrap();
    assert_eq!(second_batch.len(), 1);
    assert_eq!(second_batch[0].job_id, retried_job);
}

/// I5 + S4: with `max_retry_count = 2`, a job that fails three times in a row ends up FAILED
/// with `retry_count = 3`, and `analysis_stats.failed_job_count` is incremented exactly once.
#[tokio::test]
async fn retry_exhaustion_fails_job_after_max_retries() {
    let db = memory_db().await;
    let analysis_id =
        seed_analysis(&db, AnalysisFixture::new("flaky", "Noop").max_retry_count(2)).await;
    let job_id = seed_job(&db, analysis_id, json!({"k": "v"})).await;
    let store = JobStore::new(&db);

    // Attempt 1: READY -> CLAIMED -> RUN -> fails -> READY, retry_count 1.
    let after_1 = store.release_and_age(job_id, 2, true).await.unwrap();
    assert_eq!(after_1.status, JobStatus::Ready);
    assert_eq!(after_1.retry_count, 1);

    // Attempt 2: fails again -> READY, retry_count 2.
    let after_2 = store.release_and_age(job_id, 2, true).await.unwrap();
    assert_eq!(after_2.status, JobStatus::Ready);
    assert_eq!(after_2.retry_count, 2);

    // Attempt 3: retry_count (2) is no longer < max_retry_count (2) -> FAILED, retry_count 3.
    let after_3 = store.release_and_age(job_id, 2, true).await.unwrap();
    assert_eq!(after_3.status, JobStatus::Failed);
    assert_eq!(after_3.retry_count, 3);

    let stats = entity::analysis_stats::Entity::find_by_id(analysis_id).one(&db).await.unwrap().unwrap();
    assert_eq!(stats.failed_job_count, 1);
}

/// Round-trip law: an `input_id` at or above the offload threshold is stored once in
/// `analysis_data` and decodes back to the exact original parameters.
#[tokio::test]
async fn oversized_input_offloads_and_round_trips() {
    let db = memory_db().await;
    let analysis_id = seed_analysis(&db, AnalysisFixture::new("alpha", "Noop")).await;
    let store = JobStore::new(&db);

    let long_value = "x".repeat(OFFLOAD_THRESHOLD);
    let params = json!({"payload": long_value});
    assert!(serde_json::to_string(&params).unwrap().len() >= OFFLOAD_THRESHOLD);

    let job_id = store
        .create_job(CreateJobRequest {
            analysis_id,
            params: params.clone(),
            prev_job_id: None,
            blocked: false,
            semaphore_count: None,
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap()
        .unwrap();

    let job = entity::job::Entity::find_by_id(job_id).one(&db).await.unwrap().unwrap();
    assert!(job.input_id.starts_with("_ext_input_analysis_data_id "));

    let decoded = store.decode_input(&job.input_id).await.unwrap();
    assert_eq!(decoded, params);

    // Re-creating an identical oversized job is still deduplicated via the content hash, and
    // doesn't write a second analysis_data row.
    let again = store
        .create_job(CreateJobRequest {
            analysis_id,
            params,
            prev_job_id: None,
            blocked: false,
            semaphore_count: None,
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap();
    assert!(again.is_none());

    let rows = entity::analysis_data::Entity::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
}

/// `StoreOutFiles` replaces the `(job_id, retry)` row rather than accumulating duplicates, so
/// a job's second attempt doesn't collide with capture paths left by its first.
#[tokio::test]
async fn store_out_files_replaces_the_same_retry_slot() {
    let db = memory_db().await;
    let analysis_id = seed_analysis(&db, AnalysisFixture::new("alpha", "Noop")).await;
    let job_id = seed_job(&db, analysis_id, json!({"k": "v"})).await;
    let store = JobStore::new(&db);

    store.store_out_files(job_id, 0, Some("/tmp/out.0.log"), Some("/tmp/err.0.log")).await.unwrap();
    store.store_out_files(job_id, 0, Some("/tmp/out.0.retry.log"), None).await.unwrap();
    store.store_out_files(job_id, 1, Some("/tmp/out.1.log"), Some("/tmp/err.1.log")).await.unwrap();

    let rows = entity::job_file::Entity::find()
        .filter(entity::job_file::Column::JobId.eq(job_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let retry_0 = rows.iter().find(|r| r.retry == 0).unwrap();
    assert_eq!(retry_0.stdout_file.as_deref(), Some("/tmp/out.0.retry.log"));
    assert_eq!(retry_0.stderr_file, None);

    let retry_1 = rows.iter().find(|r| r.retry == 1).unwrap();
    assert_eq!(retry_1.stdout_file.as_deref(), Some("/tmp/out.1.log"));
    assert_eq!(retry_1.stderr_file.as_deref(), Some("/tmp/err.1.log"));
}

/// A job reaching DONE bumps `done_job_count`; a semaphored job reaching DONE decrements its
/// funnel's `semaphore_count` atomically with the status update.
#[tokio::test]
async fn update_status_done_decrements_funnel_semaphore() {
    let db = memory_db().await;
    let fan_analysis = seed_analysis(&db, AnalysisFixture::new("fan", "Noop")).await;
    let funnel_analysis = seed_analysis(&db, AnalysisFixture::new("funnel", "Noop")).await;
    let store = JobStore::new(&db);

    let funnel_id = store
        .create_job(CreateJobRequest {
            analysis_id: funnel_analysis,
            params: json!({}),
            prev_job_id: None,
            blocked: false,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap()
        .unwrap();

    let child_id = store
        .create_job(CreateJobRequest {
            analysis_id: fan_analysis,
            params: json!({"digit": 1}),
            prev_job_id: None,
            blocked: false,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::Explicit(funnel_id),
        })
        .await
        .unwrap()
        .unwrap();

    let funnel = entity::job::Entity::find_by_id(funnel_id).one(&db).await.unwrap().unwrap();
    assert_eq!(funnel.semaphore_count, 1);

    store.update_status(child_id, JobStatus::Done, None).await.unwrap();

    let funnel = entity::job::Entity::find_by_id(funnel_id).one(&db).await.unwrap().unwrap();
    assert_eq!(funnel.semaphore_count, 0);

    let fan_stats =
        entity::analysis_stats::Entity::find_by_id(fan_analysis).one(&db).await.unwrap().unwrap();
    assert_eq!(fan_stats.done_job_count, 1);
}

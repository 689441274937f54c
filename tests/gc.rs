//! Integration tests for garbage collection (§8 scenarios S2, S3).

mod common;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use entity::sea_orm_active_enums::{CauseOfDeath, JobStatus};

use apiary::server::gc::reconcile_dead_worker;
use apiary::server::store::create_job::{CreateJobRequest, FunnelJoin};
use apiary::server::store::JobStore;

use common::{memory_db, seed_analysis, seed_dataflow_rule, seed_job, AnalysisFixture};

async fn seed_worker(db: &sea_orm::DatabaseConnection, analysis_id: i32) -> i32 {
    use chrono::Utc;
    let active = entity::worker::ActiveModel {
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
    entity::worker::Entity::insert(active).exec(db).await.expect("insert worker").last_insert_id
}

/// S2: a worker dies with one job mid-RUN and two others merely claimed. The RUN job is aged
/// for retry (retry_count 0 -> 1, back to READY); the two bare-claimed jobs reset to READY
/// without touching their retry counts. Every affected job gets a recorded message.
#[tokio::test]
async fn dead_worker_ages_running_job_and_resets_bare_claims() {
    let db = memory_db().await;
    let analysis_id = seed_analysis(&db, AnalysisFixture::new("alpha", "Noop").max_retry_count(3)).await;
    let worker_id = seed_worker(&db, analysis_id).await;
    let store = JobStore::new(&db);

    let running_job = seed_job(&db, analysis_id, json!({"k": "running"})).await;
    let claimed_a = seed_job(&db, analysis_id, json!({"k": "claimed_a"})).await;
    let claimed_b = seed_job(&db, analysis_id, json!({"k": "claimed_b"})).await;

    for job_id in [running_job, claimed_a, claimed_b] {
        store.reclaim_job(worker_id, job_id).await.unwrap();
    }
    store.update_status(running_job, JobStatus::Compilation, None).await.unwrap();
    store.update_status(running_job, JobStatus::GetInput, None).await.unwrap();
    store.update_status(running_job, JobStatus::Run, None).await.unwrap();

    reconcile_dead_worker(&db, false, worker_id, CauseOfDeath::Fatality).await.unwrap();

    let running = entity::job::Entity::find_by_id(running_job).one(&db).await.unwrap().unwrap();
    assert_eq!(running.status, JobStatus::Ready);
    assert_eq!(running.retry_count, 1);
    assert_eq!(running.worker_id, None);

    for job_id in [claimed_a, claimed_b] {
        let row = entity::job::Entity::find_by_id(job_id).one(&db).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Ready);
        assert_eq!(row.retry_count, 0);
    }

    let messages = entity::job_message::Entity::find()
        .filter(entity::job_message::Column::AnalysisId.eq(analysis_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(messages.len(), 3);
}

/// S3: a worker dies from exceeding its memory limit while running a job whose analysis has a
/// `MEMLIMIT` dataflow rule. The dead job is routed onward to the rule's target analysis with
/// its own input carried over, marked PASSED_ON, and — since it was a fan child — its funnel's
/// semaphore is decremented exactly once.
#[tokio::test]
async fn memlimit_death_routes_through_gc_dataflow_rule() {
    let db = memory_db().await;
    let source = seed_analysis(&db, AnalysisFixture::new("heavy", "Noop")).await;
    let handler = seed_analysis(&db, AnalysisFixture::new("handler", "Noop")).await;
    let worker_id = seed_worker(&db, source).await;
    let store = JobStore::new(&db);

    seed_dataflow_rule(&db, source, "MEMLIMIT", "handler", None).await;

    let funnel_id = store
        .create_job(CreateJobRequest {
            analysis_id: handler,
            params: json!({"funnel": true}),
            prev_job_id: None,
            blocked: false,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .unwrap()
        .unwrap();

    let dead_job = store
        .create_job(CreateJobRequest {
            analysis_id: source,
            params: json!({"k": "heavy-input"}),
            prev_job_id: None,
            blocked: false,
            semaphore_count: Some(0),
            semaphored_job_id: FunnelJoin::Explicit(funnel_id),
        })
        .await
        .unwrap()
        .unwrap();

    store.reclaim_job(worker_id, dead_job).await.unwrap();
    store.update_status(dead_job, JobStatus::Compilation, None).await.unwrap();
    store.update_status(dead_job, JobStatus::GetInput, None).await.unwrap();
    store.update_status(dead_job, JobStatus::Run, None).await.unwrap();

    let funnel_before = entity::job::Entity::find_by_id(funnel_id).one(&db).await.unwrap().unwrap();
    assert_eq!(funnel_before.semaphore_count, 1);

    reconcile_dead_worker(&db, false, worker_id, CauseOfDeath::MemLimit).await.unwrap();

    let dead_after = entity::job::Entity::find_by_id(dead_job).one(&db).await.unwrap().unwrap();
    assert_eq!(dead_after.status, JobStatus::PassedOn);

    let routed = entity::job::Entity::find()
        .filter(entity::job::Column::AnalysisId.eq(handler))
        .filter(entity::job::Column::PrevJobId.eq(dead_job))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(routed.len(), 1);
    let decoded = store.decode_input(&routed[0].input_id).await.unwrap();
    assert_eq!(decoded, json!({"k": "heavy-input"}));

    let funnel_after = entity::job::Entity::find_by_id(funnel_id).one(&db).await.unwrap().unwrap();
    assert_eq!(funnel_after.semaphore_count, 0);
}

//! Shared fixtures for the top-level integration tests.
//!
//! Every test in this suite runs against a fresh in-memory SQLite database, migrated with
//! the same `migration::Migrator` the `apiaryd` binary runs at startup. Seeding an `analysis`
//! row here also seeds its `analysis_stats` row, standing in for the pipeline config loader
//! (§1 non-goal — out of scope for this crate, but its output is what these tests assume is
//! already in the store by the time a worker starts).

use sea_orm::{ActiveValue::NotSet, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};

use entity::sea_orm_active_enums::AnalysisStatus;
use entity::{analysis, analysis_ctrl_rule, analysis_stats, dataflow_rule};

use apiary::server::store::create_job::{CreateJobRequest, FunnelJoin};
use apiary::server::store::JobStore;

/// Opens a fresh in-memory SQLite connection and runs every pending migration.
pub async fn memory_db() -> DatabaseConnection {
    let db = sea_orm::Database::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite connection");
    migration::Migrator::up(&db, None).await.expect("failed to run migrations");
    db
}

/// Parameters accepted by [`seed_analysis`]; defaults match a lightly-configured analysis
/// (batch size 10, one worker, three retries, no failure tolerance).
pub struct AnalysisFixture<'a> {
    pub logic_name: &'a str,
    pub module_name: &'a str,
    pub parameters: Value,
    pub batch_size: i32,
    pub hive_capacity: i32,
    pub max_retry_count: i32,
    pub failed_job_tolerance: i32,
}

impl<'a> AnalysisFixture<'a> {
    pub fn new(logic_name: &'a str, module_name: &'a str) -> Self {
        Self {
            logic_name,
            module_name,
            parameters: json!({}),
            batch_size: 10,
            hive_capacity: 1,
            max_retry_count: 3,
            failed_job_tolerance: 0,
        }
    }

    pub fn batch_size(mut self, n: i32) -> Self {
        self.batch_size = n;
        self
    }

    pub fn max_retry_count(mut self, n: i32) -> Self {
        self.max_retry_count = n;
        self
    }

    pub fn failed_job_tolerance(mut self, pct: i32) -> Self {
        self.failed_job_tolerance = pct;
        self
    }
}

/// Inserts an `analysis` row plus its freshly-`LOADING` `analysis_stats` row, returning the
/// new `analysis_id`.
pub async fn seed_analysis(db: &DatabaseConnection, fixture: AnalysisFixture<'_>) -> i32 {
    let active = analysis::ActiveModel {
        analysis_id: NotSet,
        logic_name: Set(fixture.logic_name.to_string()),
        module_name: Set(fixture.module_name.to_string()),
        parameters: Set(fixture.parameters.to_string()),
        batch_size: Set(fixture.batch_size),
        hive_capacity: Set(fixture.hive_capacity),
        max_retry_count: Set(fixture.max_retry_count),
        failed_job_tolerance: Set(fixture.failed_job_tolerance),
    };
    let result = analysis::Entity::insert(active).exec(db).await.expect("insert analysis");
    let analysis_id = result.last_insert_id;

    let stats = analysis_stats::ActiveModel {
        analysis_id: Set(analysis_id),
        total_job_count: Set(0),
        unclaimed_job_count: Set(0),
        done_job_count: Set(0),
        failed_job_count: Set(0),
        num_required_workers: Set(0),
        status: Set(AnalysisStatus::Loading),
    };
    analysis_stats::Entity::insert(stats).exec(db).await.expect("insert analysis_stats");

    analysis_id
}

/// Inserts a dataflow rule routing `branch_code` from `from_analysis_id` to `to_target`.
pub async fn seed_dataflow_rule(
    db: &DatabaseConnection,
    from_analysis_id: i32,
    branch_code: &str,
    to_target: &str,
    input_id_template: Option<&str>,
) -> i32 {
    let active = dataflow_rule::ActiveModel {
        id: NotSet,
        from_analysis_id: Set(from_analysis_id),
        branch_code: Set(branch_code.to_string()),
        to_target: Set(to_target.to_string()),
        input_id_template: Set(input_id_template.map(str::to_string)),
    };
    let result = dataflow_rule::Entity::insert(active).exec(db).await.expect("insert dataflow_rule");
    result.last_insert_id
}

/// Inserts a control rule blocking `controlled_analysis_id` until `condition_analysis_id`
/// reaches DONE.
pub async fn seed_ctrl_rule(
    db: &DatabaseConnection,
    condition_analysis_id: i32,
    controlled_analysis_id: i32,
) -> i32 {
    let active = analysis_ctrl_rule::ActiveModel {
        id: NotSet,
        condition_analysis_id: Set(condition_analysis_id),
        controlled_analysis_id: Set(controlled_analysis_id),
    };
    let result =
        analysis_ctrl_rule::Entity::insert(active).exec(db).await.expect("insert analysis_ctrl_rule");
    result.last_insert_id
}

/// Seeds a job through the ordinary `CreateJob` path (no `prev_job`), as a pipeline's initial
/// seed job would be.
pub async fn seed_job(db: &DatabaseConnection, analysis_id: i32, params: Value) -> i32 {
    let store = JobStore::new(db);
    store
        .create_job(CreateJobRequest {
            analysis_id,
            params,
            prev_job_id: None,
            blocked: false,
            semaphore_count: None,
            semaphored_job_id: FunnelJoin::None,
        })
        .await
        .expect("create_job should not fail")
        .expect("seed job should not collide with an existing one")
}

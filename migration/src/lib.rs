pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_analysis_table;
mod m20260101_000002_create_analysis_stats_table;
mod m20260101_000003_create_analysis_ctrl_rule_table;
mod m20260101_000004_create_dataflow_rule_table;
mod m20260101_000005_create_analysis_data_table;
mod m20260101_000006_create_worker_table;
mod m20260101_000007_create_job_table;
mod m20260101_000008_create_job_file_table;
mod m20260101_000009_create_job_message_table;
mod m20260101_000010_create_accu_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_analysis_table::Migration),
            Box::new(m20260101_000002_create_analysis_stats_table::Migration),
            Box::new(m20260101_000003_create_analysis_ctrl_rule_table::Migration),
            Box::new(m20260101_000004_create_dataflow_rule_table::Migration),
            Box::new(m20260101_000005_create_analysis_data_table::Migration),
            Box::new(m20260101_000006_create_worker_table::Migration),
            Box::new(m20260101_000007_create_job_table::Migration),
            Box::new(m20260101_000008_create_job_file_table::Migration),
            Box::new(m20260101_000009_create_job_message_table::Migration),
            Box::new(m20260101_000010_create_accu_table::Migration),
        ]
    }
}

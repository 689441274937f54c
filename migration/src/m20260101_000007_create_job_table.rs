use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_analysis_table::Analysis;
use crate::m20260101_000006_create_worker_table::Worker;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(pk_auto(Job::JobId))
                    .col(integer(Job::AnalysisId))
                    .col(string(Job::InputId))
                    .col(integer_null(Job::PrevJobId))
                    .col(integer_null(Job::WorkerId))
                    .col(string_len(Job::Status, 16).default("READY"))
                    .col(integer(Job::RetryCount).default(0))
                    .col(integer(Job::SemaphoreCount).default(0))
                    .col(integer_null(Job::SemaphoredJobId))
                    .col(date_time_null(Job::Completed))
                    .col(integer_null(Job::RuntimeMsec))
                    .col(integer_null(Job::QueryCount))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Job::Table, Job::AnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Job::Table, Job::WorkerId)
                            .to(Worker::Table, Worker::WorkerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Job::Table, Job::PrevJobId)
                            .to(Job::Table, Job::JobId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Job::Table, Job::SemaphoredJobId)
                            .to(Job::Table, Job::JobId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_job_analysis_input")
                    .table(Job::Table)
                    .col(Job::AnalysisId)
                    .col(Job::InputId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_analysis_status")
                    .table(Job::Table)
                    .col(Job::AnalysisId)
                    .col(Job::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Job {
    Table,
    JobId,
    AnalysisId,
    InputId,
    PrevJobId,
    WorkerId,
    Status,
    RetryCount,
    SemaphoreCount,
    SemaphoredJobId,
    Completed,
    RuntimeMsec,
    QueryCount,
}

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_analysis_table::Analysis;
use crate::m20260101_000007_create_job_table::Job;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobMessage::Table)
                    .if_not_exists()
                    .col(pk_auto(JobMessage::JobMessageId))
                    .col(integer_null(JobMessage::JobId))
                    .col(integer(JobMessage::AnalysisId))
                    .col(text(JobMessage::Message))
                    .col(boolean(JobMessage::IsError).default(false))
                    .col(date_time(JobMessage::Time))
                    .foreign_key(
                        ForeignKey::create()
                            .from(JobMessage::Table, JobMessage::JobId)
                            .to(Job::Table, Job::JobId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(JobMessage::Table, JobMessage::AnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobMessage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum JobMessage {
    Table,
    JobMessageId,
    JobId,
    AnalysisId,
    Message,
    IsError,
    Time,
}

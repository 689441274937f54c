use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000007_create_job_table::Job;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobFile::Table)
                    .if_not_exists()
                    .col(integer(JobFile::JobId))
                    .col(integer(JobFile::Retry))
                    .col(string_null(JobFile::StdoutFile))
                    .col(string_null(JobFile::StderrFile))
                    .primary_key(
                        Index::create()
                            .col(JobFile::JobId)
                            .col(JobFile::Retry),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(JobFile::Table, JobFile::JobId)
                            .to(Job::Table, Job::JobId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobFile::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum JobFile {
    Table,
    JobId,
    Retry,
    StdoutFile,
    StderrFile,
}

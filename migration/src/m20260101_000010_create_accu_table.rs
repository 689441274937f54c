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
                    .table(Accu::Table)
                    .if_not_exists()
                    .col(pk_auto(Accu::Id))
                    .col(integer(Accu::SemaphoredJobId))
                    .col(string(Accu::AccuName))
                    .col(string(Accu::AccuAddress))
                    .col(text(Accu::Value))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Accu::Table, Accu::SemaphoredJobId)
                            .to(Job::Table, Job::JobId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accu::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Accu {
    Table,
    Id,
    SemaphoredJobId,
    AccuName,
    AccuAddress,
    Value,
}

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_analysis_table::Analysis;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Worker::Table)
                    .if_not_exists()
                    .col(pk_auto(Worker::WorkerId))
                    .col(integer(Worker::AnalysisId))
                    .col(string(Worker::MeadowType))
                    .col(string(Worker::Host))
                    .col(string(Worker::ProcessId))
                    .col(date_time(Worker::Born))
                    .col(date_time_null(Worker::Died))
                    .col(string_len_null(Worker::CauseOfDeath, 16))
                    .col(date_time_null(Worker::LastCheckIn))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Worker::Table, Worker::AnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Worker::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Worker {
    Table,
    WorkerId,
    AnalysisId,
    MeadowType,
    Host,
    ProcessId,
    Born,
    Died,
    CauseOfDeath,
    LastCheckIn,
}

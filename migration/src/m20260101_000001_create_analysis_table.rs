use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Analysis::Table)
                    .if_not_exists()
                    .col(pk_auto(Analysis::AnalysisId))
                    .col(string_uniq(Analysis::LogicName))
                    .col(string(Analysis::ModuleName))
                    .col(text(Analysis::Parameters))
                    .col(integer(Analysis::BatchSize).default(1))
                    .col(integer(Analysis::HiveCapacity).default(1))
                    .col(integer(Analysis::MaxRetryCount).default(3))
                    .col(integer(Analysis::FailedJobTolerance).default(0))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Analysis::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Analysis {
    Table,
    AnalysisId,
    LogicName,
    ModuleName,
    Parameters,
    BatchSize,
    HiveCapacity,
    MaxRetryCount,
    FailedJobTolerance,
}

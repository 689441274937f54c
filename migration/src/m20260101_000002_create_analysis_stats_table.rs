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
                    .table(AnalysisStats::Table)
                    .if_not_exists()
                    .col(integer(AnalysisStats::AnalysisId).primary_key())
                    .col(big_integer(AnalysisStats::TotalJobCount).default(0))
                    .col(big_integer(AnalysisStats::UnclaimedJobCount).default(0))
                    .col(big_integer(AnalysisStats::DoneJobCount).default(0))
                    .col(big_integer(AnalysisStats::FailedJobCount).default(0))
                    .col(integer(AnalysisStats::NumRequiredWorkers).default(0))
                    .col(string_len(AnalysisStats::Status, 16).default("LOADING"))
                    .foreign_key(
                        ForeignKey::create()
                            .from(AnalysisStats::Table, AnalysisStats::AnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AnalysisStats {
    Table,
    AnalysisId,
    TotalJobCount,
    UnclaimedJobCount,
    DoneJobCount,
    FailedJobCount,
    NumRequiredWorkers,
    Status,
}

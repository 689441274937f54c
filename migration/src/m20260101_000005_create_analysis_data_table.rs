use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisData::Table)
                    .if_not_exists()
                    .col(pk_auto(AnalysisData::AnalysisDataId))
                    .col(string_uniq(AnalysisData::ContentHash))
                    .col(text(AnalysisData::Data))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AnalysisData {
    Table,
    AnalysisDataId,
    ContentHash,
    Data,
}

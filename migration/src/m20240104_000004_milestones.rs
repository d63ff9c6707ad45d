use sea_orm_migration::prelude::*;

use crate::m20240103_000003_deals::Deals;

#[derive(DeriveIden)]
enum Milestones {
    Table,
    Id,
    OrgId,
    DealId,
    Title,
    Position,
    DueDate,
    CompletedAt,
    Notes,
    Source,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Milestones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Milestones::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Milestones::OrgId).uuid().not_null())
                    .col(ColumnDef::new(Milestones::DealId).uuid().not_null())
                    .col(ColumnDef::new(Milestones::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Milestones::Position).integer().not_null())
                    .col(ColumnDef::new(Milestones::DueDate).date())
                    .col(ColumnDef::new(Milestones::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Milestones::Notes).text())
                    .col(
                        ColumnDef::new(Milestones::Source)
                            .string_len(16)
                            .not_null()
                            .default("manual"),
                    )
                    .col(
                        ColumnDef::new(Milestones::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestones_deal")
                            .from(Milestones::Table, Milestones::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_milestones_deal_position")
                    .table(Milestones::Table)
                    .col(Milestones::DealId)
                    .col(Milestones::Position)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Milestones::Table).to_owned())
            .await
    }
}

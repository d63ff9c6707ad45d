use sea_orm_migration::prelude::*;

use crate::m20240101_000001_orgs::Orgs;

#[derive(DeriveIden)]
pub enum Contacts {
    Table,
    Id,
    OrgId,
    FirstName,
    LastName,
    Email,
    Phone,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Properties {
    Table,
    Id,
    OrgId,
    AddressLine,
    City,
    Region,
    PostalCode,
    ListPriceCents,
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
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Contacts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Contacts::OrgId).uuid().not_null())
                    .col(ColumnDef::new(Contacts::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Contacts::LastName).string_len(128))
                    .col(ColumnDef::new(Contacts::Email).string_len(320))
                    .col(ColumnDef::new(Contacts::Phone).string_len(64))
                    .col(
                        ColumnDef::new(Contacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Contacts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contacts_org")
                            .from(Contacts::Table, Contacts::OrgId)
                            .to(Orgs::Table, Orgs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contacts_org")
                    .table(Contacts::Table)
                    .col(Contacts::OrgId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Properties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Properties::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Properties::OrgId).uuid().not_null())
                    .col(
                        ColumnDef::new(Properties::AddressLine)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Properties::City).string_len(128))
                    .col(ColumnDef::new(Properties::Region).string_len(128))
                    .col(ColumnDef::new(Properties::PostalCode).string_len(32))
                    .col(ColumnDef::new(Properties::ListPriceCents).big_integer())
                    .col(
                        ColumnDef::new(Properties::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Properties::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_properties_org")
                            .from(Properties::Table, Properties::OrgId)
                            .to(Orgs::Table, Orgs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_properties_org")
                    .table(Properties::Table)
                    .col(Properties::OrgId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Properties::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await
    }
}

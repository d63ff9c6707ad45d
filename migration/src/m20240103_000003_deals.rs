use sea_orm_migration::prelude::*;

use crate::m20240101_000001_orgs::Orgs;
use crate::m20240102_000002_contacts_properties::{Contacts, Properties};

#[derive(DeriveIden)]
pub enum Deals {
    Table,
    Id,
    OrgId,
    Title,
    DealType,
    Stage,
    BuyerContactId,
    CoBuyerContactId,
    SellerContactId,
    CoSellerContactId,
    PropertyId,
    AssignedAgentId,
    EstimatedValueCents,
    EarnestMoneyCents,
    OptionFeeCents,
    CommissionRateBps,
    FinalSalePriceCents,
    ExpectedCloseDate,
    FinancingDeadline,
    OptionPeriodEnd,
    InspectionDate,
    AppraisalDate,
    MilestonesGeneratedAt,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DealStageHistory {
    Table,
    Id,
    OrgId,
    DealId,
    FromStage,
    ToStage,
    ChangedAt,
    ChangedBy,
    Note,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn contact_fk(name: &str, column: Deals) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(Deals::Table, column)
        .to(Contacts::Table, Contacts::Id)
        .on_delete(ForeignKeyAction::SetNull)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deals::OrgId).uuid().not_null())
                    .col(ColumnDef::new(Deals::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Deals::DealType).string_len(16).not_null())
                    .col(ColumnDef::new(Deals::Stage).string_len(32).not_null())
                    .col(ColumnDef::new(Deals::BuyerContactId).uuid())
                    .col(ColumnDef::new(Deals::CoBuyerContactId).uuid())
                    .col(ColumnDef::new(Deals::SellerContactId).uuid())
                    .col(ColumnDef::new(Deals::CoSellerContactId).uuid())
                    .col(ColumnDef::new(Deals::PropertyId).uuid())
                    .col(ColumnDef::new(Deals::AssignedAgentId).uuid())
                    .col(ColumnDef::new(Deals::EstimatedValueCents).big_integer())
                    .col(ColumnDef::new(Deals::EarnestMoneyCents).big_integer())
                    .col(ColumnDef::new(Deals::OptionFeeCents).big_integer())
                    .col(ColumnDef::new(Deals::CommissionRateBps).integer())
                    .col(ColumnDef::new(Deals::FinalSalePriceCents).big_integer())
                    .col(ColumnDef::new(Deals::ExpectedCloseDate).date())
                    .col(ColumnDef::new(Deals::FinancingDeadline).date())
                    .col(ColumnDef::new(Deals::OptionPeriodEnd).date())
                    .col(ColumnDef::new(Deals::InspectionDate).date())
                    .col(ColumnDef::new(Deals::AppraisalDate).date())
                    .col(ColumnDef::new(Deals::MilestonesGeneratedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Deals::CreatedBy).uuid())
                    .col(ColumnDef::new(Deals::UpdatedBy).uuid())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_org")
                            .from(Deals::Table, Deals::OrgId)
                            .to(Orgs::Table, Orgs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_property")
                            .from(Deals::Table, Deals::PropertyId)
                            .to(Properties::Table, Properties::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(&mut contact_fk("fk_deals_buyer", Deals::BuyerContactId))
                    .foreign_key(&mut contact_fk("fk_deals_co_buyer", Deals::CoBuyerContactId))
                    .foreign_key(&mut contact_fk("fk_deals_seller", Deals::SellerContactId))
                    .foreign_key(&mut contact_fk("fk_deals_co_seller", Deals::CoSellerContactId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deals_org_type_stage")
                    .table(Deals::Table)
                    .col(Deals::OrgId)
                    .col(Deals::DealType)
                    .col(Deals::Stage)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DealStageHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealStageHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DealStageHistory::OrgId).uuid().not_null())
                    .col(ColumnDef::new(DealStageHistory::DealId).uuid().not_null())
                    .col(
                        ColumnDef::new(DealStageHistory::FromStage)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealStageHistory::ToStage)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealStageHistory::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DealStageHistory::ChangedBy).uuid())
                    .col(ColumnDef::new(DealStageHistory::Note).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_history_deal")
                            .from(DealStageHistory::Table, DealStageHistory::DealId)
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
                    .name("idx_stage_history_deal_changed")
                    .table(DealStageHistory::Table)
                    .col(DealStageHistory::DealId)
                    .col(DealStageHistory::ChangedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DealStageHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}

use sea_orm::prelude::{Date, DateTimeWithTimeZone, *};
use uuid::Uuid;

/// A buyer-side or seller-side deal on the pipeline board.
///
/// `stage` holds a stage key from the sequence selected by `deal_type`; the
/// pairing is validated by the pipeline crate when rows are loaded.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub org_id: Uuid,
    pub title: String,
    pub deal_type: DealType,
    pub stage: String,
    pub buyer_contact_id: Option<Uuid>,
    pub co_buyer_contact_id: Option<Uuid>,
    pub seller_contact_id: Option<Uuid>,
    pub co_seller_contact_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub assigned_agent_id: Option<Uuid>,
    pub estimated_value_cents: Option<i64>,
    pub earnest_money_cents: Option<i64>,
    pub option_fee_cents: Option<i64>,
    pub commission_rate_bps: Option<i32>,
    pub final_sale_price_cents: Option<i64>,
    pub expected_close_date: Option<Date>,
    pub financing_deadline: Option<Date>,
    pub option_period_end: Option<Date>,
    pub inspection_date: Option<Date>,
    pub appraisal_date: Option<Date>,
    pub milestones_generated_at: Option<DateTimeWithTimeZone>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orgs::Entity",
        from = "Column::OrgId",
        to = "super::orgs::Column::Id",
        on_delete = "Cascade"
    )]
    Org,
    #[sea_orm(
        belongs_to = "super::properties::Entity",
        from = "Column::PropertyId",
        to = "super::properties::Column::Id",
        on_delete = "SetNull"
    )]
    Property,
    #[sea_orm(has_many = "super::milestones::Entity")]
    Milestones,
    #[sea_orm(has_many = "super::deal_stage_history::Entity")]
    StageHistory,
}

impl Related<super::orgs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Org.def()
    }
}

impl Related<super::properties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::milestones::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Milestones.def()
    }
}

impl Related<super::deal_stage_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageHistory.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum DealType {
    #[sea_orm(string_value = "buyer")]
    Buyer,
    #[sea_orm(string_value = "seller")]
    Seller,
}

impl ActiveModelBehavior for ActiveModel {}

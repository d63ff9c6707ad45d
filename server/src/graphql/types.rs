use async_graphql::{Enum, ID, InputObject, MaybeUndefined, SimpleObject};
use chrono::{DateTime, NaiveDate, Utc};
use platform_api::{ApiError, ApiResult};
use products_pipeline::{
    Deal, DealPatch, DealType, Milestone, NewDeal, PipelineBoard, PipelineColumn, Stage,
    StageHistoryEntry, StageTransitionEngine, TransitionOutcome,
};
use uuid::Uuid;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "DealType")]
pub enum DealTypeValue {
    #[graphql(name = "BUYER")]
    Buyer,
    #[graphql(name = "SELLER")]
    Seller,
}

impl From<DealTypeValue> for DealType {
    fn from(value: DealTypeValue) -> Self {
        match value {
            DealTypeValue::Buyer => DealType::Buyer,
            DealTypeValue::Seller => DealType::Seller,
        }
    }
}

impl From<DealType> for DealTypeValue {
    fn from(value: DealType) -> Self {
        match value {
            DealType::Buyer => DealTypeValue::Buyer,
            DealType::Seller => DealTypeValue::Seller,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageNode {
    pub key: String,
    pub label: String,
    pub position: i32,
    pub terminal: bool,
    pub closed: bool,
}

impl From<Stage> for StageNode {
    fn from(stage: Stage) -> Self {
        Self {
            key: stage.key().to_string(),
            label: stage.label().to_string(),
            position: stage.position() as i32,
            terminal: stage.is_terminal(),
            closed: stage.is_closed(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DealNode {
    pub id: ID,
    pub title: String,
    #[graphql(name = "dealType")]
    pub deal_type: DealTypeValue,
    pub stage: StageNode,
    /// Stage keys a move is currently accepted for.
    #[graphql(name = "allowedStageKeys")]
    pub allowed_stage_keys: Vec<String>,
    #[graphql(name = "buyerContactId")]
    pub buyer_contact_id: Option<ID>,
    #[graphql(name = "coBuyerContactId")]
    pub co_buyer_contact_id: Option<ID>,
    #[graphql(name = "sellerContactId")]
    pub seller_contact_id: Option<ID>,
    #[graphql(name = "coSellerContactId")]
    pub co_seller_contact_id: Option<ID>,
    #[graphql(name = "propertyId")]
    pub property_id: Option<ID>,
    #[graphql(name = "assignedAgentId")]
    pub assigned_agent_id: Option<ID>,
    #[graphql(name = "estimatedValueCents")]
    pub estimated_value_cents: Option<i64>,
    #[graphql(name = "earnestMoneyCents")]
    pub earnest_money_cents: Option<i64>,
    #[graphql(name = "optionFeeCents")]
    pub option_fee_cents: Option<i64>,
    #[graphql(name = "commissionRateBps")]
    pub commission_rate_bps: Option<i32>,
    #[graphql(name = "finalSalePriceCents")]
    pub final_sale_price_cents: Option<i64>,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: Option<NaiveDate>,
    #[graphql(name = "financingDeadline")]
    pub financing_deadline: Option<NaiveDate>,
    #[graphql(name = "optionPeriodEnd")]
    pub option_period_end: Option<NaiveDate>,
    #[graphql(name = "inspectionDate")]
    pub inspection_date: Option<NaiveDate>,
    #[graphql(name = "appraisalDate")]
    pub appraisal_date: Option<NaiveDate>,
    #[graphql(name = "milestonesGeneratedAt")]
    pub milestones_generated_at: Option<DateTime<Utc>>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

fn id_of(value: Option<Uuid>) -> Option<ID> {
    value.map(ID::from)
}

impl From<Deal> for DealNode {
    fn from(deal: Deal) -> Self {
        let allowed_stage_keys = StageTransitionEngine::new()
            .allowed_targets(&deal)
            .into_iter()
            .map(|stage| stage.key().to_string())
            .collect();
        Self {
            id: ID::from(deal.id),
            title: deal.title,
            deal_type: deal.stage.deal_type().into(),
            stage: deal.stage.into(),
            allowed_stage_keys,
            buyer_contact_id: id_of(deal.parties.buyer_contact_id),
            co_buyer_contact_id: id_of(deal.parties.co_buyer_contact_id),
            seller_contact_id: id_of(deal.parties.seller_contact_id),
            co_seller_contact_id: id_of(deal.parties.co_seller_contact_id),
            property_id: id_of(deal.property_id),
            assigned_agent_id: id_of(deal.assigned_agent_id),
            estimated_value_cents: deal.financials.estimated_value_cents,
            earnest_money_cents: deal.financials.earnest_money_cents,
            option_fee_cents: deal.financials.option_fee_cents,
            commission_rate_bps: deal.financials.commission_rate_bps,
            final_sale_price_cents: deal.financials.final_sale_price_cents,
            expected_close_date: deal.dates.expected_close_date,
            financing_deadline: deal.dates.financing_deadline,
            option_period_end: deal.dates.option_period_end,
            inspection_date: deal.dates.inspection_date,
            appraisal_date: deal.dates.appraisal_date,
            milestones_generated_at: deal.milestones_generated_at,
            created_at: deal.created_at,
            updated_at: deal.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MilestoneNode {
    pub id: ID,
    #[graphql(name = "dealId")]
    pub deal_id: ID,
    pub title: String,
    pub position: i32,
    #[graphql(name = "dueDate")]
    pub due_date: Option<NaiveDate>,
    #[graphql(name = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: String,
}

impl From<Milestone> for MilestoneNode {
    fn from(m: Milestone) -> Self {
        Self {
            id: ID::from(m.id),
            deal_id: ID::from(m.deal_id),
            title: m.title,
            position: m.position,
            due_date: m.due_date,
            completed_at: m.completed_at,
            notes: m.notes,
            source: m.source.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PipelineColumnNode {
    pub stage: StageNode,
    pub count: i32,
    #[graphql(name = "valueCents")]
    pub value_cents: i64,
    pub deals: Vec<DealNode>,
}

impl From<PipelineColumn> for PipelineColumnNode {
    fn from(column: PipelineColumn) -> Self {
        Self {
            stage: column.stage.into(),
            count: column.count() as i32,
            value_cents: column.value_cents,
            deals: column.deals.into_iter().map(DealNode::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PipelineBoardNode {
    #[graphql(name = "dealType")]
    pub deal_type: DealTypeValue,
    pub columns: Vec<PipelineColumnNode>,
    #[graphql(name = "totalCount")]
    pub total_count: i32,
    #[graphql(name = "pipelineValueCents")]
    pub pipeline_value_cents: i64,
}

impl From<PipelineBoard> for PipelineBoardNode {
    fn from(board: PipelineBoard) -> Self {
        Self {
            deal_type: board.deal_type.into(),
            total_count: board.deal_count() as i32,
            pipeline_value_cents: board.pipeline_value_cents,
            columns: board
                .columns
                .into_iter()
                .map(PipelineColumnNode::from)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageHistoryNode {
    pub id: ID,
    #[graphql(name = "fromStage")]
    pub from_stage: StageNode,
    #[graphql(name = "toStage")]
    pub to_stage: StageNode,
    #[graphql(name = "changedAt")]
    pub changed_at: DateTime<Utc>,
    #[graphql(name = "changedBy")]
    pub changed_by: Option<ID>,
    pub note: Option<String>,
}

impl From<StageHistoryEntry> for StageHistoryNode {
    fn from(entry: StageHistoryEntry) -> Self {
        Self {
            id: ID::from(entry.id),
            from_stage: entry.from.into(),
            to_stage: entry.to.into(),
            changed_at: entry.changed_at,
            changed_by: id_of(entry.changed_by),
            note: entry.note,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MoveDealStagePayload {
    pub deal: DealNode,
    /// False when the deal was already in the requested stage.
    pub changed: bool,
    /// Milestones created by this move.
    pub milestones: Vec<MilestoneNode>,
}

impl From<TransitionOutcome> for MoveDealStagePayload {
    fn from(outcome: TransitionOutcome) -> Self {
        match outcome {
            TransitionOutcome::Unchanged(deal) => Self {
                deal: deal.into(),
                changed: false,
                milestones: Vec::new(),
            },
            TransitionOutcome::Moved {
                deal, milestones, ..
            } => Self {
                deal: deal.into(),
                changed: true,
                milestones: milestones.into_iter().map(MilestoneNode::from).collect(),
            },
        }
    }
}

pub fn parse_uuid(id: &ID) -> ApiResult<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| ApiError::InvalidInput("invalid id".into()))
}

fn parse_optional(id: Option<&ID>) -> ApiResult<Option<Uuid>> {
    id.map(parse_uuid).transpose()
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateDealInput {
    pub title: String,
    #[graphql(name = "dealType")]
    pub deal_type: DealTypeValue,
    /// Defaults to the first stage of the sequence.
    pub stage: Option<String>,
    #[graphql(name = "buyerContactId")]
    pub buyer_contact_id: Option<ID>,
    #[graphql(name = "coBuyerContactId")]
    pub co_buyer_contact_id: Option<ID>,
    #[graphql(name = "sellerContactId")]
    pub seller_contact_id: Option<ID>,
    #[graphql(name = "coSellerContactId")]
    pub co_seller_contact_id: Option<ID>,
    #[graphql(name = "propertyId")]
    pub property_id: Option<ID>,
    #[graphql(name = "assignedAgentId")]
    pub assigned_agent_id: Option<ID>,
    #[graphql(name = "estimatedValueCents")]
    pub estimated_value_cents: Option<i64>,
    #[graphql(name = "earnestMoneyCents")]
    pub earnest_money_cents: Option<i64>,
    #[graphql(name = "optionFeeCents")]
    pub option_fee_cents: Option<i64>,
    #[graphql(name = "commissionRateBps")]
    pub commission_rate_bps: Option<i32>,
    #[graphql(name = "finalSalePriceCents")]
    pub final_sale_price_cents: Option<i64>,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: Option<NaiveDate>,
    #[graphql(name = "financingDeadline")]
    pub financing_deadline: Option<NaiveDate>,
    #[graphql(name = "optionPeriodEnd")]
    pub option_period_end: Option<NaiveDate>,
    #[graphql(name = "inspectionDate")]
    pub inspection_date: Option<NaiveDate>,
    #[graphql(name = "appraisalDate")]
    pub appraisal_date: Option<NaiveDate>,
}

impl CreateDealInput {
    /// `stage` is resolved by the caller against the deal type.
    pub fn into_new_deal(self, stage: Stage) -> ApiResult<NewDeal> {
        let mut deal = NewDeal::new(self.title, stage);
        deal.parties.buyer_contact_id = parse_optional(self.buyer_contact_id.as_ref())?;
        deal.parties.co_buyer_contact_id = parse_optional(self.co_buyer_contact_id.as_ref())?;
        deal.parties.seller_contact_id = parse_optional(self.seller_contact_id.as_ref())?;
        deal.parties.co_seller_contact_id = parse_optional(self.co_seller_contact_id.as_ref())?;
        deal.property_id = parse_optional(self.property_id.as_ref())?;
        deal.assigned_agent_id = parse_optional(self.assigned_agent_id.as_ref())?;
        deal.financials.estimated_value_cents = self.estimated_value_cents;
        deal.financials.earnest_money_cents = self.earnest_money_cents;
        deal.financials.option_fee_cents = self.option_fee_cents;
        deal.financials.commission_rate_bps = self.commission_rate_bps;
        deal.financials.final_sale_price_cents = self.final_sale_price_cents;
        deal.dates.expected_close_date = self.expected_close_date;
        deal.dates.financing_deadline = self.financing_deadline;
        deal.dates.option_period_end = self.option_period_end;
        deal.dates.inspection_date = self.inspection_date;
        deal.dates.appraisal_date = self.appraisal_date;
        Ok(deal)
    }
}

/// Omitted fields are left alone; an explicit `null` clears the field.
#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateDealInput {
    pub title: Option<String>,
    #[graphql(name = "buyerContactId")]
    pub buyer_contact_id: MaybeUndefined<ID>,
    #[graphql(name = "coBuyerContactId")]
    pub co_buyer_contact_id: MaybeUndefined<ID>,
    #[graphql(name = "sellerContactId")]
    pub seller_contact_id: MaybeUndefined<ID>,
    #[graphql(name = "coSellerContactId")]
    pub co_seller_contact_id: MaybeUndefined<ID>,
    #[graphql(name = "propertyId")]
    pub property_id: MaybeUndefined<ID>,
    #[graphql(name = "assignedAgentId")]
    pub assigned_agent_id: MaybeUndefined<ID>,
    #[graphql(name = "estimatedValueCents")]
    pub estimated_value_cents: MaybeUndefined<i64>,
    #[graphql(name = "earnestMoneyCents")]
    pub earnest_money_cents: MaybeUndefined<i64>,
    #[graphql(name = "optionFeeCents")]
    pub option_fee_cents: MaybeUndefined<i64>,
    #[graphql(name = "commissionRateBps")]
    pub commission_rate_bps: MaybeUndefined<i32>,
    #[graphql(name = "finalSalePriceCents")]
    pub final_sale_price_cents: MaybeUndefined<i64>,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: MaybeUndefined<NaiveDate>,
    #[graphql(name = "financingDeadline")]
    pub financing_deadline: MaybeUndefined<NaiveDate>,
    #[graphql(name = "optionPeriodEnd")]
    pub option_period_end: MaybeUndefined<NaiveDate>,
    #[graphql(name = "inspectionDate")]
    pub inspection_date: MaybeUndefined<NaiveDate>,
    #[graphql(name = "appraisalDate")]
    pub appraisal_date: MaybeUndefined<NaiveDate>,
}

fn edit<T>(value: MaybeUndefined<T>) -> Option<Option<T>> {
    match value {
        MaybeUndefined::Undefined => None,
        MaybeUndefined::Null => Some(None),
        MaybeUndefined::Value(value) => Some(Some(value)),
    }
}

fn edit_id(value: MaybeUndefined<ID>) -> ApiResult<Option<Option<Uuid>>> {
    edit(value)
        .map(|inner| inner.as_ref().map(parse_uuid).transpose())
        .transpose()
}

impl UpdateDealInput {
    pub fn into_patch(self) -> ApiResult<DealPatch> {
        Ok(DealPatch {
            title: self.title,
            buyer_contact_id: edit_id(self.buyer_contact_id)?,
            co_buyer_contact_id: edit_id(self.co_buyer_contact_id)?,
            seller_contact_id: edit_id(self.seller_contact_id)?,
            co_seller_contact_id: edit_id(self.co_seller_contact_id)?,
            property_id: edit_id(self.property_id)?,
            assigned_agent_id: edit_id(self.assigned_agent_id)?,
            estimated_value_cents: edit(self.estimated_value_cents),
            earnest_money_cents: edit(self.earnest_money_cents),
            option_fee_cents: edit(self.option_fee_cents),
            commission_rate_bps: edit(self.commission_rate_bps),
            final_sale_price_cents: edit(self.final_sale_price_cents),
            expected_close_date: edit(self.expected_close_date),
            financing_deadline: edit(self.financing_deadline),
            option_period_end: edit(self.option_period_end),
            inspection_date: edit(self.inspection_date),
            appraisal_date: edit(self.appraisal_date),
        })
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateMilestoneInput {
    #[graphql(name = "dealId")]
    pub deal_id: ID,
    pub title: String,
    #[graphql(name = "dueDate")]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

//! sea-orm backed [`PipelineStore`]. Every query is filtered by `org_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::{contacts, deal_stage_history, deals, milestones, properties};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::deal::{Deal, DealPatch, Financials, KeyDates, NewDeal, Parties, TenantId};
use crate::milestone::{Milestone, NewMilestone};
use crate::stage::{DealType, Stage};
use crate::store::{CommittedTransition, DealFilter, PipelineStore, StageHistoryEntry, StoreError};
use crate::transition::StageChanged;

#[derive(Debug, Clone)]
pub struct SeaPipelineStore {
    db: DatabaseConnection,
}

impl SeaPipelineStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

async fn load_deal<C: ConnectionTrait>(
    conn: &C,
    tenant: TenantId,
    deal_id: Uuid,
) -> Result<deals::Model, StoreError> {
    deals::Entity::find_by_id(deal_id)
        .filter(deals::Column::OrgId.eq(tenant.0))
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "deal",
            id: deal_id,
        })
}

async fn insert_milestone_row<C: ConnectionTrait>(
    conn: &C,
    tenant: TenantId,
    row: &NewMilestone,
    now: DateTimeWithTimeZone,
) -> Result<Milestone, StoreError> {
    let active = milestones::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(tenant.0),
        deal_id: Set(row.deal_id),
        title: Set(row.title.clone()),
        position: Set(row.position),
        due_date: Set(row.due_date),
        completed_at: Set(None),
        notes: Set(row.notes.clone()),
        source: Set(row.source.into()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(milestone_from_model(active.insert(conn).await?))
}

async fn insert_milestone_rows<C: ConnectionTrait>(
    conn: &C,
    tenant: TenantId,
    rows: &[NewMilestone],
) -> Result<Vec<Milestone>, StoreError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut created = Vec::with_capacity(rows.len());
    for row in rows {
        created.push(insert_milestone_row(conn, tenant, row, now).await?);
    }
    Ok(created)
}

fn deal_from_model(model: deals::Model) -> Result<Deal, StoreError> {
    let deal_type = DealType::from(model.deal_type);
    let stage = Stage::parse(deal_type, &model.stage).ok_or_else(|| StoreError::Corrupt {
        entity: "deal",
        id: model.id,
        reason: format!("stage `{}` is not a {deal_type} stage", model.stage),
    })?;
    Ok(Deal {
        id: model.id,
        tenant: TenantId(model.org_id),
        title: model.title,
        stage,
        parties: Parties {
            buyer_contact_id: model.buyer_contact_id,
            co_buyer_contact_id: model.co_buyer_contact_id,
            seller_contact_id: model.seller_contact_id,
            co_seller_contact_id: model.co_seller_contact_id,
        },
        property_id: model.property_id,
        assigned_agent_id: model.assigned_agent_id,
        financials: Financials {
            estimated_value_cents: model.estimated_value_cents,
            earnest_money_cents: model.earnest_money_cents,
            option_fee_cents: model.option_fee_cents,
            commission_rate_bps: model.commission_rate_bps,
            final_sale_price_cents: model.final_sale_price_cents,
        },
        dates: KeyDates {
            expected_close_date: model.expected_close_date,
            financing_deadline: model.financing_deadline,
            option_period_end: model.option_period_end,
            inspection_date: model.inspection_date,
            appraisal_date: model.appraisal_date,
        },
        milestones_generated_at: model.milestones_generated_at.map(|at| at.with_timezone(&Utc)),
        created_by: model.created_by,
        updated_by: model.updated_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn milestone_from_model(model: milestones::Model) -> Milestone {
    Milestone {
        id: model.id,
        tenant: TenantId(model.org_id),
        deal_id: model.deal_id,
        title: model.title,
        position: model.position,
        due_date: model.due_date,
        completed_at: model.completed_at.map(|at| at.with_timezone(&Utc)),
        notes: model.notes,
        source: model.source.into(),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn history_from_model(
    deal_type: DealType,
    model: deal_stage_history::Model,
) -> Result<StageHistoryEntry, StoreError> {
    let parse = |key: &str| {
        Stage::parse(deal_type, key).ok_or_else(|| StoreError::Corrupt {
            entity: "deal_stage_history",
            id: model.id,
            reason: format!("stage `{key}` is not a {deal_type} stage"),
        })
    };
    Ok(StageHistoryEntry {
        id: model.id,
        deal_id: model.deal_id,
        from: parse(&model.from_stage)?,
        to: parse(&model.to_stage)?,
        changed_at: model.changed_at.with_timezone(&Utc),
        changed_by: model.changed_by,
        note: model.note,
    })
}

fn apply_patch(active: &mut deals::ActiveModel, patch: &DealPatch) {
    if let Some(title) = &patch.title {
        active.title = Set(title.clone());
    }
    if let Some(value) = patch.buyer_contact_id {
        active.buyer_contact_id = Set(value);
    }
    if let Some(value) = patch.co_buyer_contact_id {
        active.co_buyer_contact_id = Set(value);
    }
    if let Some(value) = patch.seller_contact_id {
        active.seller_contact_id = Set(value);
    }
    if let Some(value) = patch.co_seller_contact_id {
        active.co_seller_contact_id = Set(value);
    }
    if let Some(value) = patch.property_id {
        active.property_id = Set(value);
    }
    if let Some(value) = patch.assigned_agent_id {
        active.assigned_agent_id = Set(value);
    }
    if let Some(value) = patch.estimated_value_cents {
        active.estimated_value_cents = Set(value);
    }
    if let Some(value) = patch.earnest_money_cents {
        active.earnest_money_cents = Set(value);
    }
    if let Some(value) = patch.option_fee_cents {
        active.option_fee_cents = Set(value);
    }
    if let Some(value) = patch.commission_rate_bps {
        active.commission_rate_bps = Set(value);
    }
    if let Some(value) = patch.final_sale_price_cents {
        active.final_sale_price_cents = Set(value);
    }
    if let Some(value) = patch.expected_close_date {
        active.expected_close_date = Set(value);
    }
    if let Some(value) = patch.financing_deadline {
        active.financing_deadline = Set(value);
    }
    if let Some(value) = patch.option_period_end {
        active.option_period_end = Set(value);
    }
    if let Some(value) = patch.inspection_date {
        active.inspection_date = Set(value);
    }
    if let Some(value) = patch.appraisal_date {
        active.appraisal_date = Set(value);
    }
}

#[async_trait]
impl PipelineStore for SeaPipelineStore {
    async fn find_deal(&self, tenant: TenantId, deal_id: Uuid) -> Result<Option<Deal>, StoreError> {
        deals::Entity::find_by_id(deal_id)
            .filter(deals::Column::OrgId.eq(tenant.0))
            .one(&self.db)
            .await?
            .map(deal_from_model)
            .transpose()
    }

    async fn list_deals(
        &self,
        tenant: TenantId,
        filter: &DealFilter,
    ) -> Result<Vec<Deal>, StoreError> {
        let mut query = deals::Entity::find().filter(deals::Column::OrgId.eq(tenant.0));
        if let Some(deal_type) = filter.deal_type {
            query = query.filter(deals::Column::DealType.eq(deals::DealType::from(deal_type)));
        }
        if let Some(agent) = filter.assigned_agent_id {
            query = query.filter(deals::Column::AssignedAgentId.eq(agent));
        }
        if let Some(q) = filter.title_query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(deals::Column::Title)))
                    .like(format!("%{}%", q.to_lowercase())),
            );
        }
        query
            .order_by_desc(deals::Column::UpdatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(deal_from_model)
            .collect()
    }

    async fn insert_deal(
        &self,
        tenant: TenantId,
        deal: NewDeal,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let active = deals::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(tenant.0),
            title: Set(deal.title),
            deal_type: Set(deal.stage.deal_type().into()),
            stage: Set(deal.stage.key().to_string()),
            buyer_contact_id: Set(deal.parties.buyer_contact_id),
            co_buyer_contact_id: Set(deal.parties.co_buyer_contact_id),
            seller_contact_id: Set(deal.parties.seller_contact_id),
            co_seller_contact_id: Set(deal.parties.co_seller_contact_id),
            property_id: Set(deal.property_id),
            assigned_agent_id: Set(deal.assigned_agent_id),
            estimated_value_cents: Set(deal.financials.estimated_value_cents),
            earnest_money_cents: Set(deal.financials.earnest_money_cents),
            option_fee_cents: Set(deal.financials.option_fee_cents),
            commission_rate_bps: Set(deal.financials.commission_rate_bps),
            final_sale_price_cents: Set(deal.financials.final_sale_price_cents),
            expected_close_date: Set(deal.dates.expected_close_date),
            financing_deadline: Set(deal.dates.financing_deadline),
            option_period_end: Set(deal.dates.option_period_end),
            inspection_date: Set(deal.dates.inspection_date),
            appraisal_date: Set(deal.dates.appraisal_date),
            milestones_generated_at: Set(None),
            created_by: Set(actor),
            updated_by: Set(actor),
            created_at: Set(now),
            updated_at: Set(now),
        };
        deal_from_model(active.insert(&self.db).await?)
    }

    async fn update_deal(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        patch: &DealPatch,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError> {
        let existing = load_deal(&self.db, tenant, deal_id).await?;
        let mut active: deals::ActiveModel = existing.into();
        apply_patch(&mut active, patch);
        active.updated_by = Set(actor);
        active.updated_at = Set(Utc::now().into());
        deal_from_model(active.update(&self.db).await?)
    }

    async fn commit_transition(
        &self,
        tenant: TenantId,
        change: &StageChanged,
        actor: Option<Uuid>,
        note: Option<String>,
        milestones: &[NewMilestone],
    ) -> Result<CommittedTransition, StoreError> {
        let txn = self.db.begin().await?;
        let existing = load_deal(&txn, tenant, change.deal_id).await?;
        let stored = deal_from_model(existing.clone())?.stage;
        if stored != change.previous {
            return Err(StoreError::StageMoved {
                deal_id: change.deal_id,
                expected: change.previous,
                stored,
            });
        }
        let at: DateTimeWithTimeZone = change.changed_at.into();
        let generation_skipped =
            !milestones.is_empty() && existing.milestones_generated_at.is_some();
        let write_milestones = !milestones.is_empty() && !generation_skipped;

        let mut active: deals::ActiveModel = existing.into();
        active.stage = Set(change.next.key().to_string());
        active.updated_at = Set(at);
        active.updated_by = Set(actor);
        if write_milestones {
            active.milestones_generated_at = Set(Some(at));
        }
        let updated = active.update(&txn).await?;

        let history = deal_stage_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(tenant.0),
            deal_id: Set(change.deal_id),
            from_stage: Set(change.previous.key().to_string()),
            to_stage: Set(change.next.key().to_string()),
            changed_at: Set(at),
            changed_by: Set(actor),
            note: Set(note),
        };
        deal_stage_history::Entity::insert(history)
            .exec_without_returning(&txn)
            .await?;

        let created = if write_milestones {
            insert_milestone_rows(&txn, tenant, milestones).await?
        } else {
            Vec::new()
        };
        txn.commit().await?;

        Ok(CommittedTransition {
            deal: deal_from_model(updated)?,
            milestones: created,
            generation_skipped,
        })
    }

    async fn insert_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        milestones: &[NewMilestone],
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<Milestone>, StoreError> {
        let txn = self.db.begin().await?;
        let existing = load_deal(&txn, tenant, deal_id).await?;
        if existing.milestones_generated_at.is_some() {
            return Err(StoreError::AlreadyGenerated(deal_id));
        }
        let mut active: deals::ActiveModel = existing.into();
        active.milestones_generated_at = Set(Some(generated_at.into()));
        active.update(&txn).await?;
        let created = insert_milestone_rows(&txn, tenant, milestones).await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn append_milestone(
        &self,
        tenant: TenantId,
        mut milestone: NewMilestone,
    ) -> Result<Milestone, StoreError> {
        let deal_id = milestone.deal_id;
        let txn = self.db.begin().await?;
        // A no-op write takes the deal's row lock before the last position is read.
        let locked = deals::Entity::update_many()
            .col_expr(deals::Column::OrgId, Expr::col(deals::Column::OrgId).into())
            .filter(deals::Column::Id.eq(deal_id))
            .filter(deals::Column::OrgId.eq(tenant.0))
            .exec(&txn)
            .await?;
        if locked.rows_affected == 0 {
            return Err(StoreError::NotFound {
                entity: "deal",
                id: deal_id,
            });
        }
        let last = milestones::Entity::find()
            .filter(milestones::Column::OrgId.eq(tenant.0))
            .filter(milestones::Column::DealId.eq(deal_id))
            .order_by_desc(milestones::Column::Position)
            .one(&txn)
            .await?;
        milestone.position = last.map_or(0, |row| row.position + 1);
        let created = insert_milestone_row(&txn, tenant, &milestone, Utc::now().into()).await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn list_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, StoreError> {
        let rows = milestones::Entity::find()
            .filter(milestones::Column::OrgId.eq(tenant.0))
            .filter(milestones::Column::DealId.eq(deal_id))
            .order_by_asc(milestones::Column::Position)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(milestone_from_model).collect())
    }

    async fn find_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Option<Milestone>, StoreError> {
        let row = milestones::Entity::find_by_id(milestone_id)
            .filter(milestones::Column::OrgId.eq(tenant.0))
            .one(&self.db)
            .await?;
        Ok(row.map(milestone_from_model))
    }

    async fn set_milestone_completion(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Milestone, StoreError> {
        let existing = milestones::Entity::find_by_id(milestone_id)
            .filter(milestones::Column::OrgId.eq(tenant.0))
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "milestone",
                id: milestone_id,
            })?;
        let mut active: milestones::ActiveModel = existing.into();
        active.completed_at = Set(completed_at.map(Into::into));
        active.updated_at = Set(Utc::now().into());
        Ok(milestone_from_model(active.update(&self.db).await?))
    }

    async fn stage_history(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StageHistoryEntry>, StoreError> {
        let deal = load_deal(&self.db, tenant, deal_id).await?;
        let deal_type = DealType::from(deal.deal_type);
        deal_stage_history::Entity::find()
            .filter(deal_stage_history::Column::OrgId.eq(tenant.0))
            .filter(deal_stage_history::Column::DealId.eq(deal_id))
            .order_by_desc(deal_stage_history::Column::ChangedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| history_from_model(deal_type, row))
            .collect()
    }

    async fn last_entry_into(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        stage: Stage,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = deal_stage_history::Entity::find()
            .filter(deal_stage_history::Column::OrgId.eq(tenant.0))
            .filter(deal_stage_history::Column::DealId.eq(deal_id))
            .filter(deal_stage_history::Column::ToStage.eq(stage.key()))
            .order_by_desc(deal_stage_history::Column::ChangedAt)
            .one(&self.db)
            .await?;
        Ok(row.map(|entry| entry.changed_at.with_timezone(&Utc)))
    }

    async fn contact_exists(&self, tenant: TenantId, contact_id: Uuid) -> Result<bool, StoreError> {
        let row = contacts::Entity::find_by_id(contact_id)
            .filter(contacts::Column::OrgId.eq(tenant.0))
            .one(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn property_exists(
        &self,
        tenant: TenantId,
        property_id: Uuid,
    ) -> Result<bool, StoreError> {
        let row = properties::Entity::find_by_id(property_id)
            .filter(properties::Column::OrgId.eq(tenant.0))
            .one(&self.db)
            .await?;
        Ok(row.is_some())
    }
}

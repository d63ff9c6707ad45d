//! The persistence seam. The pipeline only ever talks to storage through
//! [`PipelineStore`], and every call is scoped to a [`TenantId`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::deal::{Deal, DealPatch, NewDeal, TenantId};
use crate::milestone::{Milestone, NewMilestone};
use crate::stage::{DealType, Stage};
use crate::transition::StageChanged;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("milestones already generated for deal {0}")]
    AlreadyGenerated(Uuid),
    #[error("corrupt {entity} record {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: Uuid,
        reason: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The stored stage no longer matches the one the transition was planned from.
    #[error("deal {deal_id} is {stored}, not {expected}")]
    StageMoved {
        deal_id: Uuid,
        expected: Stage,
        stored: Stage,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealFilter {
    pub deal_type: Option<DealType>,
    pub assigned_agent_id: Option<Uuid>,
    /// Case-insensitive substring of the title.
    pub title_query: Option<String>,
}

impl DealFilter {
    pub fn of_type(deal_type: DealType) -> Self {
        Self {
            deal_type: Some(deal_type),
            ..Self::default()
        }
    }

    pub fn matches(&self, deal: &Deal) -> bool {
        if self.deal_type.is_some_and(|t| t != deal.deal_type()) {
            return false;
        }
        if self
            .assigned_agent_id
            .is_some_and(|agent| deal.assigned_agent_id != Some(agent))
        {
            return false;
        }
        match self.title_query.as_deref() {
            Some(q) => deal.title.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHistoryEntry {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub from: Stage,
    pub to: Stage,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<Uuid>,
    pub note: Option<String>,
}

/// Result of writing a transition.
#[derive(Debug, Clone)]
pub struct CommittedTransition {
    pub deal: Deal,
    pub milestones: Vec<Milestone>,
    /// The deal already had its checklist when the write ran, so the planned
    /// milestones were dropped instead of duplicated.
    pub generation_skipped: bool,
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn find_deal(&self, tenant: TenantId, deal_id: Uuid) -> Result<Option<Deal>, StoreError>;

    /// Most recently updated first.
    async fn list_deals(&self, tenant: TenantId, filter: &DealFilter)
    -> Result<Vec<Deal>, StoreError>;

    async fn insert_deal(
        &self,
        tenant: TenantId,
        deal: NewDeal,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError>;

    async fn update_deal(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        patch: &DealPatch,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError>;

    /// Writes the stage change, its history row and, when `milestones` is not
    /// empty, the checklist plus the generation flag. One transaction.
    async fn commit_transition(
        &self,
        tenant: TenantId,
        change: &StageChanged,
        actor: Option<Uuid>,
        note: Option<String>,
        milestones: &[NewMilestone],
    ) -> Result<CommittedTransition, StoreError>;

    /// Writes a generated checklist. The deal's generation flag is checked
    /// and set to `generated_at` in the same transaction.
    async fn insert_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        milestones: &[NewMilestone],
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<Milestone>, StoreError>;

    /// Inserts one milestone after the deal's last position; the incoming
    /// `position` is replaced. Concurrent appends to a deal are serialized.
    async fn append_milestone(
        &self,
        tenant: TenantId,
        milestone: NewMilestone,
    ) -> Result<Milestone, StoreError>;

    async fn list_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, StoreError>;

    async fn find_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Option<Milestone>, StoreError>;

    async fn set_milestone_completion(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Milestone, StoreError>;

    async fn stage_history(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StageHistoryEntry>, StoreError>;

    /// When the deal most recently moved into `stage`, if ever.
    async fn last_entry_into(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        stage: Stage,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn contact_exists(&self, tenant: TenantId, contact_id: Uuid) -> Result<bool, StoreError>;

    async fn property_exists(&self, tenant: TenantId, property_id: Uuid)
    -> Result<bool, StoreError>;
}

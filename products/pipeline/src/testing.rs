//! In-memory store and notifier used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::deal::{Deal, DealPatch, Financials, KeyDates, NewDeal, Parties, TenantId};
use crate::milestone::{Milestone, NewMilestone};
use crate::notify::{Notification, Notifier};
use crate::stage::Stage;
use crate::store::{CommittedTransition, DealFilter, PipelineStore, StageHistoryEntry, StoreError};
use crate::transition::StageChanged;

pub fn deal_in(stage: Stage) -> Deal {
    let now = Utc::now();
    Deal {
        id: Uuid::new_v4(),
        tenant: TenantId(Uuid::nil()),
        title: format!("{} deal", stage.label()),
        stage,
        parties: Parties::default(),
        property_id: None,
        assigned_agent_id: None,
        financials: Financials::default(),
        dates: KeyDates::default(),
        milestones_generated_at: None,
        created_by: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct State {
    deals: HashMap<Uuid, Deal>,
    milestones: Vec<Milestone>,
    history: Vec<StageHistoryEntry>,
    contacts: HashSet<(TenantId, Uuid)>,
    properties: HashSet<(TenantId, Uuid)>,
    fail_writes: bool,
    keep_only: Option<usize>,
    commit_calls: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn seed_deal(&self, tenant: TenantId, stage: Stage) -> Deal {
        let mut deal = deal_in(stage);
        deal.tenant = tenant;
        self.put(deal.clone());
        deal
    }

    pub fn put(&self, deal: Deal) {
        self.state.lock().unwrap().deals.insert(deal.id, deal);
    }

    pub fn add_contact(&self, tenant: TenantId) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().contacts.insert((tenant, id));
        id
    }

    /// Every write after this call fails with `Unavailable`.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// Milestone batches keep only the first `count` rows.
    pub fn keep_only(&self, count: usize) {
        self.state.lock().unwrap().keep_only = Some(count);
    }

    pub fn commit_calls(&self) -> usize {
        self.state.lock().unwrap().commit_calls
    }

    pub fn stored_stage(&self, deal_id: Uuid) -> Option<Stage> {
        self.state.lock().unwrap().deals.get(&deal_id).map(|d| d.stage)
    }

    pub fn milestone_count(&self, deal_id: Uuid) -> usize {
        let state = self.state.lock().unwrap();
        state.milestones.iter().filter(|m| m.deal_id == deal_id).count()
    }
}

impl State {
    fn deal(&self, tenant: TenantId, id: Uuid) -> Result<&Deal, StoreError> {
        self.deals
            .get(&id)
            .filter(|deal| deal.tenant == tenant)
            .ok_or(StoreError::NotFound { entity: "deal", id })
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn insert_batch(&mut self, tenant: TenantId, rows: &[NewMilestone]) -> Vec<Milestone> {
        let now = Utc::now();
        let keep = self.keep_only.unwrap_or(rows.len());
        let created: Vec<Milestone> = rows
            .iter()
            .take(keep)
            .map(|row| Milestone {
                id: Uuid::new_v4(),
                tenant,
                deal_id: row.deal_id,
                title: row.title.clone(),
                position: row.position,
                due_date: row.due_date,
                completed_at: None,
                notes: row.notes.clone(),
                source: row.source,
                created_at: now,
                updated_at: now,
            })
            .collect();
        self.milestones.extend(created.iter().cloned());
        created
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn find_deal(&self, tenant: TenantId, deal_id: Uuid) -> Result<Option<Deal>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.deal(tenant, deal_id).ok().cloned())
    }

    async fn list_deals(
        &self,
        tenant: TenantId,
        filter: &DealFilter,
    ) -> Result<Vec<Deal>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut deals: Vec<Deal> = state
            .deals
            .values()
            .filter(|deal| deal.tenant == tenant && filter.matches(deal))
            .cloned()
            .collect();
        deals.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(deals)
    }

    async fn insert_deal(
        &self,
        tenant: TenantId,
        deal: NewDeal,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let now = Utc::now();
        let stored = Deal {
            id: Uuid::new_v4(),
            tenant,
            title: deal.title,
            stage: deal.stage,
            parties: deal.parties,
            property_id: deal.property_id,
            assigned_agent_id: deal.assigned_agent_id,
            financials: deal.financials,
            dates: deal.dates,
            milestones_generated_at: None,
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        };
        state.deals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_deal(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        patch: &DealPatch,
        actor: Option<Uuid>,
    ) -> Result<Deal, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let mut deal = state.deal(tenant, deal_id)?.clone();
        patch.apply_to(&mut deal);
        deal.updated_by = actor;
        deal.updated_at = Utc::now();
        state.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn commit_transition(
        &self,
        tenant: TenantId,
        change: &StageChanged,
        actor: Option<Uuid>,
        note: Option<String>,
        milestones: &[NewMilestone],
    ) -> Result<CommittedTransition, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.commit_calls += 1;
        state.check_writable()?;
        let mut deal = state.deal(tenant, change.deal_id)?.clone();
        if deal.stage != change.previous {
            return Err(StoreError::StageMoved {
                deal_id: deal.id,
                expected: change.previous,
                stored: deal.stage,
            });
        }
        let generation_skipped = !milestones.is_empty() && deal.milestones_generated_at.is_some();
        deal.stage = change.next;
        deal.updated_by = actor;
        deal.updated_at = change.changed_at;
        let created = if milestones.is_empty() || generation_skipped {
            Vec::new()
        } else {
            deal.milestones_generated_at = Some(change.changed_at);
            state.insert_batch(tenant, milestones)
        };
        state.history.push(StageHistoryEntry {
            id: Uuid::new_v4(),
            deal_id: deal.id,
            from: change.previous,
            to: change.next,
            changed_at: change.changed_at,
            changed_by: actor,
            note,
        });
        state.deals.insert(deal.id, deal.clone());
        Ok(CommittedTransition {
            deal,
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
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let mut deal = state.deal(tenant, deal_id)?.clone();
        if deal.milestones_generated_at.is_some() {
            return Err(StoreError::AlreadyGenerated(deal_id));
        }
        deal.milestones_generated_at = Some(generated_at);
        state.deals.insert(deal_id, deal);
        Ok(state.insert_batch(tenant, milestones))
    }

    async fn append_milestone(
        &self,
        tenant: TenantId,
        mut milestone: NewMilestone,
    ) -> Result<Milestone, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        state.deal(tenant, milestone.deal_id)?;
        milestone.position = state
            .milestones
            .iter()
            .filter(|m| m.deal_id == milestone.deal_id)
            .map(|m| m.position)
            .max()
            .map_or(0, |last| last + 1);
        state
            .insert_batch(tenant, std::slice::from_ref(&milestone))
            .pop()
            .ok_or_else(|| StoreError::Unavailable("milestone dropped".into()))
    }

    async fn list_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<Milestone> = state
            .milestones
            .iter()
            .filter(|m| m.tenant == tenant && m.deal_id == deal_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.position);
        Ok(rows)
    }

    async fn find_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Option<Milestone>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .milestones
            .iter()
            .find(|m| m.tenant == tenant && m.id == milestone_id)
            .cloned())
    }

    async fn set_milestone_completion(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Milestone, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let row = state
            .milestones
            .iter_mut()
            .find(|m| m.tenant == tenant && m.id == milestone_id)
            .ok_or(StoreError::NotFound {
                entity: "milestone",
                id: milestone_id,
            })?;
        row.completed_at = completed_at;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn stage_history(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StageHistoryEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        state.deal(tenant, deal_id)?;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|entry| entry.deal_id == deal_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn last_entry_into(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        stage: Stage,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.state.lock().unwrap();
        state.deal(tenant, deal_id)?;
        Ok(state
            .history
            .iter()
            .rev()
            .find(|entry| entry.deal_id == deal_id && entry.to == stage)
            .map(|entry| entry.changed_at))
    }

    async fn contact_exists(&self, tenant: TenantId, contact_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .contacts
            .contains(&(tenant, contact_id)))
    }

    async fn property_exists(
        &self,
        tenant: TenantId,
        property_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .properties
            .contains(&(tenant, property_id)))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

//! Pipeline operations, composed from the engine, the milestone generator and
//! the store. Every method is scoped to one tenant.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::board::PipelineBoard;
use crate::deal::{Deal, DealPatch, Financials, NewDeal, TenantId};
use crate::error::PipelineError;
use crate::milestone::{Milestone, MilestoneGenerator, MilestoneSource, NewMilestone};
use crate::notify::{Notification, Notifier};
use crate::stage::{DealType, Stage};
use crate::store::{DealFilter, PipelineStore, StageHistoryEntry};
use crate::transition::{StageChanged, StageTransitionEngine, resolve_stage};

const MAX_TITLE_LEN: usize = 256;
const MAX_NOTE_LEN: usize = 2000;
const MAX_COMMISSION_BPS: i32 = 10_000;
pub const MAX_HISTORY_PAGE: u64 = 200;

#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The deal was already in the requested stage.
    Unchanged(Deal),
    Moved {
        deal: Deal,
        event: StageChanged,
        milestones: Vec<Milestone>,
    },
}

impl TransitionOutcome {
    pub fn deal(&self) -> &Deal {
        match self {
            TransitionOutcome::Unchanged(deal) | TransitionOutcome::Moved { deal, .. } => deal,
        }
    }

    pub fn into_deal(self) -> Deal {
        match self {
            TransitionOutcome::Unchanged(deal) | TransitionOutcome::Moved { deal, .. } => deal,
        }
    }

    pub fn milestones(&self) -> &[Milestone] {
        match self {
            TransitionOutcome::Unchanged(_) => &[],
            TransitionOutcome::Moved { milestones, .. } => milestones,
        }
    }
}

#[derive(Clone)]
pub struct PipelineService {
    store: Arc<dyn PipelineStore>,
    notifier: Arc<dyn Notifier>,
    engine: StageTransitionEngine,
    generator: MilestoneGenerator,
}

impl PipelineService {
    pub fn new(store: Arc<dyn PipelineStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            engine: StageTransitionEngine::new(),
            generator: MilestoneGenerator::default(),
        }
    }

    pub fn engine(&self) -> &StageTransitionEngine {
        &self.engine
    }

    pub async fn get_deal(&self, tenant: TenantId, deal_id: Uuid) -> Result<Deal, PipelineError> {
        self.store
            .find_deal(tenant, deal_id)
            .await?
            .ok_or(PipelineError::DealNotFound(deal_id))
    }

    pub async fn list_deals(
        &self,
        tenant: TenantId,
        filter: &DealFilter,
    ) -> Result<Vec<Deal>, PipelineError> {
        Ok(self.store.list_deals(tenant, filter).await?)
    }

    /// Reloads the tenant's deals on every call.
    #[instrument(name = "pipeline.board", skip(self), fields(tenant = %tenant))]
    pub async fn board(
        &self,
        tenant: TenantId,
        deal_type: DealType,
    ) -> Result<PipelineBoard, PipelineError> {
        let deals = self
            .store
            .list_deals(tenant, &DealFilter::of_type(deal_type))
            .await?;
        Ok(PipelineBoard::compose(deal_type, deals))
    }

    #[instrument(
        name = "pipeline.create_deal",
        skip_all,
        fields(tenant = %tenant, stage = %deal.stage)
    )]
    pub async fn create_deal(
        &self,
        tenant: TenantId,
        mut deal: NewDeal,
        actor: Option<Uuid>,
    ) -> Result<Deal, PipelineError> {
        deal.title = validate_title(&deal.title)?;
        validate_financials(&deal.financials)?;
        let contacts: Vec<Uuid> = deal.parties.contact_ids().collect();
        self.ensure_references(tenant, &contacts, deal.property_id)
            .await?;
        let created = self.store.insert_deal(tenant, deal, actor).await?;
        tracing::info!(deal_id = %created.id, "deal created");
        Ok(created)
    }

    /// Edits fields other than the stage. An empty patch returns the deal as is.
    #[instrument(name = "pipeline.update_deal", skip(self, patch), fields(tenant = %tenant))]
    pub async fn update_deal(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        mut patch: DealPatch,
        actor: Option<Uuid>,
    ) -> Result<Deal, PipelineError> {
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(validate_title(title)?);
        }
        for (field, cents) in patch.money_fields() {
            validate_money(field, cents)?;
        }
        if let Some(Some(bps)) = patch.commission_rate_bps {
            validate_commission(bps)?;
        }
        let contacts: Vec<Uuid> = patch.contact_ids().collect();
        self.ensure_references(tenant, &contacts, patch.property_id.flatten())
            .await?;
        if patch.is_empty() {
            return self.get_deal(tenant, deal_id).await;
        }
        Ok(self.store.update_deal(tenant, deal_id, &patch, actor).await?)
    }

    /// Loads the deal and moves it to the stage named by `stage_key`.
    #[instrument(name = "pipeline.move_stage", skip(self, note), fields(tenant = %tenant))]
    pub async fn move_stage(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        stage_key: &str,
        actor: Option<Uuid>,
        note: Option<String>,
    ) -> Result<TransitionOutcome, PipelineError> {
        let result = async {
            let deal = self.get_deal(tenant, deal_id).await?;
            let target = resolve_stage(deal.deal_type(), stage_key)?;
            self.apply_transition(tenant, &deal, target, actor, note)
                .await
        }
        .await;
        self.report_transition(tenant, deal_id, &result).await;
        result
    }

    #[instrument(
        name = "pipeline.transition",
        skip_all,
        fields(tenant = %tenant, deal_id = %deal.id, target = %target)
    )]
    pub async fn transition(
        &self,
        tenant: TenantId,
        deal: &Deal,
        target: Stage,
        actor: Option<Uuid>,
        note: Option<String>,
    ) -> Result<TransitionOutcome, PipelineError> {
        let result = self
            .apply_transition(tenant, deal, target, actor, note)
            .await;
        self.report_transition(tenant, deal.id, &result).await;
        result
    }

    async fn apply_transition(
        &self,
        tenant: TenantId,
        deal: &Deal,
        target: Stage,
        actor: Option<Uuid>,
        note: Option<String>,
    ) -> Result<TransitionOutcome, PipelineError> {
        if deal.tenant != tenant {
            return Err(PipelineError::DealNotFound(deal.id));
        }
        let note = normalize_note(note)?;
        let Some(event) = self.engine.plan(deal, target, Utc::now())? else {
            return Ok(TransitionOutcome::Unchanged(deal.clone()));
        };
        let planned = self.generator.react(deal, &event);
        let committed = self
            .store
            .commit_transition(tenant, &event, actor, note, &planned)
            .await?;
        if !committed.generation_skipped && committed.milestones.len() != planned.len() {
            return Err(PipelineError::PartialMilestoneInsert {
                expected: planned.len(),
                inserted: committed.milestones.len(),
            });
        }
        tracing::info!(
            from = %event.previous,
            to = %event.next,
            milestones = committed.milestones.len(),
            "deal stage changed"
        );
        Ok(TransitionOutcome::Moved {
            deal: committed.deal,
            event,
            milestones: committed.milestones,
        })
    }

    async fn report_transition(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        result: &Result<TransitionOutcome, PipelineError>,
    ) {
        let notification = match result {
            Ok(TransitionOutcome::Unchanged(_)) => return,
            Ok(TransitionOutcome::Moved {
                event, milestones, ..
            }) if milestones.is_empty() => {
                Notification::success(tenant, deal_id, format!("Moved to {}", event.next.label()))
            }
            Ok(TransitionOutcome::Moved {
                event, milestones, ..
            }) => Notification::success(
                tenant,
                deal_id,
                format!(
                    "Moved to {}; {} milestones added",
                    event.next.label(),
                    milestones.len()
                ),
            ),
            Err(err) => Notification::failure(tenant, deal_id, err.code(), err.to_string()),
        };
        self.notifier.notify(notification).await;
    }

    /// Writes the under-contract checklist for a deal that never got one.
    #[instrument(name = "pipeline.generate_milestones", skip(self), fields(tenant = %tenant))]
    pub async fn generate_milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, PipelineError> {
        let result = self.apply_generation(tenant, deal_id).await;
        let notification = match &result {
            Ok(rows) => Notification::success(
                tenant,
                deal_id,
                format!("{} milestones added", rows.len()),
            ),
            Err(err) => Notification::failure(tenant, deal_id, err.code(), err.to_string()),
        };
        self.notifier.notify(notification).await;
        result
    }

    async fn apply_generation(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, PipelineError> {
        let deal = self.get_deal(tenant, deal_id).await?;
        if deal.milestones_generated_at.is_some() {
            return Err(PipelineError::MilestonesAlreadyGenerated(deal_id));
        }
        if !deal.stage.is_under_contract() {
            return Err(PipelineError::StageNotEligible { stage: deal.stage });
        }
        let now = Utc::now();
        let contract_date = self
            .store
            .last_entry_into(tenant, deal_id, deal.stage)
            .await?
            .unwrap_or(now)
            .date_naive();
        let planned = self.generator.checklist(&deal, contract_date);
        let stored = self
            .store
            .insert_milestones(tenant, deal_id, &planned, now)
            .await?;
        if stored.len() != planned.len() {
            return Err(PipelineError::PartialMilestoneInsert {
                expected: planned.len(),
                inserted: stored.len(),
            });
        }
        Ok(stored)
    }

    pub async fn milestones(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
    ) -> Result<Vec<Milestone>, PipelineError> {
        self.get_deal(tenant, deal_id).await?;
        Ok(self.store.list_milestones(tenant, deal_id).await?)
    }

    /// Appends a manual milestone after the deal's last one.
    #[instrument(
        name = "pipeline.add_milestone",
        skip(self, title, notes),
        fields(tenant = %tenant)
    )]
    pub async fn add_milestone(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        title: &str,
        due_date: Option<chrono::NaiveDate>,
        notes: Option<String>,
    ) -> Result<Milestone, PipelineError> {
        let title = validate_title(title)?;
        let notes = normalize_note(notes)?;
        let row = NewMilestone {
            deal_id,
            title,
            position: 0,
            due_date,
            notes,
            source: MilestoneSource::Manual,
        };
        Ok(self.store.append_milestone(tenant, row).await?)
    }

    /// Marks the milestone done. Completing a done milestone keeps its timestamp.
    pub async fn complete_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Milestone, PipelineError> {
        let current = self.find_milestone(tenant, milestone_id).await?;
        if current.is_complete() {
            return Ok(current);
        }
        Ok(self
            .store
            .set_milestone_completion(tenant, milestone_id, Some(Utc::now()))
            .await?)
    }

    pub async fn reopen_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Milestone, PipelineError> {
        let current = self.find_milestone(tenant, milestone_id).await?;
        if !current.is_complete() {
            return Ok(current);
        }
        Ok(self
            .store
            .set_milestone_completion(tenant, milestone_id, None)
            .await?)
    }

    /// Newest first. `limit` is clamped to `1..=MAX_HISTORY_PAGE`.
    pub async fn stage_history(
        &self,
        tenant: TenantId,
        deal_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StageHistoryEntry>, PipelineError> {
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        Ok(self
            .store
            .stage_history(tenant, deal_id, limit, offset)
            .await?)
    }

    async fn find_milestone(
        &self,
        tenant: TenantId,
        milestone_id: Uuid,
    ) -> Result<Milestone, PipelineError> {
        self.store
            .find_milestone(tenant, milestone_id)
            .await?
            .ok_or(PipelineError::MilestoneNotFound(milestone_id))
    }

    async fn ensure_references(
        &self,
        tenant: TenantId,
        contacts: &[Uuid],
        property_id: Option<Uuid>,
    ) -> Result<(), PipelineError> {
        for contact_id in contacts {
            if !self.store.contact_exists(tenant, *contact_id).await? {
                return Err(PipelineError::validation(format!(
                    "contact {contact_id} does not exist"
                )));
            }
        }
        if let Some(property_id) = property_id {
            if !self.store.property_exists(tenant, property_id).await? {
                return Err(PipelineError::validation(format!(
                    "property {property_id} does not exist"
                )));
            }
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String, PipelineError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::validation("title is required"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(PipelineError::validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_note(note: Option<String>) -> Result<Option<String>, PipelineError> {
    let Some(note) = note else {
        return Ok(None);
    };
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_LEN {
        return Err(PipelineError::validation(format!(
            "note must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn validate_money(field: &str, cents: i64) -> Result<(), PipelineError> {
    if cents < 0 {
        return Err(PipelineError::validation(format!(
            "{field} cannot be negative"
        )));
    }
    Ok(())
}

fn validate_commission(bps: i32) -> Result<(), PipelineError> {
    if !(0..=MAX_COMMISSION_BPS).contains(&bps) {
        return Err(PipelineError::validation(
            "commissionRateBps must be between 0 and 10000",
        ));
    }
    Ok(())
}

fn validate_financials(money: &Financials) -> Result<(), PipelineError> {
    let fields = [
        ("estimatedValueCents", money.estimated_value_cents),
        ("earnestMoneyCents", money.earnest_money_cents),
        ("optionFeeCents", money.option_fee_cents),
        ("finalSalePriceCents", money.final_sale_price_cents),
    ];
    for (field, cents) in fields {
        if let Some(cents) = cents {
            validate_money(field, cents)?;
        }
    }
    if let Some(bps) = money.commission_rate_bps {
        validate_commission(bps)?;
    }
    Ok(())
}

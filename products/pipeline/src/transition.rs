//! Stage transition rules.
//!
//! The engine is pure: it looks at a deal and a requested stage and either
//! refuses, does nothing, or hands back the [`StageChanged`] event to persist.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::deal::Deal;
use crate::error::PipelineError;
use crate::stage::{DealType, Stage};

/// Emitted for every applied transition. The milestone generator reacts to
/// this and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageChanged {
    pub deal_id: Uuid,
    pub previous: Stage,
    pub next: Stage,
    pub changed_at: DateTime<Utc>,
}

impl StageChanged {
    pub fn enters_under_contract(&self) -> bool {
        self.next.is_under_contract() && !self.previous.is_under_contract()
    }
}

/// Parses a wire stage key against the sequence of `deal_type`.
pub fn resolve_stage(deal_type: DealType, key: &str) -> Result<Stage, PipelineError> {
    Stage::parse(deal_type, key).ok_or_else(|| PipelineError::InvalidStageForType {
        deal_type,
        stage: key.trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageTransitionEngine;

impl StageTransitionEngine {
    pub fn new() -> Self {
        Self
    }

    /// `Ok(None)` when `target` is already the deal's stage.
    pub fn plan(
        &self,
        deal: &Deal,
        target: Stage,
        at: DateTime<Utc>,
    ) -> Result<Option<StageChanged>, PipelineError> {
        let current = deal.stage;
        if target.deal_type() != deal.deal_type() {
            return Err(PipelineError::InvalidStageForType {
                deal_type: deal.deal_type(),
                stage: target.key().to_string(),
            });
        }
        if target == current {
            return Ok(None);
        }
        if current.is_terminal() {
            return Err(PipelineError::TerminalStage { stage: current });
        }
        if current.is_closed() && target.is_terminal() {
            return Err(PipelineError::TransitionNotAllowed {
                from: current,
                to: target,
            });
        }
        Ok(Some(StageChanged {
            deal_id: deal.id,
            previous: current,
            next: target,
            changed_at: at,
        }))
    }

    pub fn plan_key(
        &self,
        deal: &Deal,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<StageChanged>, PipelineError> {
        let target = resolve_stage(deal.deal_type(), key)?;
        self.plan(deal, target, at)
    }

    /// Stages the deal may move to right now, in board order.
    pub fn allowed_targets(&self, deal: &Deal) -> Vec<Stage> {
        let at = Utc::now();
        deal.deal_type()
            .stages()
            .into_iter()
            .filter(|stage| matches!(self.plan(deal, *stage, at), Ok(Some(_))))
            .collect()
    }
}

use thiserror::Error;
use uuid::Uuid;

use crate::stage::{DealType, Stage};
use crate::store::StoreError;

/// Everything a pipeline operation can refuse or fail with.
///
/// Each variant is terminal for the request that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("deal {0} not found")]
    DealNotFound(Uuid),
    #[error("milestone {0} not found")]
    MilestoneNotFound(Uuid),
    #[error("stage `{stage}` is not a {deal_type} stage")]
    InvalidStageForType { deal_type: DealType, stage: String },
    #[error("deal is {stage}; it can no longer change stage")]
    TerminalStage { stage: Stage },
    #[error("cannot move a deal from {from} to {to}")]
    TransitionNotAllowed { from: Stage, to: Stage },
    #[error("milestones were already generated for deal {0}")]
    MilestonesAlreadyGenerated(Uuid),
    #[error("deal is {stage}; the checklist is only generated under contract")]
    StageNotEligible { stage: Stage },
    #[error("{0}")]
    Validation(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] StoreError),
    #[error("only {inserted} of {expected} milestones were stored")]
    PartialMilestoneInsert { expected: usize, inserted: usize },
    #[error("deal moved to {stored} after it was read as {expected}; reload and retry")]
    StaleStage { expected: Stage, stored: Stage },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::DealNotFound(_) | PipelineError::MilestoneNotFound(_) => "NOT_FOUND",
            PipelineError::InvalidStageForType { .. } => "INVALID_STAGE_FOR_TYPE",
            PipelineError::TerminalStage { .. } => "TERMINAL_STAGE",
            PipelineError::TransitionNotAllowed { .. } => "TRANSITION_NOT_ALLOWED",
            PipelineError::MilestonesAlreadyGenerated(_) => "MILESTONES_ALREADY_GENERATED",
            PipelineError::StageNotEligible { .. } => "STAGE_NOT_ELIGIBLE",
            PipelineError::Validation(_) => "VALIDATION",
            PipelineError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            PipelineError::PartialMilestoneInsert { .. } => "PARTIAL_MILESTONE_INSERT",
            PipelineError::StaleStage { .. } => "STALE_STAGE",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }
}

impl From<StoreError> for PipelineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity: "deal", id } => PipelineError::DealNotFound(id),
            StoreError::NotFound {
                entity: "milestone",
                id,
            } => PipelineError::MilestoneNotFound(id),
            StoreError::AlreadyGenerated(id) => PipelineError::MilestonesAlreadyGenerated(id),
            StoreError::StageMoved {
                expected, stored, ..
            } => PipelineError::StaleStage { expected, stored },
            other => PipelineError::PersistenceFailure(other),
        }
    }
}

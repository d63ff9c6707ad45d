//! Real-estate deal pipeline: typed buyer/seller stage sequences, the
//! transition rules between them, and the milestone checklist created when a
//! deal first goes under contract.

pub mod board;
pub mod deal;
pub mod error;
pub mod milestone;
pub mod notify;
pub mod sea_store;
pub mod service;
pub mod stage;
pub mod store;
pub mod transition;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{PipelineBoard, PipelineColumn, pipeline_value};
pub use deal::{Deal, DealPatch, Financials, KeyDates, NewDeal, Parties, TenantId};
pub use error::PipelineError;
pub use milestone::{
    DueRule, KeyDate, Milestone, MilestoneGenerator, MilestoneSource, MilestoneTemplate,
    NewMilestone, UNDER_CONTRACT_CHECKLIST,
};
pub use notify::{Notification, Notifier, Outcome, TracingNotifier};
pub use sea_store::SeaPipelineStore;
pub use service::{MAX_HISTORY_PAGE, PipelineService, TransitionOutcome};
pub use stage::{BuyerStage, DealType, SellerStage, Stage};
pub use store::{CommittedTransition, DealFilter, PipelineStore, StageHistoryEntry, StoreError};
pub use transition::{StageChanged, StageTransitionEngine, resolve_stage};

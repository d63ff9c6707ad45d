//! sea-orm entities for the deal pipeline.

pub mod contacts;
pub mod deal_stage_history;
pub mod deals;
pub mod milestones;
pub mod orgs;
pub mod properties;

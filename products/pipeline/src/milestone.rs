//! The under-contract checklist and the records it produces.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use entity::milestones;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deal::{Deal, KeyDates, TenantId};
use crate::transition::StageChanged;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneSource {
    Generated,
    Manual,
}

impl MilestoneSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MilestoneSource::Generated => "generated",
            MilestoneSource::Manual => "manual",
        }
    }
}

impl From<milestones::Source> for MilestoneSource {
    fn from(value: milestones::Source) -> Self {
        match value {
            milestones::Source::Generated => MilestoneSource::Generated,
            milestones::Source::Manual => MilestoneSource::Manual,
        }
    }
}

impl From<MilestoneSource> for milestones::Source {
    fn from(value: MilestoneSource) -> Self {
        match value {
            MilestoneSource::Generated => milestones::Source::Generated,
            MilestoneSource::Manual => milestones::Source::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: Uuid,
    pub tenant: TenantId,
    pub deal_id: Uuid,
    pub title: String,
    pub position: i32,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: MilestoneSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilestone {
    pub deal_id: Uuid,
    pub title: String,
    pub position: i32,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub source: MilestoneSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDate {
    OptionPeriodEnd,
    InspectionDate,
    AppraisalDate,
    FinancingDeadline,
    ExpectedCloseDate,
}

impl KeyDate {
    pub fn read(self, dates: &KeyDates) -> Option<NaiveDate> {
        match self {
            KeyDate::OptionPeriodEnd => dates.option_period_end,
            KeyDate::InspectionDate => dates.inspection_date,
            KeyDate::AppraisalDate => dates.appraisal_date,
            KeyDate::FinancingDeadline => dates.financing_deadline,
            KeyDate::ExpectedCloseDate => dates.expected_close_date,
        }
    }
}

/// How a checklist item's due date is derived. A missing anchor yields no date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueRule {
    /// Days after the date the deal went under contract.
    AfterContract(i64),
    OnField(KeyDate),
    /// Days before the expected close date.
    BeforeClose(i64),
}

impl DueRule {
    pub fn due_date(self, dates: &KeyDates, contract_date: NaiveDate) -> Option<NaiveDate> {
        match self {
            DueRule::AfterContract(days) => contract_date.checked_add_signed(Duration::days(days)),
            DueRule::OnField(field) => field.read(dates),
            DueRule::BeforeClose(days) => dates
                .expected_close_date
                .and_then(|close| close.checked_sub_signed(Duration::days(days))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneTemplate {
    pub title: &'static str,
    pub rule: DueRule,
}

pub const UNDER_CONTRACT_CHECKLIST: [MilestoneTemplate; 7] = [
    MilestoneTemplate {
        title: "Earnest money due",
        rule: DueRule::AfterContract(3),
    },
    MilestoneTemplate {
        title: "Option period ends",
        rule: DueRule::OnField(KeyDate::OptionPeriodEnd),
    },
    MilestoneTemplate {
        title: "Inspection period ends",
        rule: DueRule::OnField(KeyDate::InspectionDate),
    },
    MilestoneTemplate {
        title: "Appraisal ordered",
        rule: DueRule::OnField(KeyDate::AppraisalDate),
    },
    MilestoneTemplate {
        title: "Financing deadline",
        rule: DueRule::OnField(KeyDate::FinancingDeadline),
    },
    MilestoneTemplate {
        title: "Final walkthrough",
        rule: DueRule::BeforeClose(1),
    },
    MilestoneTemplate {
        title: "Closing",
        rule: DueRule::OnField(KeyDate::ExpectedCloseDate),
    },
];

/// Turns the first entry into `under_contract` into a checklist.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneGenerator {
    template: &'static [MilestoneTemplate],
}

impl Default for MilestoneGenerator {
    fn default() -> Self {
        Self {
            template: &UNDER_CONTRACT_CHECKLIST,
        }
    }
}

impl MilestoneGenerator {
    pub fn is_triggered_by(&self, deal: &Deal, change: &StageChanged) -> bool {
        change.deal_id == deal.id
            && change.enters_under_contract()
            && deal.milestones_generated_at.is_none()
    }

    /// Milestones to write alongside `change`; empty unless it triggers.
    pub fn react(&self, deal: &Deal, change: &StageChanged) -> Vec<NewMilestone> {
        if !self.is_triggered_by(deal, change) {
            return Vec::new();
        }
        self.checklist(deal, change.changed_at.date_naive())
    }

    pub fn checklist(&self, deal: &Deal, contract_date: NaiveDate) -> Vec<NewMilestone> {
        self.template
            .iter()
            .zip(0..)
            .map(|(item, position)| NewMilestone {
                deal_id: deal.id,
                title: item.title.to_string(),
                position,
                due_date: item.rule.due_date(&deal.dates, contract_date),
                notes: None,
                source: MilestoneSource::Generated,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::stage::{BuyerStage, SellerStage, Stage};
    use crate::testing::deal_in;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn under_contract(deal: &Deal, at: DateTime<Utc>) -> StageChanged {
        StageChanged {
            deal_id: deal.id,
            previous: deal.stage,
            next: Stage::under_contract(deal.deal_type()),
            changed_at: at,
        }
    }

    #[test]
    fn checklist_anchors_to_key_dates() {
        let mut deal = deal_in(Stage::Buyer(BuyerStage::Negotiating));
        deal.dates.expected_close_date = Some(date(2025, 6, 30));
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 23, 30, 0).unwrap();

        let batch = MilestoneGenerator::default().react(&deal, &under_contract(&deal, at));
        assert_eq!(batch.len(), 7);
        assert!(batch.iter().all(|m| m.deal_id == deal.id));
        assert!(batch.iter().all(|m| m.source == MilestoneSource::Generated));

        let due = |title: &str| {
            batch
                .iter()
                .find(|m| m.title == title)
                .map(|m| m.due_date)
                .unwrap()
        };
        assert_eq!(due("Earnest money due"), Some(date(2025, 5, 4)));
        assert_eq!(due("Final walkthrough"), Some(date(2025, 6, 29)));
        assert_eq!(due("Closing"), Some(date(2025, 6, 30)));
        assert_eq!(due("Option period ends"), None);
        assert_eq!(
            batch.iter().map(|m| m.position).collect::<Vec<_>>(),
            (0..7).collect::<Vec<_>>()
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let mut deal = deal_in(Stage::Seller(SellerStage::Negotiating));
        deal.dates.inspection_date = Some(date(2025, 3, 10));
        deal.dates.financing_deadline = Some(date(2025, 3, 20));
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let generator = MilestoneGenerator::default();
        let first = generator.react(&deal, &under_contract(&deal, at));
        let second = generator.react(&deal, &under_contract(&deal, at));
        assert_eq!(first, second);
    }

    #[test]
    fn already_generated_deal_is_not_triggered() {
        let mut deal = deal_in(Stage::Buyer(BuyerStage::Inspection));
        deal.milestones_generated_at = Some(Utc::now());
        let change = under_contract(&deal, Utc::now());
        assert!(MilestoneGenerator::default().react(&deal, &change).is_empty());
    }

    #[test]
    fn other_targets_do_not_trigger() {
        let deal = deal_in(Stage::Buyer(BuyerStage::Negotiating));
        let change = StageChanged {
            deal_id: deal.id,
            previous: deal.stage,
            next: Stage::Buyer(BuyerStage::Lost),
            changed_at: Utc::now(),
        };
        assert!(!MilestoneGenerator::default().is_triggered_by(&deal, &change));
    }

    #[test]
    fn only_entering_under_contract_triggers() {
        let deal = deal_in(Stage::Seller(SellerStage::UnderContract));
        let change = StageChanged {
            deal_id: deal.id,
            previous: deal.stage,
            next: deal.stage,
            changed_at: Utc::now(),
        };
        assert!(!MilestoneGenerator::default().is_triggered_by(&deal, &change));
    }

    #[test]
    fn before_close_without_close_date_is_unset() {
        let rule = DueRule::BeforeClose(1);
        assert_eq!(rule.due_date(&KeyDates::default(), date(2025, 1, 1)), None);
    }
}

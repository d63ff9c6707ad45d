use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::{DealType, Stage};

/// The org a request is scoped to. Every store call takes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TenantId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Contacts on either side of the deal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parties {
    pub buyer_contact_id: Option<Uuid>,
    pub co_buyer_contact_id: Option<Uuid>,
    pub seller_contact_id: Option<Uuid>,
    pub co_seller_contact_id: Option<Uuid>,
}

impl Parties {
    pub fn contact_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        [
            self.buyer_contact_id,
            self.co_buyer_contact_id,
            self.seller_contact_id,
            self.co_seller_contact_id,
        ]
        .into_iter()
        .flatten()
    }
}

/// Money in cents, commission in basis points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Financials {
    pub estimated_value_cents: Option<i64>,
    pub earnest_money_cents: Option<i64>,
    pub option_fee_cents: Option<i64>,
    pub commission_rate_bps: Option<i32>,
    pub final_sale_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDates {
    pub expected_close_date: Option<NaiveDate>,
    pub financing_deadline: Option<NaiveDate>,
    pub option_period_end: Option<NaiveDate>,
    pub inspection_date: Option<NaiveDate>,
    pub appraisal_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    pub id: Uuid,
    pub tenant: TenantId,
    pub title: String,
    pub stage: Stage,
    pub parties: Parties,
    pub property_id: Option<Uuid>,
    pub assigned_agent_id: Option<Uuid>,
    pub financials: Financials,
    pub dates: KeyDates,
    /// Set once the under-contract checklist has been written for this deal.
    pub milestones_generated_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    pub fn deal_type(&self) -> DealType {
        self.stage.deal_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeal {
    pub title: String,
    pub stage: Stage,
    pub parties: Parties,
    pub property_id: Option<Uuid>,
    pub assigned_agent_id: Option<Uuid>,
    pub financials: Financials,
    pub dates: KeyDates,
}

impl NewDeal {
    pub fn new(title: impl Into<String>, stage: Stage) -> Self {
        Self {
            title: title.into(),
            stage,
            parties: Parties::default(),
            property_id: None,
            assigned_agent_id: None,
            financials: Financials::default(),
            dates: KeyDates::default(),
        }
    }
}

/// Field edits. The outer `None` leaves a field alone; `Some(None)` clears it.
///
/// The stage is deliberately absent: it only changes through a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealPatch {
    pub title: Option<String>,
    pub buyer_contact_id: Option<Option<Uuid>>,
    pub co_buyer_contact_id: Option<Option<Uuid>>,
    pub seller_contact_id: Option<Option<Uuid>>,
    pub co_seller_contact_id: Option<Option<Uuid>>,
    pub property_id: Option<Option<Uuid>>,
    pub assigned_agent_id: Option<Option<Uuid>>,
    pub estimated_value_cents: Option<Option<i64>>,
    pub earnest_money_cents: Option<Option<i64>>,
    pub option_fee_cents: Option<Option<i64>>,
    pub commission_rate_bps: Option<Option<i32>>,
    pub final_sale_price_cents: Option<Option<i64>>,
    pub expected_close_date: Option<Option<NaiveDate>>,
    pub financing_deadline: Option<Option<NaiveDate>>,
    pub option_period_end: Option<Option<NaiveDate>>,
    pub inspection_date: Option<Option<NaiveDate>>,
    pub appraisal_date: Option<Option<NaiveDate>>,
}

impl DealPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Contact ids the patch assigns (cleared references are not included).
    pub fn contact_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        [
            self.buyer_contact_id,
            self.co_buyer_contact_id,
            self.seller_contact_id,
            self.co_seller_contact_id,
        ]
        .into_iter()
        .flatten()
        .flatten()
    }

    pub fn money_fields(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        [
            ("estimatedValueCents", self.estimated_value_cents),
            ("earnestMoneyCents", self.earnest_money_cents),
            ("optionFeeCents", self.option_fee_cents),
            ("finalSalePriceCents", self.final_sale_price_cents),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.flatten().map(|cents| (name, cents)))
    }

    /// Applies the edits to an in-memory deal.
    pub fn apply_to(&self, deal: &mut Deal) {
        if let Some(title) = &self.title {
            deal.title = title.clone();
        }
        set(&mut deal.parties.buyer_contact_id, self.buyer_contact_id);
        set(&mut deal.parties.co_buyer_contact_id, self.co_buyer_contact_id);
        set(&mut deal.parties.seller_contact_id, self.seller_contact_id);
        set(&mut deal.parties.co_seller_contact_id, self.co_seller_contact_id);
        set(&mut deal.property_id, self.property_id);
        set(&mut deal.assigned_agent_id, self.assigned_agent_id);
        let money = &mut deal.financials;
        set(&mut money.estimated_value_cents, self.estimated_value_cents);
        set(&mut money.earnest_money_cents, self.earnest_money_cents);
        set(&mut money.option_fee_cents, self.option_fee_cents);
        set(&mut money.commission_rate_bps, self.commission_rate_bps);
        set(&mut money.final_sale_price_cents, self.final_sale_price_cents);
        let dates = &mut deal.dates;
        set(&mut dates.expected_close_date, self.expected_close_date);
        set(&mut dates.financing_deadline, self.financing_deadline);
        set(&mut dates.option_period_end, self.option_period_end);
        set(&mut dates.inspection_date, self.inspection_date);
        set(&mut dates.appraisal_date, self.appraisal_date);
    }
}

fn set<T: Copy>(field: &mut Option<T>, edit: Option<Option<T>>) {
    if let Some(value) = edit {
        *field = value;
    }
}

use std::cmp::Reverse;

use crate::deal::Deal;
use crate::stage::{DealType, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineColumn {
    pub stage: Stage,
    pub deals: Vec<Deal>,
    pub value_cents: i64,
}

impl PipelineColumn {
    pub fn count(&self) -> usize {
        self.deals.len()
    }
}

/// Kanban view for one deal type, built from a freshly loaded deal set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBoard {
    pub deal_type: DealType,
    pub columns: Vec<PipelineColumn>,
    pub pipeline_value_cents: i64,
}

impl PipelineBoard {
    /// Deals of another type are ignored. Each column lists its most recently
    /// touched deal first.
    pub fn compose(deal_type: DealType, deals: Vec<Deal>) -> Self {
        let mut columns: Vec<PipelineColumn> = deal_type
            .stages()
            .into_iter()
            .map(|stage| PipelineColumn {
                stage,
                deals: Vec::new(),
                value_cents: 0,
            })
            .collect();
        for deal in deals.into_iter().filter(|d| d.deal_type() == deal_type) {
            if let Some(column) = columns.get_mut(deal.stage.position()) {
                column.deals.push(deal);
            }
        }
        for column in &mut columns {
            column.deals.sort_by_key(|deal| Reverse(deal.updated_at));
            column.value_cents = pipeline_value(&column.deals);
        }
        let pipeline_value_cents = columns
            .iter()
            .fold(0i64, |total, column| total.saturating_add(column.value_cents));
        Self {
            deal_type,
            columns,
            pipeline_value_cents,
        }
    }

    pub fn deal_count(&self) -> usize {
        self.columns.iter().map(PipelineColumn::count).sum()
    }

    pub fn column(&self, stage: Stage) -> Option<&PipelineColumn> {
        self.columns.iter().find(|column| column.stage == stage)
    }
}

/// Sum of estimated values; a deal without one counts as zero.
pub fn pipeline_value(deals: &[Deal]) -> i64 {
    deals.iter().fold(0i64, |total, deal| {
        total.saturating_add(deal.financials.estimated_value_cents.unwrap_or(0))
    })
}

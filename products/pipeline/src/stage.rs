//! Buyer and seller stage sequences.
//!
//! A deal's stage is a [`Stage`], which carries the sequence it belongs to, so a
//! seller stage cannot be stored on a buyer deal: the deal type is read off the
//! stage rather than kept next to it.

use std::fmt;

use entity::deals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Buyer,
    Seller,
}

impl DealType {
    pub fn as_str(self) -> &'static str {
        match self {
            DealType::Buyer => "buyer",
            DealType::Seller => "seller",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buyer" => Some(DealType::Buyer),
            "seller" => Some(DealType::Seller),
            _ => None,
        }
    }

    /// Stages in board order, terminal side-state last.
    pub fn stages(self) -> Vec<Stage> {
        match self {
            DealType::Buyer => BuyerStage::ALL.iter().copied().map(Stage::Buyer).collect(),
            DealType::Seller => SellerStage::ALL.iter().copied().map(Stage::Seller).collect(),
        }
    }

    pub fn initial_stage(self) -> Stage {
        match self {
            DealType::Buyer => Stage::Buyer(BuyerStage::Browsing),
            DealType::Seller => Stage::Seller(SellerStage::Preparing),
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<deals::DealType> for DealType {
    fn from(value: deals::DealType) -> Self {
        match value {
            deals::DealType::Buyer => DealType::Buyer,
            deals::DealType::Seller => DealType::Seller,
        }
    }
}

impl From<DealType> for deals::DealType {
    fn from(value: DealType) -> Self {
        match value {
            DealType::Buyer => deals::DealType::Buyer,
            DealType::Seller => deals::DealType::Seller,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuyerStage {
    Browsing,
    Interested,
    Touring,
    OfferPrep,
    OfferSubmitted,
    Negotiating,
    UnderContract,
    Inspection,
    Appraisal,
    FinalWalkthrough,
    Closing,
    Closed,
    Lost,
}

impl BuyerStage {
    pub const ALL: [BuyerStage; 13] = [
        BuyerStage::Browsing,
        BuyerStage::Interested,
        BuyerStage::Touring,
        BuyerStage::OfferPrep,
        BuyerStage::OfferSubmitted,
        BuyerStage::Negotiating,
        BuyerStage::UnderContract,
        BuyerStage::Inspection,
        BuyerStage::Appraisal,
        BuyerStage::FinalWalkthrough,
        BuyerStage::Closing,
        BuyerStage::Closed,
        BuyerStage::Lost,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BuyerStage::Browsing => "browsing",
            BuyerStage::Interested => "interested",
            BuyerStage::Touring => "touring",
            BuyerStage::OfferPrep => "offer_prep",
            BuyerStage::OfferSubmitted => "offer_submitted",
            BuyerStage::Negotiating => "negotiating",
            BuyerStage::UnderContract => "under_contract",
            BuyerStage::Inspection => "inspection",
            BuyerStage::Appraisal => "appraisal",
            BuyerStage::FinalWalkthrough => "final_walkthrough",
            BuyerStage::Closing => "closing",
            BuyerStage::Closed => "closed",
            BuyerStage::Lost => "lost",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BuyerStage::Browsing => "Browsing",
            BuyerStage::Interested => "Interested",
            BuyerStage::Touring => "Touring",
            BuyerStage::OfferPrep => "Offer Prep",
            BuyerStage::OfferSubmitted => "Offer Submitted",
            BuyerStage::Negotiating => "Negotiating",
            BuyerStage::UnderContract => "Under Contract",
            BuyerStage::Inspection => "Inspection",
            BuyerStage::Appraisal => "Appraisal",
            BuyerStage::FinalWalkthrough => "Final Walkthrough",
            BuyerStage::Closing => "Closing",
            BuyerStage::Closed => "Closed",
            BuyerStage::Lost => "Lost",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SellerStage {
    Preparing,
    Listed,
    Showing,
    OfferReceived,
    Negotiating,
    UnderContract,
    Inspection,
    Appraisal,
    Closing,
    Closed,
    Withdrawn,
}

impl SellerStage {
    pub const ALL: [SellerStage; 11] = [
        SellerStage::Preparing,
        SellerStage::Listed,
        SellerStage::Showing,
        SellerStage::OfferReceived,
        SellerStage::Negotiating,
        SellerStage::UnderContract,
        SellerStage::Inspection,
        SellerStage::Appraisal,
        SellerStage::Closing,
        SellerStage::Closed,
        SellerStage::Withdrawn,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SellerStage::Preparing => "preparing",
            SellerStage::Listed => "listed",
            SellerStage::Showing => "showing",
            SellerStage::OfferReceived => "offer_received",
            SellerStage::Negotiating => "negotiating",
            SellerStage::UnderContract => "under_contract",
            SellerStage::Inspection => "inspection",
            SellerStage::Appraisal => "appraisal",
            SellerStage::Closing => "closing",
            SellerStage::Closed => "closed",
            SellerStage::Withdrawn => "withdrawn",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SellerStage::Preparing => "Preparing",
            SellerStage::Listed => "Listed",
            SellerStage::Showing => "Showing",
            SellerStage::OfferReceived => "Offer Received",
            SellerStage::Negotiating => "Negotiating",
            SellerStage::UnderContract => "Under Contract",
            SellerStage::Inspection => "Inspection",
            SellerStage::Appraisal => "Appraisal",
            SellerStage::Closing => "Closing",
            SellerStage::Closed => "Closed",
            SellerStage::Withdrawn => "Withdrawn",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Buyer(BuyerStage),
    Seller(SellerStage),
}

impl Stage {
    /// Parses `key` against the sequence of `deal_type` only.
    pub fn parse(deal_type: DealType, key: &str) -> Option<Self> {
        let key = key.trim();
        match deal_type {
            DealType::Buyer => BuyerStage::from_key(key).map(Stage::Buyer),
            DealType::Seller => SellerStage::from_key(key).map(Stage::Seller),
        }
    }

    pub fn deal_type(self) -> DealType {
        match self {
            Stage::Buyer(_) => DealType::Buyer,
            Stage::Seller(_) => DealType::Seller,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Stage::Buyer(stage) => stage.key(),
            Stage::Seller(stage) => stage.key(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Buyer(stage) => stage.label(),
            Stage::Seller(stage) => stage.label(),
        }
    }

    /// Zero-based column index on the board.
    pub fn position(self) -> usize {
        match self {
            Stage::Buyer(stage) => BuyerStage::ALL
                .iter()
                .position(|candidate| *candidate == stage)
                .unwrap_or_default(),
            Stage::Seller(stage) => SellerStage::ALL
                .iter()
                .position(|candidate| *candidate == stage)
                .unwrap_or_default(),
        }
    }

    /// `lost` and `withdrawn`: no transition leaves these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Buyer(BuyerStage::Lost) | Stage::Seller(SellerStage::Withdrawn)
        )
    }

    pub fn is_closed(self) -> bool {
        matches!(
            self,
            Stage::Buyer(BuyerStage::Closed) | Stage::Seller(SellerStage::Closed)
        )
    }

    pub fn is_under_contract(self) -> bool {
        matches!(
            self,
            Stage::Buyer(BuyerStage::UnderContract) | Stage::Seller(SellerStage::UnderContract)
        )
    }

    pub fn under_contract(deal_type: DealType) -> Self {
        match deal_type {
            DealType::Buyer => Stage::Buyer(BuyerStage::UnderContract),
            DealType::Seller => Stage::Seller(SellerStage::UnderContract),
        }
    }

    /// The side-state a deal falls into when it does not close.
    pub fn terminal_for(deal_type: DealType) -> Self {
        match deal_type {
            DealType::Buyer => Stage::Buyer(BuyerStage::Lost),
            DealType::Seller => Stage::Seller(SellerStage::Withdrawn),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

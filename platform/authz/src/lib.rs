//! Authorization primitives for the deal pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("action {action:?} denied for role {role:?}")]
    Denied { action: Action, role: Option<Role> },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Agent,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "agent" => Some(Role::Agent),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Agent => 2,
            Role::Viewer => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Action {
    ReadPipeline,
    EditDeal,
    MoveDealStage,
    ManageMilestones,
}

impl Action {
    /// Lowest role allowed to perform the action.
    pub fn minimum_role(self) -> Role {
        match self {
            Action::ReadPipeline => Role::Viewer,
            Action::EditDeal | Action::MoveDealStage | Action::ManageMilestones => Role::Agent,
        }
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn check(&self, roles: &[Role], action: Action) -> Result<(), AuthzError> {
        let highest = roles.iter().copied().max_by_key(|role| role.level());
        match highest {
            Some(role) if role.level() >= action.minimum_role().level() => Ok(()),
            _ => Err(AuthzError::Denied {
                action,
                role: highest,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewers_can_only_read() {
        let engine = PolicyEngine;
        assert!(engine.check(&[Role::Viewer], Action::ReadPipeline).is_ok());
        assert_eq!(
            engine.check(&[Role::Viewer], Action::MoveDealStage),
            Err(AuthzError::Denied {
                action: Action::MoveDealStage,
                role: Some(Role::Viewer),
            })
        );
    }

    #[test]
    fn highest_role_wins() {
        let engine = PolicyEngine;
        assert!(
            engine
                .check(&[Role::Viewer, Role::Admin], Action::ManageMilestones)
                .is_ok()
        );
    }

    #[test]
    fn no_roles_is_denied() {
        assert!(PolicyEngine.check(&[], Action::ReadPipeline).is_err());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Agent "), Some(Role::Agent));
        assert_eq!(Role::parse("broker"), None);
    }
}

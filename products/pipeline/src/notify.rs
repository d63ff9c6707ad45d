use async_trait::async_trait;
use uuid::Uuid;

use crate::deal::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// User-facing result of a pipeline action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub tenant: TenantId,
    pub deal_id: Uuid,
    pub outcome: Outcome,
    /// Error code for failures.
    pub code: Option<&'static str>,
    pub message: String,
}

impl Notification {
    pub fn success(tenant: TenantId, deal_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            tenant,
            deal_id,
            outcome: Outcome::Success,
            code: None,
            message: message.into(),
        }
    }

    pub fn failure(
        tenant: TenantId,
        deal_id: Uuid,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tenant,
            deal_id,
            outcome: Outcome::Failure,
            code: Some(code),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, n: Notification) {
        match n.outcome {
            Outcome::Success => tracing::info!(
                tenant = %n.tenant,
                deal_id = %n.deal_id,
                message = %n.message,
                "pipeline action succeeded"
            ),
            Outcome::Failure => tracing::warn!(
                tenant = %n.tenant,
                deal_id = %n.deal_id,
                code = n.code.unwrap_or("UNKNOWN"),
                message = %n.message,
                "pipeline action failed"
            ),
        }
    }
}

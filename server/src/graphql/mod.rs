mod pipeline;
mod types;

#[cfg(test)]
mod tests;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Action, PolicyEngine};
use products_pipeline::{PipelineError, PipelineService};
use serde::Serialize;
use tracing::instrument;

use crate::auth::CurrentUser;

pub use pipeline::{PipelineMutation, PipelineQuery};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(service: PipelineService) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(service)
        .data(PolicyEngine)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> ApiResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    async fn pipeline(&self) -> PipelineQuery {
        PipelineQuery
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn pipeline(&self) -> PipelineMutation {
        PipelineMutation
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

fn authorize(ctx: &Context<'_>, action: Action) -> async_graphql::Result<CurrentUser> {
    let user = ctx
        .data::<CurrentUser>()
        .map_err(|_| ApiError::Unauthenticated.extend())?;
    let policy = ctx.data::<PolicyEngine>().copied().unwrap_or_default();
    policy.check(&user.roles, action).map_err(|denied| {
        tracing::debug!(user_id = %user.user_id, error = %denied, "authorization denied");
        ApiError::Forbidden.extend()
    })?;
    Ok(user.clone())
}

fn service<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a PipelineService> {
    ctx.data::<PipelineService>()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("pipeline service missing")).extend())
}

/// Maps domain failures onto the API taxonomy. Store details are logged, never returned.
fn pipeline_error(err: PipelineError) -> async_graphql::Error {
    let api = match err {
        PipelineError::DealNotFound(_) => ApiError::NotFound("deal"),
        PipelineError::MilestoneNotFound(_) => ApiError::NotFound("milestone"),
        PipelineError::Validation(message) => ApiError::InvalidInput(message),
        PipelineError::PersistenceFailure(source) => {
            tracing::error!(error = %source, "pipeline store failure");
            ApiError::Unavailable("the change could not be saved; nothing was modified".into())
        }
        other => ApiError::rejected(other.code(), other.to_string()),
    };
    api.extend()
}

use async_graphql::{Context, ErrorExtensions, ID, Object};
use platform_api::ApiError;
use platform_authz::Action;
use products_pipeline::{
    DealFilter, DealType, MAX_HISTORY_PAGE, PipelineError, resolve_stage,
};
use tracing::instrument;

use super::types::{
    CreateDealInput, CreateMilestoneInput, DealNode, DealTypeValue, MilestoneNode,
    MoveDealStagePayload, PipelineBoardNode, StageHistoryNode, StageNode, UpdateDealInput,
    parse_uuid,
};
use super::{authorize, pipeline_error, service};

#[derive(Default)]
pub struct PipelineQuery;

#[Object]
impl PipelineQuery {
    #[graphql(name = "pipelineStages")]
    async fn pipeline_stages(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealType")] deal_type: DealTypeValue,
    ) -> async_graphql::Result<Vec<StageNode>> {
        authorize(ctx, Action::ReadPipeline)?;
        Ok(DealType::from(deal_type)
            .stages()
            .into_iter()
            .map(StageNode::from)
            .collect())
    }

    #[graphql(name = "pipelineBoard")]
    #[instrument(name = "pipeline.pipelineBoard", skip_all, fields(deal_type = ?deal_type))]
    async fn pipeline_board(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealType")] deal_type: DealTypeValue,
    ) -> async_graphql::Result<PipelineBoardNode> {
        let user = authorize(ctx, Action::ReadPipeline)?;
        let board = service(ctx)?
            .board(user.tenant, deal_type.into())
            .await
            .map_err(pipeline_error)?;
        Ok(board.into())
    }

    async fn deals(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealType")] deal_type: Option<DealTypeValue>,
        #[graphql(name = "assignedAgentId")] assigned_agent_id: Option<ID>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<DealNode>> {
        let user = authorize(ctx, Action::ReadPipeline)?;
        let filter = DealFilter {
            deal_type: deal_type.map(DealType::from),
            assigned_agent_id: assigned_agent_id
                .as_ref()
                .map(parse_uuid)
                .transpose()
                .map_err(|err| err.extend())?,
            title_query: q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        };
        let deals = service(ctx)?
            .list_deals(user.tenant, &filter)
            .await
            .map_err(pipeline_error)?;
        Ok(deals.into_iter().map(DealNode::from).collect())
    }

    async fn deal(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<DealNode>> {
        let user = authorize(ctx, Action::ReadPipeline)?;
        let deal_id = parse_uuid(&id).map_err(|err| err.extend())?;
        match service(ctx)?.get_deal(user.tenant, deal_id).await {
            Ok(deal) => Ok(Some(deal.into())),
            Err(PipelineError::DealNotFound(_)) => Ok(None),
            Err(err) => Err(pipeline_error(err)),
        }
    }

    async fn milestones(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealId")] deal_id: ID,
    ) -> async_graphql::Result<Vec<MilestoneNode>> {
        let user = authorize(ctx, Action::ReadPipeline)?;
        let deal_id = parse_uuid(&deal_id).map_err(|err| err.extend())?;
        let rows = service(ctx)?
            .milestones(user.tenant, deal_id)
            .await
            .map_err(pipeline_error)?;
        Ok(rows.into_iter().map(MilestoneNode::from).collect())
    }

    #[graphql(name = "dealStageHistory")]
    async fn deal_stage_history(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealId")] deal_id: ID,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<StageHistoryNode>> {
        let user = authorize(ctx, Action::ReadPipeline)?;
        let deal_id = parse_uuid(&deal_id).map_err(|err| err.extend())?;
        let first = first.unwrap_or(50);
        let offset = offset.unwrap_or(0);
        if first < 1 || offset < 0 {
            return Err(ApiError::InvalidInput(
                "first must be positive and offset non-negative".into(),
            )
            .extend());
        }
        if first as u64 > MAX_HISTORY_PAGE {
            return Err(ApiError::rejected(
                "LIMIT_EXCEEDED",
                format!("first cannot exceed {MAX_HISTORY_PAGE}"),
            )
            .extend());
        }
        let entries = service(ctx)?
            .stage_history(user.tenant, deal_id, first as u64, offset as u64)
            .await
            .map_err(pipeline_error)?;
        Ok(entries.into_iter().map(StageHistoryNode::from).collect())
    }
}

#[derive(Default)]
pub struct PipelineMutation;

#[Object]
impl PipelineMutation {
    #[graphql(name = "createDeal")]
    #[instrument(name = "pipeline.createDeal", skip_all)]
    async fn create_deal(
        &self,
        ctx: &Context<'_>,
        input: CreateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let user = authorize(ctx, Action::EditDeal)?;
        let deal_type = DealType::from(input.deal_type);
        let stage = match input.stage.as_deref() {
            Some(key) => resolve_stage(deal_type, key).map_err(pipeline_error)?,
            None => deal_type.initial_stage(),
        };
        let new_deal = input.into_new_deal(stage).map_err(|err| err.extend())?;
        let deal = service(ctx)?
            .create_deal(user.tenant, new_deal, Some(user.user_id))
            .await
            .map_err(pipeline_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "updateDeal")]
    #[instrument(name = "pipeline.updateDeal", skip_all)]
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: UpdateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let user = authorize(ctx, Action::EditDeal)?;
        let deal_id = parse_uuid(&id).map_err(|err| err.extend())?;
        let patch = input.into_patch().map_err(|err| err.extend())?;
        let deal = service(ctx)?
            .update_deal(user.tenant, deal_id, patch, Some(user.user_id))
            .await
            .map_err(pipeline_error)?;
        Ok(deal.into())
    }

    #[graphql(name = "moveDealStage")]
    #[instrument(name = "pipeline.moveDealStage", skip_all, fields(stage = %stage))]
    async fn move_deal_stage(
        &self,
        ctx: &Context<'_>,
        id: ID,
        stage: String,
        note: Option<String>,
    ) -> async_graphql::Result<MoveDealStagePayload> {
        let user = authorize(ctx, Action::MoveDealStage)?;
        let deal_id = parse_uuid(&id).map_err(|err| err.extend())?;
        let outcome = service(ctx)?
            .move_stage(user.tenant, deal_id, &stage, Some(user.user_id), note)
            .await
            .map_err(pipeline_error)?;
        Ok(outcome.into())
    }

    #[graphql(name = "generateMilestones")]
    #[instrument(name = "pipeline.generateMilestones", skip_all)]
    async fn generate_milestones(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealId")] deal_id: ID,
    ) -> async_graphql::Result<Vec<MilestoneNode>> {
        let user = authorize(ctx, Action::ManageMilestones)?;
        let deal_id = parse_uuid(&deal_id).map_err(|err| err.extend())?;
        let rows = service(ctx)?
            .generate_milestones(user.tenant, deal_id)
            .await
            .map_err(pipeline_error)?;
        Ok(rows.into_iter().map(MilestoneNode::from).collect())
    }

    #[graphql(name = "createMilestone")]
    async fn create_milestone(
        &self,
        ctx: &Context<'_>,
        input: CreateMilestoneInput,
    ) -> async_graphql::Result<MilestoneNode> {
        let user = authorize(ctx, Action::ManageMilestones)?;
        let deal_id = parse_uuid(&input.deal_id).map_err(|err| err.extend())?;
        let row = service(ctx)?
            .add_milestone(
                user.tenant,
                deal_id,
                &input.title,
                input.due_date,
                input.notes,
            )
            .await
            .map_err(pipeline_error)?;
        Ok(row.into())
    }

    #[graphql(name = "completeMilestone")]
    async fn complete_milestone(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<MilestoneNode> {
        let user = authorize(ctx, Action::ManageMilestones)?;
        let milestone_id = parse_uuid(&id).map_err(|err| err.extend())?;
        let row = service(ctx)?
            .complete_milestone(user.tenant, milestone_id)
            .await
            .map_err(pipeline_error)?;
        Ok(row.into())
    }

    #[graphql(name = "reopenMilestone")]
    async fn reopen_milestone(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<MilestoneNode> {
        let user = authorize(ctx, Action::ManageMilestones)?;
        let milestone_id = parse_uuid(&id).map_err(|err| err.extend())?;
        let row = service(ctx)?
            .reopen_milestone(user.tenant, milestone_id)
            .await
            .map_err(pipeline_error)?;
        Ok(row.into())
    }
}

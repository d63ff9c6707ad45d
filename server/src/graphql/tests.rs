use std::sync::Arc;

use async_graphql::{Request, Value as GqlValue, Variables};
use migration::{Migrator, MigratorTrait};
use platform_authz::Role;
use products_pipeline::{PipelineService, SeaPipelineStore, TenantId, TracingNotifier};
use sea_orm::Database;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{SchemaType, build_schema};
use crate::auth::CurrentUser;

struct Env {
    schema: SchemaType,
    tenant: TenantId,
}

async fn setup() -> Env {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let org = platform_db::ensure_org(&db, "gulf-coast-realty", "Gulf Coast Realty")
        .await
        .unwrap();
    let service = PipelineService::new(
        Arc::new(SeaPipelineStore::new(db)),
        Arc::new(TracingNotifier),
    );
    Env {
        schema: build_schema(service),
        tenant: TenantId(org),
    }
}

fn user(tenant: TenantId, role: Role) -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        tenant,
        roles: vec![role],
    }
}

async fn run(
    env: &Env,
    who: Option<CurrentUser>,
    query: &str,
    vars: Value,
) -> async_graphql::Response {
    let mut request = Request::new(query).variables(Variables::from_json(vars));
    if let Some(current) = who {
        request = request.data(current);
    }
    env.schema.execute(request).await
}

fn data(resp: async_graphql::Response) -> Value {
    assert!(resp.errors.is_empty(), "errors: {:?}", resp.errors);
    resp.data.into_json().unwrap()
}

fn error_code(resp: &async_graphql::Response) -> Option<GqlValue> {
    resp.errors
        .first()
        .and_then(|err| err.extensions.as_ref())
        .and_then(|ext| ext.get("code"))
        .cloned()
}

const CREATE: &str = r#"
mutation($input: CreateDealInput!) {
  pipeline { createDeal(input: $input) { id stage { key } dealType allowedStageKeys } }
}"#;

const MOVE: &str = r#"
mutation($id: ID!, $stage: String!) {
  pipeline {
    moveDealStage(id: $id, stage: $stage) {
      changed
      deal { stage { key label } milestonesGeneratedAt }
      milestones { title dueDate source }
    }
  }
}"#;

async fn create_buyer_deal(env: &Env, agent: &CurrentUser) -> String {
    let body = data(
        run(
            env,
            Some(agent.clone()),
            CREATE,
            json!({"input": {
                "title": "4 Harbor View",
                "dealType": "BUYER",
                "stage": "negotiating",
                "estimatedValueCents": 51000000,
                "expectedCloseDate": "2025-06-30"
            }}),
        )
        .await,
    );
    body["pipeline"]["createDeal"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn move_to_under_contract_returns_the_checklist() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;

    let body = data(
        run(
            &env,
            Some(agent.clone()),
            MOVE,
            json!({"id": id, "stage": "under_contract"}),
        )
        .await,
    );
    let payload = &body["pipeline"]["moveDealStage"];
    assert_eq!(payload["changed"], json!(true));
    assert_eq!(payload["deal"]["stage"]["label"], json!("Under Contract"));
    assert!(payload["deal"]["milestonesGeneratedAt"].is_string());
    let milestones = payload["milestones"].as_array().unwrap();
    assert_eq!(milestones.len(), 7);
    let walkthrough = milestones
        .iter()
        .find(|m| m["title"] == json!("Final walkthrough"))
        .unwrap();
    assert_eq!(walkthrough["dueDate"], json!("2025-06-29"));
    let option = milestones
        .iter()
        .find(|m| m["title"] == json!("Option period ends"))
        .unwrap();
    assert_eq!(option["dueDate"], Value::Null);

    let again = data(
        run(
            &env,
            Some(agent),
            MOVE,
            json!({"id": id, "stage": "under_contract"}),
        )
        .await,
    );
    assert_eq!(again["pipeline"]["moveDealStage"]["changed"], json!(false));
    assert_eq!(
        again["pipeline"]["moveDealStage"]["milestones"],
        json!([])
    );
}

#[tokio::test]
async fn seller_stage_on_buyer_deal_is_rejected_with_code() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;
    let resp = run(&env, Some(agent.clone()), MOVE, json!({"id": id, "stage": "listed"})).await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("INVALID_STAGE_FOR_TYPE")));

    let deal = data(
        run(
            &env,
            Some(agent),
            "query($id: ID!) { pipeline { deal(id: $id) { stage { key } } } }",
            json!({"id": id}),
        )
        .await,
    );
    assert_eq!(deal["pipeline"]["deal"]["stage"]["key"], json!("negotiating"));
}

#[tokio::test]
async fn lost_deals_reject_further_moves() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;
    data(run(&env, Some(agent.clone()), MOVE, json!({"id": id, "stage": "lost"})).await);
    let resp = run(&env, Some(agent), MOVE, json!({"id": id, "stage": "touring"})).await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("TERMINAL_STAGE")));
}

#[tokio::test]
async fn board_totals_follow_estimated_values() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    create_buyer_deal(&env, &agent).await;
    data(
        run(
            &env,
            Some(agent.clone()),
            CREATE,
            json!({"input": {"title": "Dune Rd", "dealType": "BUYER"}}),
        )
        .await,
    );
    data(
        run(
            &env,
            Some(agent),
            CREATE,
            json!({"input": {
                "title": "Bayfront listing",
                "dealType": "SELLER",
                "estimatedValueCents": 99000000
            }}),
        )
        .await,
    );

    let viewer = user(env.tenant, Role::Viewer);
    let body = data(
        run(
            &env,
            Some(viewer),
            r#"query { pipeline { pipelineBoard(dealType: BUYER) {
                totalCount pipelineValueCents
                columns { stage { key } count valueCents }
            } } }"#,
            json!({}),
        )
        .await,
    );
    let board = &body["pipeline"]["pipelineBoard"];
    assert_eq!(board["totalCount"], json!(2));
    assert_eq!(board["pipelineValueCents"], json!(51000000));
    let columns = board["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 13);
    assert_eq!(columns[0]["stage"]["key"], json!("browsing"));
    assert_eq!(columns[0]["count"], json!(1));
    assert_eq!(columns[12]["stage"]["key"], json!("lost"));
}

#[tokio::test]
async fn roles_gate_reads_and_writes() {
    let env = setup().await;
    let resp = run(
        &env,
        None,
        "query { pipeline { pipelineStages(dealType: SELLER) { key } } }",
        json!({}),
    )
    .await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("UNAUTHENTICATED")));

    let viewer = user(env.tenant, Role::Viewer);
    let stages = data(
        run(
            &env,
            Some(viewer.clone()),
            "query { pipeline { pipelineStages(dealType: SELLER) { key terminal } } }",
            json!({}),
        )
        .await,
    );
    let keys = stages["pipeline"]["pipelineStages"].as_array().unwrap();
    assert_eq!(keys.len(), 11);
    assert_eq!(keys[10], json!({"key": "withdrawn", "terminal": true}));

    let resp = run(
        &env,
        Some(viewer),
        CREATE,
        json!({"input": {"title": "Viewer attempt", "dealType": "SELLER"}}),
    )
    .await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("FORBIDDEN")));
}

#[tokio::test]
async fn deals_of_another_org_are_not_found() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;
    let outsider = user(TenantId(Uuid::new_v4()), Role::Owner);

    let resp = run(&env, Some(outsider.clone()), MOVE, json!({"id": id, "stage": "closing"})).await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("NOT_FOUND")));
    let body = data(
        run(
            &env,
            Some(outsider),
            "query($id: ID!) { pipeline { deal(id: $id) { id } } }",
            json!({"id": id}),
        )
        .await,
    );
    assert_eq!(body["pipeline"]["deal"], Value::Null);
}

#[tokio::test]
async fn manual_milestones_and_history_round_out_the_deal() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;
    data(run(&env, Some(agent.clone()), MOVE, json!({"id": id, "stage": "under_contract"})).await);

    let created = data(
        run(
            &env,
            Some(agent.clone()),
            r#"mutation($input: CreateMilestoneInput!) {
                pipeline { createMilestone(input: $input) { id position source } }
            }"#,
            json!({"input": {"dealId": id, "title": "Survey delivered", "dueDate": "2025-06-01"}}),
        )
        .await,
    );
    let milestone = &created["pipeline"]["createMilestone"];
    assert_eq!(milestone["position"], json!(7));
    assert_eq!(milestone["source"], json!("manual"));
    let milestone_id = milestone["id"].as_str().unwrap().to_string();

    let done = data(
        run(
            &env,
            Some(agent.clone()),
            "mutation($id: ID!) { pipeline { completeMilestone(id: $id) { completedAt } } }",
            json!({"id": milestone_id}),
        )
        .await,
    );
    assert!(done["pipeline"]["completeMilestone"]["completedAt"].is_string());

    let resp = run(
        &env,
        Some(agent.clone()),
        "mutation($id: ID!) { pipeline { generateMilestones(dealId: $id) { id } } }",
        json!({"id": id}),
    )
    .await;
    assert_eq!(
        error_code(&resp),
        Some(GqlValue::from("MILESTONES_ALREADY_GENERATED"))
    );

    let history = data(
        run(
            &env,
            Some(agent),
            r#"query($id: ID!) { pipeline {
                dealStageHistory(dealId: $id) { fromStage { key } toStage { key } changedBy }
            } }"#,
            json!({"id": id}),
        )
        .await,
    );
    let entries = history["pipeline"]["dealStageHistory"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["fromStage"]["key"], json!("negotiating"));
    assert_eq!(entries[0]["toStage"]["key"], json!("under_contract"));
    assert!(entries[0]["changedBy"].is_string());
}

#[tokio::test]
async fn update_deal_clears_fields_with_null() {
    let env = setup().await;
    let agent = user(env.tenant, Role::Agent);
    let id = create_buyer_deal(&env, &agent).await;
    let body = data(
        run(
            &env,
            Some(agent.clone()),
            r#"mutation($id: ID!, $input: UpdateDealInput!) {
                pipeline { updateDeal(id: $id, input: $input) {
                    title expectedCloseDate commissionRateBps stage { key }
                } }
            }"#,
            json!({"id": id, "input": {"expectedCloseDate": null, "commissionRateBps": 250}}),
        )
        .await,
    );
    let deal = &body["pipeline"]["updateDeal"];
    assert_eq!(deal["title"], json!("4 Harbor View"));
    assert_eq!(deal["expectedCloseDate"], Value::Null);
    assert_eq!(deal["commissionRateBps"], json!(250));
    assert_eq!(deal["stage"]["key"], json!("negotiating"));

    let resp = run(
        &env,
        Some(agent),
        r#"mutation($id: ID!) { pipeline { updateDeal(id: $id, input: {title: "  "}) { id } } }"#,
        json!({"id": id}),
    )
    .await;
    assert_eq!(error_code(&resp), Some(GqlValue::from("VALIDATION")));
}

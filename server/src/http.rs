use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum_extra::extract::cookie::CookieJar;
use axum::{
    Json, Router,
    extract::State,
    http::{self, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
};
use platform_db::DbPool;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{auth, auth::AuthConfig, config::AppConfig, graphql::SchemaType};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub schema: SchemaType,
    pub auth: Arc<AuthConfig>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(addr = %config.addr, "pipeline server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allowed_any = allowed.is_empty();
    let allow_origin = if allowed_any {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    let layer = CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin);
    // Credentials cannot be combined with a wildcard origin.
    if allowed_any {
        layer
    } else {
        layer.allow_credentials(true)
    }
}

pub fn build_router(state: AppState) -> Router {
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/graphiql", get(graphiql))
        .route("/graphql", get(graphql_handler).post(graphql_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut req = request.into_inner();
    if let Some(user) = auth::authenticate(&headers, &jar, &state.auth) {
        req = req.data(user);
    }
    state.schema.execute(req).await.into()
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.ping().await.is_ok();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            ok: db_ok,
            db_ok,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use platform_authz::Role;
    use products_pipeline::{PipelineService, SeaPipelineStore, TracingNotifier};
    use sea_orm::Database;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::graphql::build_schema;

    async fn router() -> (Router, Arc<AuthConfig>, Uuid) {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let org = platform_db::ensure_org(&pool, "bluebonnet", "Bluebonnet Homes")
            .await
            .unwrap();
        let service = PipelineService::new(
            Arc::new(SeaPipelineStore::new(pool.clone())),
            Arc::new(TracingNotifier),
        );
        let auth = Arc::new(AuthConfig {
            jwt_secret: "router-test-secret-0123456789abcdef".into(),
            session_ttl_minutes: 5,
        });
        let state = AppState {
            pool,
            schema: build_schema(service),
            auth: auth.clone(),
            config: Arc::new(AppConfig {
                auth: (*auth).clone(),
                cors_allowed_origins: vec!["http://localhost:5173".into()],
            }),
        };
        (build_router(state), auth, org)
    }

    async fn post_graphql(router: Router, token: Option<&str>, query: &str) -> Value {
        let mut builder = http::Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_database_and_request_id() {
        let (router, _, _) = router().await;
        let response = router
            .oneshot(
                http::Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn bearer_token_selects_the_tenant() {
        let (router, auth, org) = router().await;
        let anonymous = post_graphql(
            router.clone(),
            None,
            "{ pipeline { pipelineStages(dealType: BUYER) { key } } }",
        )
        .await;
        assert_eq!(
            anonymous["errors"][0]["extensions"]["code"],
            json!("UNAUTHENTICATED")
        );

        let token = auth::issue_token(Uuid::new_v4(), org, &[Role::Viewer], &auth).unwrap();
        let body = post_graphql(
            router,
            Some(&token),
            "{ pipeline { pipelineBoard(dealType: SELLER) { totalCount } } }",
        )
        .await;
        assert_eq!(body["data"]["pipeline"]["pipelineBoard"]["totalCount"], json!(0));
    }

    #[tokio::test]
    async fn session_cookie_authenticates_graphql() {
        let (router, auth, org) = router().await;
        let token = auth::issue_token(Uuid::new_v4(), org, &[Role::Agent], &auth).unwrap();
        let query = "{ pipeline { pipelineBoard(dealType: BUYER) { totalCount } } }";
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(
                http::header::COOKIE,
                format!("theme=dark; {}={token}", auth::SESSION_COOKIE),
            )
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["errors"].is_null(), "unexpected errors: {body}");
        assert_eq!(body["data"]["pipeline"]["pipelineBoard"]["totalCount"], json!(0));
    }
}

//! HTTP/JSON façade for the manufacturing graph.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

use std::net::SocketAddr;

use tracing::info;

use mfgraph_core::QueryService;
use mfgraph_shared::{MfGraphError, Result};

pub use error::{ApiError, ApiResult};
pub use router::create_router;
pub use state::AppState;

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(service: QueryService, addr: SocketAddr) -> Result<()> {
    let app = create_router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MfGraphError::Server(format!("bind {addr}: {e}")))?;
    info!(%addr, "serving manufacturing graph");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown requested");
        })
        .await
        .map_err(|e| MfGraphError::Server(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use mfgraph_core::GraphCache;
    use mfgraph_shared::{CacheConfig, Direction, Instance};
    use mfgraph_sources::{FetchOutcome, SourceAdapter};

    use super::*;

    struct Fixture(Vec<Instance>);

    #[async_trait]
    impl SourceAdapter for Fixture {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn fetch(&self) -> FetchOutcome {
            let mut outcome = FetchOutcome::new("fixture");
            outcome.instances = self.0.clone();
            outcome
        }
    }

    async fn app() -> Router {
        let source = Fixture(vec![
            Instance::new("line-1").with_name("Line 1"),
            Instance::new("equip-1").with_parent("line-1").with_attribute("OEE", 99.2),
            Instance::new("job-1").with_relationship("ExecutedOn", Direction::Outgoing, "equip-1"),
            Instance::new("order-1").with_relationship("ForJob", Direction::Outgoing, "job-1"),
        ]);
        let config = CacheConfig::default();
        let cache = GraphCache::new(vec![Arc::new(source) as Arc<dyn SourceAdapter>], &config);
        cache.initialize().await.expect("initialize");
        create_router(AppState::new(QueryService::new(cache, &config)))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn context_route_returns_slots() {
        let app = app().await;
        let (status, json) = get(&app, "/context/equip-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["line"]["elementId"], "line-1");
        assert_eq!(json["job"]["elementId"], "job-1");
        assert_eq!(json["order"]["elementId"], "order-1");
        assert_eq!(json["relationshipCount"], 3);
    }

    #[tokio::test]
    async fn unknown_element_is_404() {
        let app = app().await;
        let (status, json) = get(&app, "/context/nonexistent-id").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["elementId"], "nonexistent-id");

        let (status, _) = get(&app, "/objects/nope/children").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_route() {
        let app = app().await;
        let (status, json) = get(&app, "/search?q=99.2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["elementId"], "equip-1");
        assert_eq!(json[0]["matchLocation"], "Attribute: OEE");

        let (status, _) = get(&app, "/search?q=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn object_routes() {
        let app = app().await;
        let (status, json) = get(&app, "/objects/equip-1?includeMetadata=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["role"], "Equipment");
        assert_eq!(json["metadata"]["snapshotVersion"], 1);

        let (_, json) = get(&app, "/objects/equip-1/parent").await;
        assert_eq!(json["elementId"], "line-1");

        let (_, json) = get(&app, "/objects/line-1/parent").await;
        assert!(json.is_null());

        let (_, json) = get(&app, "/objects/job-1/relationships?type=ForJob").await;
        assert_eq!(json["targets"][0], "order-1");
    }

    #[tokio::test]
    async fn hierarchy_and_health() {
        let app = app().await;
        let (status, json) = get(&app, "/hierarchy?lineId=line-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["equipment"][0]["elementId"], "equip-1");

        let (status, json) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["version"], 1);
        assert_eq!(json["stats"]["instances"], 4);
    }

    #[tokio::test]
    async fn refresh_is_accepted() {
        let app = app().await;
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }
}

//! Route handlers. Each one is a thin call into [`QueryService`](mfgraph_core::QueryService).

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use mfgraph_core::{CacheStatus, ContextView, ObjectView, RelationshipsView, SearchResult};
use mfgraph_graph::LineNode;
use mfgraph_shared::Namespace;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectParams {
    #[serde(default)]
    pub include_metadata: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelationshipParams {
    #[serde(rename = "type")]
    pub relationship_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyParams {
    pub line_id: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.service.status())
}

pub async fn namespaces(State(state): State<AppState>) -> Json<Vec<Namespace>> {
    Json(state.service.namespaces())
}

pub async fn object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ObjectParams>,
) -> ApiResult<Json<ObjectView>> {
    Ok(Json(state.service.object(&id, params.include_metadata)?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    Ok(Json(
        state
            .service
            .search(&params.q, params.type_filter.as_deref())?,
    ))
}

pub async fn children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ObjectView>>> {
    Ok(Json(state.service.children(&id)?))
}

pub async fn parent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<ObjectView>>> {
    Ok(Json(state.service.parent(&id)?))
}

pub async fn relationships(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RelationshipParams>,
) -> ApiResult<Json<RelationshipsView>> {
    Ok(Json(
        state
            .service
            .relationships(&id, params.relationship_type.as_deref())?,
    ))
}

pub async fn context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContextView>> {
    Ok(Json(state.service.context(&id)?))
}

pub async fn hierarchy(
    State(state): State<AppState>,
    Query(params): Query<HierarchyParams>,
) -> ApiResult<Json<Vec<LineNode>>> {
    Ok(Json(state.service.hierarchy(params.line_id.as_deref())?))
}

/// Invalidate the snapshot; the rebuild runs in the background.
pub async fn refresh(State(state): State<AppState>) -> (StatusCode, Json<CacheStatus>) {
    (StatusCode::ACCEPTED, Json(state.service.request_refresh()))
}

//! Front registry endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nodemgr_control::{Front, FrontId, GroupManager};

use super::parse_path;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for a single front.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontResponse {
    /// Front ID.
    pub front_id: u32,
    /// Host the front listens on.
    pub host: String,
    /// Port the front listens on.
    pub port: u16,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Front> for FrontResponse {
    fn from(front: Front) -> Self {
        Self {
            front_id: front.front_id.get(),
            host: front.host,
            port: front.port,
            created_at: front.created_at,
        }
    }
}

/// Request to register a front.
#[derive(Debug, Deserialize)]
pub struct AddFrontBody {
    /// Host the front listens on.
    pub host: String,
    /// Port the front listens on.
    pub port: u16,
}

/// Register a front.
///
/// `POST /front` with `{"host": "10.0.0.1", "port": 8081}`
pub async fn add_front<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Json(body): Json<AddFrontBody>,
) -> Result<impl IntoResponse, ApiError>
where
    M: GroupManager + 'static,
{
    let front = state.manager.add_front(&body.host, body.port).await?;
    Ok((StatusCode::CREATED, Json(FrontResponse::from(front))))
}

/// List registered fronts.
///
/// `GET /front`
pub async fn list_fronts<M>(
    State(state): State<Arc<GatewayState<M>>>,
) -> Result<Json<Vec<FrontResponse>>, ApiError>
where
    M: GroupManager + 'static,
{
    let fronts = state.manager.list_fronts().await?;
    Ok(Json(fronts.into_iter().map(FrontResponse::from).collect()))
}

/// Unregister a front and drop its mappings.
///
/// `DELETE /front/:front_id`
pub async fn remove_front<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Path(front_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    M: GroupManager + 'static,
{
    let front_id: FrontId = parse_path(&front_id, "front id")?;
    state.manager.remove_front(front_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

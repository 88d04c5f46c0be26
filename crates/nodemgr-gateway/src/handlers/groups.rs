//! Group management endpoints.
//!
//! Generate and start are forwarded to a front; the rest read local state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use nodemgr_control::{
    GenerateGroupRequest, Group, GroupGeneral, GroupId, GroupManager, GroupStatus, SevenDaysTrans,
};

use super::parse_path;
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Response Types
// =============================================================================

/// Response for a single group.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    /// Group ID.
    pub group_id: u32,
    /// Current status.
    pub group_status: GroupStatus,
    /// Last observed chain height.
    pub latest_block: u64,
    /// Last observed transaction count.
    pub trans_count: u64,
    /// Description given at generation time.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            group_id: group.group_id.get(),
            group_status: group.status,
            latest_block: group.latest_block,
            trans_count: group.trans_count,
            description: group.description,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

/// Response for the group list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGroupsResponse {
    /// Number of normal groups.
    pub total_count: u32,
    /// The normal groups, ordered by id.
    pub data: Vec<GroupResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Generate a group on a front.
///
/// ```text
/// POST /group/generate/:front_ip/:front_port
/// {"generateGroupId": 2, "timestamp": 1700000000000, "nodeList": ["ab12..."]}
///
/// Response: 201 Created
/// ```
pub async fn generate_group<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Path((front_ip, front_port)): Path<(String, String)>,
    Json(body): Json<GenerateGroupRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    M: GroupManager + 'static,
{
    let front_port: u16 = parse_path(&front_port, "front port")?;
    let group = state
        .manager
        .generate_group(body, &front_ip, front_port)
        .await?;

    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

/// Start a group on a front.
///
/// `POST /group/start/:group_id/:front_ip/:front_port`
pub async fn start_group<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Path((group_id, front_ip, front_port)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    M: GroupManager + 'static,
{
    let group_id: GroupId = parse_path(&group_id, "group id")?;
    let front_port: u16 = parse_path(&front_port, "front port")?;
    let group = state
        .manager
        .start_group(group_id, &front_ip, front_port)
        .await?;

    Ok(Json(GroupResponse::from(group)))
}

/// Consistency view of one group.
///
/// `GET /group/general/:group_id`
pub async fn get_group_general<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupGeneral>, ApiError>
where
    M: GroupManager + 'static,
{
    let group_id: GroupId = parse_path(&group_id, "group id")?;
    let general = state.manager.query_group_general(group_id).await?;
    Ok(Json(general))
}

/// List normal groups.
///
/// Also queues a reset sweep, so the next listing reflects what the fronts
/// report. This response is built from the current local state.
///
/// `GET /group/all`
pub async fn list_groups<M>(
    State(state): State<Arc<GatewayState<M>>>,
) -> Result<Json<ListGroupsResponse>, ApiError>
where
    M: GroupManager + 'static,
{
    let total_count = state.manager.count_groups(GroupStatus::Normal).await?;
    let groups = state.manager.list_groups(GroupStatus::Normal).await?;

    if !state.manager.async_reset_group_list() {
        tracing::debug!("Reset sweep not queued");
    }

    Ok(Json(ListGroupsResponse {
        total_count,
        data: groups.into_iter().map(GroupResponse::from).collect(),
    }))
}

/// Seven-day transaction series of a group.
///
/// `GET /group/transDaily/:group_id`
pub async fn get_trans_daily<M>(
    State(state): State<Arc<GatewayState<M>>>,
    Path(group_id): Path<String>,
) -> Result<Json<SevenDaysTrans>, ApiError>
where
    M: GroupManager + 'static,
{
    let group_id: GroupId = parse_path(&group_id, "group id")?;
    let series = state.manager.list_seven_day_trans(group_id).await?;
    Ok(Json(series))
}

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_db::models::GroupRow;
use parley_types::api::{Claims, CreateGroupRequest, GroupResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::parse_timestamp;

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 64 {
        return Err(ApiError::BadRequest("Group name must be 1-64 characters".into()));
    }

    let group_id = Uuid::new_v4();
    let admin_id = claims.sub;
    let member_ids = req.member_ids;

    let group = state
        .with_db(move |db| {
            for member in &member_ids {
                if db.get_user_by_id(&member.to_string())?.is_none() {
                    return Ok(Err(*member));
                }
            }
            let members: Vec<String> = member_ids.iter().map(Uuid::to_string).collect();
            db.create_group(&group_id.to_string(), &name, &admin_id.to_string(), &members)?;
            let row = db
                .get_group(&group_id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("group {group_id} vanished after insert"))?;
            Ok(Ok(group_response(db, row)?))
        })
        .await?
        .map_err(|unknown| ApiError::BadRequest(format!("Unknown member {unknown}")))?;

    info!("{} created group {} ({})", admin_id, group.name, group.id);
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let groups = state
        .with_db(move |db| {
            db.get_groups_for_user(&user_id)?
                .into_iter()
                .map(|row| group_response(db, row))
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .await?;

    Ok(Json(groups))
}

fn group_response(db: &Database, row: GroupRow) -> anyhow::Result<GroupResponse> {
    let member_ids = db
        .get_group_members(&row.id)?
        .into_iter()
        .filter_map(|id| {
            id.parse::<Uuid>()
                .inspect_err(|e| warn!("Corrupt member id '{}' in group '{}': {}", id, row.id, e))
                .ok()
        })
        .collect();

    Ok(GroupResponse {
        id: row.id.parse::<Uuid>()?,
        name: row.name,
        admin_id: row.admin_id.parse::<Uuid>()?,
        member_ids,
        created_at: parse_timestamp(&row.created_at),
    })
}

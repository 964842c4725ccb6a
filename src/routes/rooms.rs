use super::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{InviteToken, MemberDetails, Role, Room, RoomMember, RoomOverview};
use crate::services::invitation_service::{CreatedInvitation, NewInvitation};
use crate::services::room_service::{RoomChanges, RoomView};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub token: String,
}

pub async fn list_rooms(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<RoomOverview>>> {
    Ok(Json(state.rooms.list_rooms(caller.user.id).await?))
}

pub async fn create_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateRoomRequest>,
) -> AppResult<(StatusCode, Json<Room>)> {
    let room = state
        .rooms
        .create_room(&caller.user, &req.name, req.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn join_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<JoinRoomRequest>,
) -> AppResult<Json<Room>> {
    Ok(Json(state.rooms.join_by_code(&caller.user, &req.code).await?))
}

pub async fn get_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<RoomView>> {
    Ok(Json(state.rooms.get_room(room_id, caller.user.id).await?))
}

pub async fn update_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(changes): Json<RoomChanges>,
) -> AppResult<Json<Room>> {
    Ok(Json(state.rooms.update_room(room_id, caller.user.id, &changes).await?))
}

pub async fn delete_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.rooms.delete_room(room_id, caller.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_room(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let room_deleted = state.rooms.leave_room(room_id, caller.user.id).await?;
    Ok(Json(json!({ "room_deleted": room_deleted })))
}

pub async fn transfer_admin(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<TransferRequest>,
) -> AppResult<StatusCode> {
    state
        .rooms
        .transfer_admin(room_id, caller.user.id, req.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reveal_join_code(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let code = state.rooms.reveal_join_code(room_id, caller.user.id).await?;
    Ok(Json(json!({ "join_code": code })))
}

pub async fn rotate_join_code(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let code = state.rooms.rotate_join_code(room_id, caller.user.id).await?;
    Ok(Json(json!({ "join_code": code })))
}

// ── Members ─────────────────────────────────────────────────────────────────

pub async fn list_members(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<MemberDetails>>> {
    Ok(Json(state.rooms.list_members(room_id, caller.user.id).await?))
}

pub async fn change_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> AppResult<Json<RoomMember>> {
    let member = state
        .rooms
        .change_role(room_id, caller.user.id, user_id, req.role)
        .await?;
    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .rooms
        .remove_member(room_id, caller.user.id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Invitations ─────────────────────────────────────────────────────────────

pub async fn list_invitations(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<InviteToken>>> {
    Ok(Json(state.invitations.list_invitations(room_id, caller.user.id).await?))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewInvitation>,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    let created = state
        .invitations
        .create_invitation(room_id, &caller.user, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn revoke_invitation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, invite_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .invitations
        .revoke_invitation(room_id, caller.user.id, invite_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<AcceptInvitationRequest>,
) -> AppResult<Json<RoomMember>> {
    Ok(Json(
        state
            .invitations
            .accept_invitation(&caller.user, &req.token)
            .await?,
    ))
}

use super::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{Vote, VoteBallot};
use crate::services::vote_service::{NewVote, VoteView};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BallotRequest {
    pub choice: String,
}

pub async fn list_votes(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<Vote>>> {
    Ok(Json(state.votes.list_votes(room_id, caller.user.id).await?))
}

pub async fn create_vote(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewVote>,
) -> AppResult<(StatusCode, Json<Vote>)> {
    let vote = state.votes.create_vote(room_id, caller.user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

pub async fn get_vote(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, vote_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<VoteView>> {
    Ok(Json(state.votes.get_vote(room_id, caller.user.id, vote_id).await?))
}

pub async fn cast_ballot(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, vote_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<BallotRequest>,
) -> AppResult<Json<VoteBallot>> {
    Ok(Json(
        state
            .votes
            .cast_ballot(room_id, caller.user.id, vote_id, &req.choice)
            .await?,
    ))
}

pub async fn close_vote(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, vote_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<VoteView>> {
    Ok(Json(state.votes.close_vote(room_id, caller.user.id, vote_id).await?))
}

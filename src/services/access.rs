//! Membership and permission checks shared by every room service.

use crate::cache::{member_key, room_prefix, summary_prefix, Cache};
use crate::error::{AppError, AppResult};
use crate::models::{Role, RoomMember};
use crate::permissions::Permission;
use crate::repositories::RoomMemberRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Memberships change rarely; keep them briefly so hot paths skip the lookup
const MEMBERSHIP_TTL: Duration = Duration::from_secs(60);

pub struct AccessControl {
    members: Arc<RoomMemberRepository>,
    cache: Cache,
}

impl AccessControl {
    pub fn new(members: Arc<RoomMemberRepository>, cache: Cache) -> Self {
        Self { members, cache }
    }

    /// The caller's membership; non-members get NotFound so rooms do not leak
    pub async fn membership(&self, room_id: Uuid, user_id: Uuid) -> AppResult<RoomMember> {
        let key = member_key(room_id, user_id);
        if let Some(member) = self.cache.get::<RoomMember>(&key).await {
            return Ok(member);
        }

        let member = self
            .members
            .find(room_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        self.cache.set(&key, &member, MEMBERSHIP_TTL).await;
        Ok(member)
    }

    /// Membership that also grants `permission`
    pub async fn require(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> AppResult<RoomMember> {
        let member = self.membership(room_id, user_id).await?;
        if !member.role_enum().has(permission) {
            debug!(
                "Denied {:?} to {} ({}) in room {}",
                permission, user_id, member.role, room_id
            );
            return Err(AppError::Forbidden(format!(
                "Your role does not allow this action ({:?})",
                permission
            )));
        }
        Ok(member)
    }

    pub async fn role_of(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Role> {
        Ok(self.membership(room_id, user_id).await?.role_enum())
    }

    /// Someone acted upon (meal target, payer, election candidate) must belong to the room
    pub async fn ensure_member(&self, room_id: Uuid, user_id: Uuid) -> AppResult<RoomMember> {
        self.membership(room_id, user_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::Validation(format!("User {} is not a member of this room", user_id))
                }
                other => other,
            })
    }

    /// Call after any membership write. The summary participant set follows
    /// membership, so the room's cached summaries go too.
    pub async fn membership_changed(&self, room_id: Uuid, user_id: Uuid) {
        self.cache.invalidate(&member_key(room_id, user_id)).await;
        self.cache.invalidate_prefix(&summary_prefix(room_id));
    }

    /// Drop everything cached for a room (memberships and summaries)
    pub fn forget_room(&self, room_id: Uuid) {
        self.cache.invalidate_prefix(&room_prefix(room_id));
    }
}

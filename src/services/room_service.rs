use crate::crypto::{self, SecretBox};
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{MemberDetails, NotificationKind, Role, Room, RoomMember, RoomOverview, User};
use crate::permissions::Permission;
use crate::repositories::{RoomMemberRepository, RoomRepository};
use crate::services::{AccessControl, AuditTrailService, NotificationService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Attempts at drawing a join code that no other room uses
const JOIN_CODE_ATTEMPTS: usize = 3;

/// Partial update of a room's settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomChanges {
    pub name: Option<String>,
    /// An empty string clears the description
    pub description: Option<String>,
    pub meal_cutoff_hour: Option<i16>,
    pub guest_meal_limit: Option<i16>,
}

/// A room together with the caller's place in it
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub room: Room,
    pub role: String,
    pub permissions: Vec<Permission>,
    pub member_count: i64,
}

fn validate_room_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > Room::MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Room name must be between 1 and {} characters",
            Room::MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
}

/// Apply `changes` on top of `room`, validating every field
fn apply_changes(room: &Room, changes: &RoomChanges) -> AppResult<(String, Option<String>, i16, i16)> {
    let name = match &changes.name {
        Some(name) => validate_room_name(name)?,
        None => room.name.clone(),
    };
    let description = match &changes.description {
        Some(d) => clean_description(Some(d)),
        None => room.description.clone(),
    };
    let cutoff = changes.meal_cutoff_hour.unwrap_or(room.meal_cutoff_hour);
    if !(0..=23).contains(&cutoff) {
        return Err(AppError::Validation(
            "meal_cutoff_hour must be between 0 and 23".to_string(),
        ));
    }
    let limit = changes.guest_meal_limit.unwrap_or(room.guest_meal_limit);
    if !(0..=Room::MAX_GUEST_MEAL_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "guest_meal_limit must be between 0 and {}",
            Room::MAX_GUEST_MEAL_LIMIT
        )));
    }
    Ok((name, description, cutoff, limit))
}

/// Service for rooms and their membership
pub struct RoomService {
    rooms: Arc<RoomRepository>,
    members: Arc<RoomMemberRepository>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditTrailService>,
    secrets: SecretBox,
}

impl RoomService {
    pub fn new(
        rooms: Arc<RoomRepository>,
        members: Arc<RoomMemberRepository>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditTrailService>,
        secrets: SecretBox,
    ) -> Self {
        Self {
            rooms,
            members,
            access,
            notifications,
            audit,
            secrets,
        }
    }

    /// Fresh join code as (plain, sealed, hash)
    fn new_join_code(&self) -> AppResult<(String, String, String)> {
        let code = crypto::generate_join_code()?;
        let sealed = self.secrets.seal(&code)?;
        let hash = crypto::hash_token(&code);
        Ok((code, sealed, hash))
    }

    async fn load_room(&self, room_id: Uuid) -> AppResult<Room> {
        self.rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
    }

    /// Create a room; the creator becomes its admin
    pub async fn create_room(&self, user: &User, name: &str, description: Option<&str>) -> AppResult<Room> {
        let name = validate_room_name(name)?;
        let description = clean_description(description);
        info!("Creating room: name={}, admin={}", name, user.id);

        let mut attempt = 0;
        let room = loop {
            attempt += 1;
            let (_, sealed, hash) = self.new_join_code()?;
            match self
                .rooms
                .create_with_admin(&name, description.as_deref(), &sealed, &hash, user.id)
                .await
            {
                Ok(room) => break room,
                Err(RepositoryError::Duplicate(_)) if attempt < JOIN_CODE_ATTEMPTS => {
                    warn!("Join code collision, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.audit
            .record(
                "room_created",
                Some(room.id),
                Some(user.id),
                serde_json::json!({ "name": room.name }),
            )
            .await;

        info!("Created room {} ({})", room.name, room.id);
        Ok(room)
    }

    pub async fn list_rooms(&self, user_id: Uuid) -> AppResult<Vec<RoomOverview>> {
        Ok(self.rooms.list_for_user(user_id).await?)
    }

    pub async fn get_room(&self, room_id: Uuid, user_id: Uuid) -> AppResult<RoomView> {
        let member = self.access.membership(room_id, user_id).await?;
        let room = self.load_room(room_id).await?;
        let member_count = self.members.count_members(room_id).await?;
        let role = member.role_enum();

        Ok(RoomView {
            room,
            role: role.to_string(),
            permissions: role.permissions(),
            member_count,
        })
    }

    pub async fn update_room(&self, room_id: Uuid, user_id: Uuid, changes: &RoomChanges) -> AppResult<Room> {
        self.access.require(room_id, user_id, Permission::ManageRoom).await?;
        let room = self.load_room(room_id).await?;
        let (name, description, cutoff, limit) = apply_changes(&room, changes)?;

        let updated = self
            .rooms
            .update(room_id, &name, description.as_deref(), cutoff, limit)
            .await?;

        info!("Room {} updated by {}", room_id, user_id);
        self.notifications
            .websocket()
            .push_room_update(room_id, "room", "updated")
            .await;
        Ok(updated)
    }

    pub async fn delete_room(&self, room_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.access.require(room_id, user_id, Permission::DeleteRoom).await?;
        let room = self.load_room(room_id).await?;

        self.rooms.delete(room_id).await?;
        self.access.forget_room(room_id);

        self.audit
            .record(
                "room_deleted",
                Some(room_id),
                Some(user_id),
                serde_json::json!({ "name": room.name }),
            )
            .await;
        info!("Room {} deleted by {}", room_id, user_id);
        Ok(())
    }

    pub async fn reveal_join_code(&self, room_id: Uuid, user_id: Uuid) -> AppResult<String> {
        self.access
            .require(room_id, user_id, Permission::ManageInvitations)
            .await?;
        let room = self.load_room(room_id).await?;
        self.secrets.open(&room.join_code_enc)
    }

    /// Replace the join code; the old one stops working immediately
    pub async fn rotate_join_code(&self, room_id: Uuid, user_id: Uuid) -> AppResult<String> {
        self.access
            .require(room_id, user_id, Permission::ManageInvitations)
            .await?;

        let (code, sealed, hash) = self.new_join_code()?;
        self.rooms.update_join_code(room_id, &sealed, &hash).await?;

        info!("Join code of room {} rotated by {}", room_id, user_id);
        Ok(code)
    }

    pub async fn join_by_code(&self, user: &User, code: &str) -> AppResult<Room> {
        let code = crypto::normalize_join_code(code);
        if code.len() != crypto::JOIN_CODE_LEN {
            return Err(AppError::Validation("Invalid join code".to_string()));
        }

        let room = self
            .rooms
            .find_by_join_code_hash(&crypto::hash_token(&code))
            .await?
            .ok_or_else(|| AppError::NotFound("No room matches this join code".to_string()))?;

        self.members
            .add_member(room.id, user.id, Role::Member)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::Conflict("You are already a member of this room".to_string())
                }
                other => other.into(),
            })?;
        self.access.membership_changed(room.id, user.id).await;

        info!("User {} joined room {} by code", user.id, room.id);
        self.notifications
            .notify_room(
                room.id,
                Some(user.id),
                NotificationKind::MemberJoined,
                "New member",
                &format!("{} joined {}", user.name, room.name),
            )
            .await;
        Ok(room)
    }

    /// Leave a room. Returns true when the room was deleted because it emptied.
    pub async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let member = self.access.membership(room_id, user_id).await?;
        let member_count = self.members.count_members(room_id).await?;

        if member_count <= 1 {
            self.rooms.delete(room_id).await?;
            self.access.forget_room(room_id);
            self.notifications.websocket().revoke_room(room_id, user_id).await;
            self.audit
                .record("room_deleted", Some(room_id), Some(user_id), serde_json::json!({ "reason": "last member left" }))
                .await;
            info!("Last member {} left room {}; room deleted", user_id, room_id);
            return Ok(true);
        }

        if member.is_admin() && self.members.count_admins(room_id).await? <= 1 {
            return Err(AppError::BusinessLogic(
                "Transfer admin rights before leaving the room".to_string(),
            ));
        }

        self.members.remove_member(room_id, user_id).await?;
        self.access.membership_changed(room_id, user_id).await;
        self.notifications.websocket().revoke_room(room_id, user_id).await;
        info!("User {} left room {}", user_id, room_id);
        Ok(false)
    }

    /// Make `new_admin` the admin; the current admin steps down to manager
    pub async fn transfer_admin(&self, room_id: Uuid, admin_id: Uuid, new_admin: Uuid) -> AppResult<()> {
        let actor = self.access.membership(room_id, admin_id).await?;
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only an admin can transfer admin rights".to_string(),
            ));
        }
        if admin_id == new_admin {
            return Err(AppError::Validation("You are already the admin".to_string()));
        }
        self.access.ensure_member(room_id, new_admin).await?;

        self.members.transfer_admin(room_id, admin_id, new_admin).await?;
        self.access.membership_changed(room_id, admin_id).await;
        self.access.membership_changed(room_id, new_admin).await;

        self.audit
            .record(
                "role_changed",
                Some(room_id),
                Some(admin_id),
                serde_json::json!({ "transfer_admin_to": new_admin }),
            )
            .await;
        self.notifications
            .notify_quietly(
                new_admin,
                Some(room_id),
                NotificationKind::RoleChanged,
                "You are now admin",
                "Admin rights of the room were transferred to you",
            )
            .await;
        info!("Admin of room {} transferred from {} to {}", room_id, admin_id, new_admin);
        Ok(())
    }

    pub async fn list_members(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<MemberDetails>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.members.list_details(room_id).await?)
    }

    pub async fn change_role(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        role: Role,
    ) -> AppResult<RoomMember> {
        let actor = self
            .access
            .require(room_id, actor_id, Permission::ManageRoles)
            .await?;
        if !actor.role_enum().can_assign(role) {
            return Err(AppError::Forbidden(format!("You cannot assign the {} role", role)));
        }
        if actor_id == target_id {
            return Err(AppError::BusinessLogic("You cannot change your own role".to_string()));
        }

        let target = self.access.ensure_member(room_id, target_id).await?;
        if target.is_admin() && role != Role::Admin && self.members.count_admins(room_id).await? <= 1 {
            return Err(AppError::BusinessLogic("A room needs at least one admin".to_string()));
        }

        let updated = self.members.update_role(room_id, target_id, role).await?;
        self.access.membership_changed(room_id, target_id).await;

        self.audit
            .record(
                "role_changed",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({ "user_id": target_id, "from": target.role, "to": role }),
            )
            .await;
        self.notifications
            .notify_quietly(
                target_id,
                Some(room_id),
                NotificationKind::RoleChanged,
                "Role changed",
                &format!("Your role is now {}", role),
            )
            .await;
        info!("Role of {} in room {} set to {} by {}", target_id, room_id, role, actor_id);
        Ok(updated)
    }

    pub async fn remove_member(&self, room_id: Uuid, actor_id: Uuid, target_id: Uuid) -> AppResult<()> {
        let actor = self
            .access
            .require(room_id, actor_id, Permission::ManageMembers)
            .await?;
        if actor_id == target_id {
            return Err(AppError::BusinessLogic(
                "Use leave to remove yourself from a room".to_string(),
            ));
        }

        let target = self.access.ensure_member(room_id, target_id).await?;
        let actor_role = actor.role_enum();
        if actor_role != Role::Admin && target.role_enum().rank() >= actor_role.rank() {
            return Err(AppError::Forbidden(
                "You cannot remove a member of equal or higher rank".to_string(),
            ));
        }

        self.members.remove_member(room_id, target_id).await?;
        self.access.membership_changed(room_id, target_id).await;
        self.notifications.websocket().revoke_room(room_id, target_id).await;

        self.audit
            .record(
                "member_removed",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({ "user_id": target_id, "role": target.role }),
            )
            .await;
        self.notifications
            .notify_quietly(
                target_id,
                Some(room_id),
                NotificationKind::MemberRemoved,
                "Removed from room",
                "You were removed from the room",
            )
            .await;
        info!("Member {} removed from room {} by {}", target_id, room_id, actor_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn room() -> Room {
        let now = Utc::now().naive_utc();
        Room {
            id: Uuid::new_v4(),
            name: "Flat 4".to_string(),
            description: Some("Top floor".to_string()),
            join_code_enc: String::new(),
            join_code_hash: String::new(),
            meal_cutoff_hour: 22,
            guest_meal_limit: 5,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_room_name_rules() {
        assert_eq!(validate_room_name("  Flat 4 ").unwrap(), "Flat 4");
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name(&"r".repeat(81)).is_err());
    }

    #[test]
    fn test_partial_changes_keep_other_fields() {
        let changes = RoomChanges {
            meal_cutoff_hour: Some(9),
            ..Default::default()
        };
        let (name, description, cutoff, limit) = apply_changes(&room(), &changes).unwrap();
        assert_eq!(name, "Flat 4");
        assert_eq!(description.as_deref(), Some("Top floor"));
        assert_eq!(cutoff, 9);
        assert_eq!(limit, 5);
    }

    #[test]
    fn test_empty_description_clears_it() {
        let changes = RoomChanges {
            description: Some("  ".to_string()),
            ..Default::default()
        };
        let (_, description, _, _) = apply_changes(&room(), &changes).unwrap();
        assert!(description.is_none());
    }

    #[test]
    fn test_setting_bounds() {
        let bad_hour = RoomChanges {
            meal_cutoff_hour: Some(24),
            ..Default::default()
        };
        assert!(apply_changes(&room(), &bad_hour).is_err());

        let bad_limit = RoomChanges {
            guest_meal_limit: Some(21),
            ..Default::default()
        };
        assert!(apply_changes(&room(), &bad_limit).is_err());

        let edge = RoomChanges {
            meal_cutoff_hour: Some(0),
            guest_meal_limit: Some(20),
            ..Default::default()
        };
        assert!(apply_changes(&room(), &edge).is_ok());
    }
}

use crate::auth::normalize_email;
use crate::crypto;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{InviteToken, NotificationKind, Role, RoomMember, User};
use crate::permissions::Permission;
use crate::repositories::{InvitationRepository, RoomRepository, UserRepository};
use crate::services::{AccessControl, EmailClient, NotificationService};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_INVITE_USES: i32 = 100;
pub const MAX_INVITE_TTL_HOURS: i64 = 720;
const DEFAULT_INVITE_USES: i32 = 1;
const DEFAULT_INVITE_TTL_HOURS: i64 = 72;

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvitation {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub max_uses: Option<i32>,
    pub ttl_hours: Option<i64>,
}

/// A freshly created invitation; the raw token is only ever returned here
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvitation {
    #[serde(flatten)]
    pub invitation: InviteToken,
    pub token: String,
    pub link: String,
}

/// Resolve defaults and bounds for a new invitation
fn invitation_limits(max_uses: Option<i32>, ttl_hours: Option<i64>) -> AppResult<(i32, i64)> {
    let max_uses = max_uses.unwrap_or(DEFAULT_INVITE_USES);
    if !(1..=MAX_INVITE_USES).contains(&max_uses) {
        return Err(AppError::Validation(format!(
            "max_uses must be between 1 and {}",
            MAX_INVITE_USES
        )));
    }
    let ttl_hours = ttl_hours.unwrap_or(DEFAULT_INVITE_TTL_HOURS);
    if !(1..=MAX_INVITE_TTL_HOURS).contains(&ttl_hours) {
        return Err(AppError::Validation(format!(
            "ttl_hours must be between 1 and {}",
            MAX_INVITE_TTL_HOURS
        )));
    }
    Ok((max_uses, ttl_hours))
}

/// Why an invitation cannot be used by `email` right now, if any
fn rejection_reason(invite: &InviteToken, email: &str, now: chrono::NaiveDateTime) -> Option<&'static str> {
    if invite.is_expired(now) {
        Some("This invitation has expired")
    } else if invite.is_exhausted() {
        Some("This invitation has already been used")
    } else if !invite.accepts_email(email) {
        Some("This invitation was issued for a different email address")
    } else {
        None
    }
}

pub struct InvitationService {
    invitations: Arc<InvitationRepository>,
    rooms: Arc<RoomRepository>,
    users: Arc<UserRepository>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailClient>,
    public_base_url: String,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<InvitationRepository>,
        rooms: Arc<RoomRepository>,
        users: Arc<UserRepository>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailClient>,
        public_base_url: String,
    ) -> Self {
        Self {
            invitations,
            rooms,
            users,
            access,
            notifications,
            email,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_invitation(
        &self,
        room_id: Uuid,
        inviter: &User,
        request: &NewInvitation,
    ) -> AppResult<CreatedInvitation> {
        let actor = self
            .access
            .require(room_id, inviter.id, Permission::ManageInvitations)
            .await?;
        let role = request.role.unwrap_or(Role::Member);
        if !actor.role_enum().can_assign(role) {
            return Err(AppError::Forbidden(format!("You cannot invite as {}", role)));
        }
        let (max_uses, ttl_hours) = invitation_limits(request.max_uses, request.ttl_hours)?;
        let email = match request.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(raw) => Some(normalize_email(raw)?),
            None => None,
        };

        let room = self
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let token = crypto::generate_token()?;
        let expires_at = Utc::now().naive_utc() + Duration::hours(ttl_hours);
        let invitation = self
            .invitations
            .create(
                room_id,
                email.as_deref(),
                role,
                &crypto::hash_token(&token),
                max_uses,
                expires_at,
                inviter.id,
            )
            .await?;
        let link = format!("{}/invite/{}", self.public_base_url, token);

        info!(
            "Invitation {} created for room {} by {} (role={}, uses={})",
            invitation.id, room_id, inviter.id, role, max_uses
        );

        if let Some(address) = email.as_deref() {
            let text = format!(
                "{} invited you to join {} on Messmate.\n\nAccept the invitation: {}\n\nThe link expires in {} hours.",
                inviter.name, room.name, link, ttl_hours
            );
            if let Err(e) = self
                .email
                .send(address, &format!("Invitation to {}", room.name), &text)
                .await
            {
                warn!("Invitation email to {} failed: {}", address, e);
            }

            if let Some(invitee) = self.users.find_by_email(address).await? {
                self.notifications
                    .notify_quietly(
                        invitee.id,
                        Some(room_id),
                        NotificationKind::Invitation,
                        "Room invitation",
                        &format!("{} invited you to join {}", inviter.name, room.name),
                    )
                    .await;
            }
        }

        Ok(CreatedInvitation {
            invitation,
            token,
            link,
        })
    }

    pub async fn list_invitations(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<InviteToken>> {
        self.access
            .require(room_id, user_id, Permission::ManageInvitations)
            .await?;
        Ok(self.invitations.list(room_id).await?)
    }

    pub async fn revoke_invitation(&self, room_id: Uuid, user_id: Uuid, invite_id: Uuid) -> AppResult<()> {
        self.access
            .require(room_id, user_id, Permission::ManageInvitations)
            .await?;
        if !self.invitations.revoke(room_id, invite_id).await? {
            return Err(AppError::NotFound("Invitation not found".to_string()));
        }
        info!("Invitation {} of room {} revoked by {}", invite_id, room_id, user_id);
        Ok(())
    }

    pub async fn accept_invitation(&self, user: &User, token: &str) -> AppResult<RoomMember> {
        let invite = self
            .invitations
            .find_by_token_hash(&crypto::hash_token(token))
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        let now = Utc::now().naive_utc();
        if let Some(reason) = rejection_reason(&invite, &user.email, now) {
            return Err(AppError::BusinessLogic(reason.to_string()));
        }

        let member = self
            .invitations
            .accept(&invite, user.id, now)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::Conflict("You are already a member of this room".to_string())
                }
                other => other.into(),
            })?;
        self.access.membership_changed(invite.room_id, user.id).await;

        info!("User {} accepted invitation {} to room {}", user.id, invite.id, invite.room_id);
        self.notifications
            .notify_room(
                invite.room_id,
                Some(user.id),
                NotificationKind::MemberJoined,
                "New member",
                &format!("{} joined the room", user.name),
            )
            .await;
        Ok(member)
    }

    /// Remove expired and used-up invitations
    pub async fn purge_stale(&self) -> AppResult<u64> {
        Ok(self.invitations.delete_stale(Utc::now().naive_utc()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(email: Option<&str>, uses: i32, expires_in_hours: i64) -> InviteToken {
        let now = Utc::now().naive_utc();
        InviteToken {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            email: email.map(String::from),
            role: "member".into(),
            token_hash: String::new(),
            max_uses: 1,
            uses,
            expires_at: now + Duration::hours(expires_in_hours),
            created_by: Uuid::new_v4(),
            created_at: now,
        }
    }

    #[test]
    fn test_invitation_defaults() {
        assert_eq!(invitation_limits(None, None).unwrap(), (1, 72));
        assert_eq!(invitation_limits(Some(100), Some(720)).unwrap(), (100, 720));
    }

    #[test]
    fn test_invitation_bounds() {
        assert!(invitation_limits(Some(0), None).is_err());
        assert!(invitation_limits(Some(101), None).is_err());
        assert!(invitation_limits(None, Some(0)).is_err());
        assert!(invitation_limits(None, Some(721)).is_err());
    }

    #[test]
    fn test_rejection_reasons() {
        let now = Utc::now().naive_utc();
        assert!(rejection_reason(&invite(None, 0, 1), "a@example.com", now).is_none());
        assert_eq!(
            rejection_reason(&invite(None, 0, -1), "a@example.com", now),
            Some("This invitation has expired")
        );
        assert_eq!(
            rejection_reason(&invite(None, 1, 1), "a@example.com", now),
            Some("This invitation has already been used")
        );
        assert!(rejection_reason(&invite(Some("b@example.com"), 0, 1), "a@example.com", now).is_some());
        assert!(rejection_reason(&invite(Some("A@Example.com"), 0, 1), "a@example.com", now).is_none());
    }
}

use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind};
use crate::repositories::{NotificationRepository, RoomMemberRepository};
use crate::websocket::WebSocketServer;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MAX_LIST_LIMIT: i64 = 100;
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Stores notifications and pushes them to connected clients
pub struct NotificationService {
    notifications: Arc<NotificationRepository>,
    members: Arc<RoomMemberRepository>,
    ws: Arc<WebSocketServer>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<NotificationRepository>,
        members: Arc<RoomMemberRepository>,
        ws: Arc<WebSocketServer>,
    ) -> Self {
        Self {
            notifications,
            members,
            ws,
        }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        room_id: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> AppResult<Notification> {
        let notification = self
            .notifications
            .create(user_id, room_id, kind, title, message)
            .await?;

        let delivered = self.ws.push_notification(&notification).await;
        debug!("Notification {} ({}) pushed to {} clients", notification.id, kind, delivered);
        Ok(notification)
    }

    /// Notify every member of a room except `except`; failures are logged, not returned
    pub async fn notify_room(
        &self,
        room_id: Uuid,
        except: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> usize {
        let recipients = match self.members.member_ids(room_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load members of room {} for notification: {}", room_id, e);
                return 0;
            }
        };

        let mut sent = 0;
        for user_id in recipients.into_iter().filter(|id| Some(*id) != except) {
            match self.notify(user_id, Some(room_id), kind, title, message).await {
                Ok(_) => sent += 1,
                Err(e) => warn!("Failed to notify {}: {}", user_id, e),
            }
        }
        sent
    }

    /// Best-effort single notification for side effects of another action
    pub async fn notify_quietly(
        &self,
        user_id: Uuid,
        room_id: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) {
        if let Err(e) = self.notify(user_id, room_id, kind, title, message).await {
            warn!("Failed to notify {}: {}", user_id, e);
        }
    }

    pub async fn list(&self, user_id: Uuid, unread_only: bool, limit: Option<i64>) -> AppResult<Vec<Notification>> {
        let limit = clamp_limit(limit)?;
        Ok(self.notifications.list(user_id, unread_only, limit).await?)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.notifications.unread_count(user_id).await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        if !self.notifications.mark_read(id, user_id).await? {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        if !self.notifications.delete(id, user_id).await? {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub fn websocket(&self) -> &Arc<WebSocketServer> {
        &self.ws
    }
}

fn clamp_limit(limit: Option<i64>) -> AppResult<i64> {
    match limit {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(n) if (1..=MAX_LIST_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_bounds() {
        assert_eq!(clamp_limit(None).unwrap(), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(100)).unwrap(), 100);
        assert!(clamp_limit(Some(0)).is_err());
        assert!(clamp_limit(Some(101)).is_err());
    }
}

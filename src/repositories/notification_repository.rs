use crate::error::RepoResult;
use crate::models::{Notification, NotificationKind};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for per-user notifications
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        room_id: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> RepoResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, room_id, kind, title, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, room_id, kind, title, message, read, created_at
            "#,
        )
        .bind(user_id)
        .bind(room_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Newest first
    pub async fn list(&self, user_id: Uuid, unread_only: bool, limit: i64) -> RepoResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, room_id, kind, title, message, read, created_at
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT read)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read; false if it does not belong to `user_id`
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<u64> {
        let rows = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}

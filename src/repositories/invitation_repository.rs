use crate::error::{RepoResult, RepositoryError};
use crate::models::{InviteToken, Role, RoomMember};
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for room invitation tokens
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        room_id: Uuid,
        email: Option<&str>,
        role: Role,
        token_hash: &str,
        max_uses: i32,
        expires_at: NaiveDateTime,
        created_by: Uuid,
    ) -> RepoResult<InviteToken> {
        let invite = sqlx::query_as::<_, InviteToken>(
            r#"
            INSERT INTO invite_tokens (room_id, email, role, token_hash, max_uses, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, room_id, email, role, token_hash, max_uses, uses, expires_at,
                      created_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(email)
        .bind(role.as_str())
        .bind(token_hash)
        .bind(max_uses)
        .bind(expires_at)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(invite)
    }

    pub async fn list(&self, room_id: Uuid) -> RepoResult<Vec<InviteToken>> {
        let invites = sqlx::query_as::<_, InviteToken>(
            r#"
            SELECT id, room_id, email, role, token_hash, max_uses, uses, expires_at,
                   created_by, created_at
            FROM invite_tokens
            WHERE room_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invites)
    }

    pub async fn find_by_token_hash(&self, token_hash: &str) -> RepoResult<Option<InviteToken>> {
        let invite = sqlx::query_as::<_, InviteToken>(
            r#"
            SELECT id, room_id, email, role, token_hash, max_uses, uses, expires_at,
                   created_by, created_at
            FROM invite_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invite)
    }

    pub async fn revoke(&self, room_id: Uuid, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM invite_tokens WHERE room_id = $1 AND id = $2")
            .bind(room_id)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Consume one use of the invitation and add the member atomically
    pub async fn accept(&self, invite: &InviteToken, user_id: Uuid, now: NaiveDateTime) -> RepoResult<RoomMember> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE invite_tokens
            SET uses = uses + 1
            WHERE id = $1 AND uses < max_uses AND expires_at > $2
            "#,
        )
        .bind(invite.id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if consumed == 0 {
            return Err(RepositoryError::BusinessRule(
                "Invitation is expired or fully used".to_string(),
            ));
        }

        let member = sqlx::query_as::<_, RoomMember>(
            r#"
            INSERT INTO room_members (room_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING room_id, user_id, role, joined_at
            "#,
        )
        .bind(invite.room_id)
        .bind(user_id)
        .bind(&invite.role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(member)
    }

    /// Drop invitations that can no longer be used
    pub async fn delete_stale(&self, now: NaiveDateTime) -> RepoResult<u64> {
        let rows = sqlx::query("DELETE FROM invite_tokens WHERE expires_at <= $1 OR uses >= max_uses")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows)
    }
}

use crate::error::{RepoResult, RepositoryError};
use crate::models::{MemberDetails, Role, RoomMember};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for room membership
pub struct RoomMemberRepository {
    pool: PgPool,
}

impl RoomMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a member; an existing membership surfaces as `Duplicate`
    pub async fn add_member(&self, room_id: Uuid, user_id: Uuid, role: Role) -> RepoResult<RoomMember> {
        let member = sqlx::query_as::<_, RoomMember>(
            r#"
            INSERT INTO room_members (room_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING room_id, user_id, role, joined_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    pub async fn find(&self, room_id: Uuid, user_id: Uuid) -> RepoResult<Option<RoomMember>> {
        let member = sqlx::query_as::<_, RoomMember>(
            r#"
            SELECT room_id, user_id, role, joined_at
            FROM room_members
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// Members with their user details, admins first then by name
    pub async fn list_details(&self, room_id: Uuid) -> RepoResult<Vec<MemberDetails>> {
        let members = sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, m.role, m.joined_at
            FROM room_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.room_id = $1
            ORDER BY (m.role = 'admin') DESC, LOWER(u.name), u.id
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    pub async fn member_ids(&self, room_id: Uuid) -> RepoResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM room_members
            WHERE room_id = $1
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn count_members(&self, room_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn count_admins(&self, room_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM room_members WHERE room_id = $1 AND role = 'admin'",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn update_role(&self, room_id: Uuid, user_id: Uuid, role: Role) -> RepoResult<RoomMember> {
        let member = sqlx::query_as::<_, RoomMember>(
            r#"
            UPDATE room_members
            SET role = $3
            WHERE room_id = $1 AND user_id = $2
            RETURNING room_id, user_id, role, joined_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        member.ok_or_else(|| RepositoryError::NotFound("Member not found".to_string()))
    }

    pub async fn remove_member(&self, room_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Hand admin over: `to` becomes admin, `from` becomes manager
    pub async fn transfer_admin(&self, room_id: Uuid, from: Uuid, to: Uuid) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        let promoted = sqlx::query(
            "UPDATE room_members SET role = $3 WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(to)
        .bind(Role::Admin.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if promoted == 0 {
            return Err(RepositoryError::NotFound("Target member not found".to_string()));
        }

        sqlx::query("UPDATE room_members SET role = $3 WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(from)
            .bind(Role::Manager.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

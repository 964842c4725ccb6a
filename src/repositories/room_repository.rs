use crate::error::{RepoResult, RepositoryError};
use crate::models::{Role, Room, RoomOverview};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for rooms (shared households)
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a room and register its creator as admin in one transaction
    pub async fn create_with_admin(
        &self,
        name: &str,
        description: Option<&str>,
        join_code_enc: &str,
        join_code_hash: &str,
        created_by: Uuid,
    ) -> RepoResult<Room> {
        let mut tx = self.pool.begin().await?;

        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (name, description, join_code_enc, join_code_hash, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, join_code_enc, join_code_hash,
                      meal_cutoff_hour, guest_meal_limit, created_by, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(join_code_enc)
        .bind(join_code_hash)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(room.id)
        .bind(created_by)
        .bind(Role::Admin.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(room)
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, description, join_code_enc, join_code_hash,
                   meal_cutoff_hour, guest_meal_limit, created_by, created_at, updated_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    pub async fn find_by_join_code_hash(&self, join_code_hash: &str) -> RepoResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, description, join_code_enc, join_code_hash,
                   meal_cutoff_hour, guest_meal_limit, created_by, created_at, updated_at
            FROM rooms
            WHERE join_code_hash = $1
            "#,
        )
        .bind(join_code_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    /// Rooms the user belongs to, with their role and the member count
    pub async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<RoomOverview>> {
        let rooms = sqlx::query_as::<_, RoomOverview>(
            r#"
            SELECT r.id, r.name, r.description, m.role,
                   (SELECT COUNT(*) FROM room_members c WHERE c.room_id = r.id) AS member_count,
                   r.created_at
            FROM rooms r
            JOIN room_members m ON m.room_id = r.id
            WHERE m.user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rooms)
    }

    /// Overwrite the editable settings of a room
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        meal_cutoff_hour: i16,
        guest_meal_limit: i16,
    ) -> RepoResult<Room> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET name = $2, description = $3, meal_cutoff_hour = $4,
                guest_meal_limit = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, join_code_enc, join_code_hash,
                      meal_cutoff_hour, guest_meal_limit, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(meal_cutoff_hour)
        .bind(guest_meal_limit)
        .fetch_optional(&self.pool)
        .await?;

        room.ok_or_else(|| RepositoryError::NotFound(format!("Room {} not found", id)))
    }

    pub async fn update_join_code(
        &self,
        id: Uuid,
        join_code_enc: &str,
        join_code_hash: &str,
    ) -> RepoResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE rooms
            SET join_code_enc = $2, join_code_hash = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(join_code_enc)
        .bind(join_code_hash)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("Room {} not found", id)));
        }
        Ok(())
    }

    /// Delete a room; everything it owns cascades
    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}

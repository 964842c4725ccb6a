use crate::error::RepoResult;
use crate::models::{GuestMeal, Meal, MealType, UserCount};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

/// Filter for meal listings
#[derive(Debug, Clone, Default)]
pub struct MealFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
}

/// Repository for members' own meals
pub struct MealRepository {
    pool: PgPool,
}

impl MealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mark a meal as taken; idempotent
    pub async fn insert(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        user_id: Uuid,
        meal_date: NaiveDate,
        meal_type: MealType,
        created_by: Uuid,
    ) -> RepoResult<bool> {
        let rows = sqlx::query(
            r#"
            INSERT INTO meals (room_id, period_id, user_id, meal_date, meal_type, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (period_id, user_id, meal_date, meal_type) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(user_id)
        .bind(meal_date)
        .bind(meal_type.as_str())
        .bind(created_by)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// Unmark a meal of one period; idempotent
    pub async fn delete(
        &self,
        period_id: Uuid,
        user_id: Uuid,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> RepoResult<bool> {
        let rows = sqlx::query(
            r#"
            DELETE FROM meals
            WHERE period_id = $1 AND user_id = $2 AND meal_date = $3 AND meal_type = $4
            "#,
        )
        .bind(period_id)
        .bind(user_id)
        .bind(meal_date)
        .bind(meal_type.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    pub async fn exists(
        &self,
        period_id: Uuid,
        user_id: Uuid,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> RepoResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1
            FROM meals
            WHERE period_id = $1 AND user_id = $2 AND meal_date = $3 AND meal_type = $4
            "#,
        )
        .bind(period_id)
        .bind(user_id)
        .bind(meal_date)
        .bind(meal_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Set or clear many (date, meal type) slots of one member in one period
    pub async fn set_many(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        user_id: Uuid,
        slots: &[(NaiveDate, MealType)],
        on: bool,
        created_by: Uuid,
    ) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for (date, meal_type) in slots {
            let result = if on {
                sqlx::query(
                    r#"
                    INSERT INTO meals (room_id, period_id, user_id, meal_date, meal_type, created_by)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (period_id, user_id, meal_date, meal_type) DO NOTHING
                    "#,
                )
                .bind(room_id)
                .bind(period_id)
                .bind(user_id)
                .bind(date)
                .bind(meal_type.as_str())
                .bind(created_by)
                .execute(&mut *tx)
                .await?
            } else {
                sqlx::query(
                    r#"
                    DELETE FROM meals
                    WHERE period_id = $1 AND user_id = $2 AND meal_date = $3 AND meal_type = $4
                    "#,
                )
                .bind(period_id)
                .bind(user_id)
                .bind(date)
                .bind(meal_type.as_str())
                .execute(&mut *tx)
                .await?
            };
            changed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    pub async fn list(&self, room_id: Uuid, filter: &MealFilter) -> RepoResult<Vec<Meal>> {
        let meals = sqlx::query_as::<_, Meal>(
            r#"
            SELECT id, room_id, period_id, user_id, meal_date, meal_type, created_by, created_at
            FROM meals
            WHERE room_id = $1
              AND ($2::DATE IS NULL OR meal_date >= $2)
              AND ($3::DATE IS NULL OR meal_date <= $3)
              AND ($4::UUID IS NULL OR user_id = $4)
            ORDER BY meal_date, user_id, meal_type
            "#,
        )
        .bind(room_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(meals)
    }

    pub async fn list_for_period(&self, period_id: Uuid) -> RepoResult<Vec<Meal>> {
        let meals = sqlx::query_as::<_, Meal>(
            r#"
            SELECT id, room_id, period_id, user_id, meal_date, meal_type, created_by, created_at
            FROM meals
            WHERE period_id = $1
            ORDER BY meal_date, user_id, meal_type
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(meals)
    }

    /// Meals eaten per member in a period
    pub async fn counts_by_user(&self, period_id: Uuid) -> RepoResult<Vec<UserCount>> {
        let counts = sqlx::query_as::<_, UserCount>(
            r#"
            SELECT m.user_id, u.name, COUNT(*) AS count
            FROM meals m
            JOIN users u ON u.id = m.user_id
            WHERE m.period_id = $1
            GROUP BY m.user_id, u.name
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

/// Repository for guest meals billed to a host member
pub struct GuestMealRepository {
    pool: PgPool,
}

impl GuestMealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        host_user_id: Uuid,
        meal_date: NaiveDate,
        meal_type: MealType,
        count: i32,
        note: Option<&str>,
        created_by: Uuid,
    ) -> RepoResult<GuestMeal> {
        let guest = sqlx::query_as::<_, GuestMeal>(
            r#"
            INSERT INTO guest_meals
                (room_id, period_id, host_user_id, meal_date, meal_type, count, note, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, room_id, period_id, host_user_id, meal_date, meal_type, count, note,
                      created_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(host_user_id)
        .bind(meal_date)
        .bind(meal_type.as_str())
        .bind(count)
        .bind(note)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(guest)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<GuestMeal>> {
        let guest = sqlx::query_as::<_, GuestMeal>(
            r#"
            SELECT id, room_id, period_id, host_user_id, meal_date, meal_type, count, note,
                   created_by, created_at
            FROM guest_meals
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(guest)
    }

    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM guest_meals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn list(&self, room_id: Uuid, filter: &MealFilter) -> RepoResult<Vec<GuestMeal>> {
        let guests = sqlx::query_as::<_, GuestMeal>(
            r#"
            SELECT id, room_id, period_id, host_user_id, meal_date, meal_type, count, note,
                   created_by, created_at
            FROM guest_meals
            WHERE room_id = $1
              AND ($2::DATE IS NULL OR meal_date >= $2)
              AND ($3::DATE IS NULL OR meal_date <= $3)
              AND ($4::UUID IS NULL OR host_user_id = $4)
            ORDER BY meal_date, created_at
            "#,
        )
        .bind(room_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(guests)
    }

    pub async fn list_for_period(&self, period_id: Uuid) -> RepoResult<Vec<GuestMeal>> {
        let guests = sqlx::query_as::<_, GuestMeal>(
            r#"
            SELECT id, room_id, period_id, host_user_id, meal_date, meal_type, count, note,
                   created_by, created_at
            FROM guest_meals
            WHERE period_id = $1
            ORDER BY meal_date, created_at
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(guests)
    }

    /// Guests already booked by one host on one day
    pub async fn total_for_host_on(
        &self,
        room_id: Uuid,
        host_user_id: Uuid,
        meal_date: NaiveDate,
    ) -> RepoResult<i64> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(count), 0)::BIGINT
            FROM guest_meals
            WHERE room_id = $1 AND host_user_id = $2 AND meal_date = $3
            "#,
        )
        .bind(room_id)
        .bind(host_user_id)
        .bind(meal_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Guest meals per host in a period
    pub async fn counts_by_host(&self, period_id: Uuid) -> RepoResult<Vec<UserCount>> {
        let counts = sqlx::query_as::<_, UserCount>(
            r#"
            SELECT g.host_user_id AS user_id, u.name, SUM(g.count)::BIGINT AS count
            FROM guest_meals g
            JOIN users u ON u.id = g.host_user_id
            WHERE g.period_id = $1
            GROUP BY g.host_user_id, u.name
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

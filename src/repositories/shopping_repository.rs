use crate::error::{RepoResult, RepositoryError};
use crate::models::{MarketDate, ShoppingItem};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for groceries bought for the room
pub struct ShoppingRepository {
    pool: PgPool,
}

impl ShoppingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        purchased_by: Uuid,
        purchase_date: NaiveDate,
        description: &str,
        amount: Decimal,
        approved_by: Option<Uuid>,
        created_by: Uuid,
    ) -> RepoResult<ShoppingItem> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            INSERT INTO shopping_items
                (room_id, period_id, purchased_by, purchase_date, description, amount,
                 approved, approved_by, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7::UUID IS NOT NULL, $7, $8)
            RETURNING id, room_id, period_id, purchased_by, purchase_date, description, amount,
                      approved, approved_by, created_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(purchased_by)
        .bind(purchase_date)
        .bind(description)
        .bind(amount)
        .bind(approved_by)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<ShoppingItem>> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            SELECT id, room_id, period_id, purchased_by, purchase_date, description, amount,
                   approved, approved_by, created_by, created_at
            FROM shopping_items
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    pub async fn update(
        &self,
        id: Uuid,
        purchased_by: Uuid,
        purchase_date: NaiveDate,
        description: &str,
        amount: Decimal,
    ) -> RepoResult<ShoppingItem> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            UPDATE shopping_items
            SET purchased_by = $2, purchase_date = $3, description = $4, amount = $5
            WHERE id = $1
            RETURNING id, room_id, period_id, purchased_by, purchase_date, description, amount,
                      approved, approved_by, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(purchased_by)
        .bind(purchase_date)
        .bind(description)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        item.ok_or_else(|| RepositoryError::NotFound("Shopping item not found".to_string()))
    }

    pub async fn approve(&self, id: Uuid, approved_by: Uuid) -> RepoResult<ShoppingItem> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            UPDATE shopping_items
            SET approved = TRUE, approved_by = $2
            WHERE id = $1
            RETURNING id, room_id, period_id, purchased_by, purchase_date, description, amount,
                      approved, approved_by, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(approved_by)
        .fetch_optional(&self.pool)
        .await?;

        item.ok_or_else(|| RepositoryError::NotFound("Shopping item not found".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM shopping_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn list_for_period(&self, period_id: Uuid) -> RepoResult<Vec<ShoppingItem>> {
        let items = sqlx::query_as::<_, ShoppingItem>(
            r#"
            SELECT id, room_id, period_id, purchased_by, purchase_date, description, amount,
                   approved, approved_by, created_by, created_at
            FROM shopping_items
            WHERE period_id = $1
            ORDER BY purchase_date, created_at
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sum of approved purchases; only these count toward the meal rate
    pub async fn total_approved(&self, period_id: Uuid) -> RepoResult<Decimal> {
        let (total,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM shopping_items
            WHERE period_id = $1 AND approved
            "#,
        )
        .bind(period_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

/// Repository for the market (shopping duty) schedule
pub struct MarketDateRepository {
    pool: PgPool,
}

impl MarketDateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        market_date: NaiveDate,
        note: Option<&str>,
    ) -> RepoResult<MarketDate> {
        let date = sqlx::query_as::<_, MarketDate>(
            r#"
            INSERT INTO market_dates (room_id, user_id, market_date, note)
            VALUES ($1, $2, $3, $4)
            RETURNING id, room_id, user_id, market_date, completed, note, created_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(market_date)
        .bind(note)
        .fetch_one(&self.pool)
        .await?;

        Ok(date)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<MarketDate>> {
        let date = sqlx::query_as::<_, MarketDate>(
            r#"
            SELECT id, room_id, user_id, market_date, completed, note, created_at
            FROM market_dates
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(date)
    }

    pub async fn list(
        &self,
        room_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> RepoResult<Vec<MarketDate>> {
        let dates = sqlx::query_as::<_, MarketDate>(
            r#"
            SELECT id, room_id, user_id, market_date, completed, note, created_at
            FROM market_dates
            WHERE room_id = $1
              AND ($2::DATE IS NULL OR market_date >= $2)
              AND ($3::DATE IS NULL OR market_date <= $3)
            ORDER BY market_date, created_at
            "#,
        )
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }

    pub async fn complete(&self, id: Uuid) -> RepoResult<MarketDate> {
        let date = sqlx::query_as::<_, MarketDate>(
            r#"
            UPDATE market_dates
            SET completed = TRUE
            WHERE id = $1
            RETURNING id, room_id, user_id, market_date, completed, note, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        date.ok_or_else(|| RepositoryError::NotFound("Market date not found".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM market_dates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}

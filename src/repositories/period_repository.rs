use crate::error::{RepoResult, RepositoryError};
use crate::models::{MealPeriod, PeriodStatus, TransactionKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for meal periods
pub struct PeriodRepository {
    pool: PgPool,
}

impl PeriodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a new active period, optionally seeding carried-forward balances.
    ///
    /// A second active period in the same room trips the partial unique
    /// index and surfaces as `Duplicate`.
    pub async fn create(
        &self,
        room_id: Uuid,
        name: &str,
        start_date: NaiveDate,
        opening_balance: Decimal,
        created_by: Uuid,
        carried: &[(Uuid, Decimal)],
    ) -> RepoResult<MealPeriod> {
        let mut tx = self.pool.begin().await?;

        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            INSERT INTO meal_periods (room_id, name, start_date, opening_balance, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, room_id, name, start_date, end_date, status, opening_balance,
                      created_by, created_at, ended_at
            "#,
        )
        .bind(room_id)
        .bind(name)
        .bind(start_date)
        .bind(opening_balance)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        for (user_id, balance) in carried.iter().filter(|(_, b)| !b.is_zero()) {
            sqlx::query(
                r#"
                INSERT INTO account_transactions
                    (room_id, period_id, user_id, amount, kind, description, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(room_id)
            .bind(period.id)
            .bind(user_id)
            .bind(balance)
            .bind(TransactionKind::CarryForward.as_str())
            .bind("Balance carried forward")
            .bind(created_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(period)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<MealPeriod>> {
        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            SELECT id, room_id, name, start_date, end_date, status, opening_balance,
                   created_by, created_at, ended_at
            FROM meal_periods
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }

    pub async fn find_active(&self, room_id: Uuid) -> RepoResult<Option<MealPeriod>> {
        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            SELECT id, room_id, name, start_date, end_date, status, opening_balance,
                   created_by, created_at, ended_at
            FROM meal_periods
            WHERE room_id = $1 AND status = 'active'
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }

    /// Most recent ended or locked period, the source of carried balances
    pub async fn find_latest_closed(&self, room_id: Uuid) -> RepoResult<Option<MealPeriod>> {
        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            SELECT id, room_id, name, start_date, end_date, status, opening_balance,
                   created_by, created_at, ended_at
            FROM meal_periods
            WHERE room_id = $1 AND status IN ('ended', 'locked')
            ORDER BY start_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }

    /// Last day covered by any closed period of the room
    pub async fn latest_end_date(&self, room_id: Uuid) -> RepoResult<Option<NaiveDate>> {
        let (end,): (Option<NaiveDate>,) = sqlx::query_as(
            r#"
            SELECT MAX(end_date)
            FROM meal_periods
            WHERE room_id = $1 AND status <> 'active'
            "#,
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(end)
    }

    pub async fn list(&self, room_id: Uuid) -> RepoResult<Vec<MealPeriod>> {
        let periods = sqlx::query_as::<_, MealPeriod>(
            r#"
            SELECT id, room_id, name, start_date, end_date, status, opening_balance,
                   created_by, created_at, ended_at
            FROM meal_periods
            WHERE room_id = $1
            ORDER BY start_date DESC, created_at DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(periods)
    }

    /// Close an active period at `end_date`
    pub async fn end(&self, id: Uuid, end_date: NaiveDate) -> RepoResult<MealPeriod> {
        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            UPDATE meal_periods
            SET status = 'ended', end_date = $2, ended_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING id, room_id, name, start_date, end_date, status, opening_balance,
                      created_by, created_at, ended_at
            "#,
        )
        .bind(id)
        .bind(end_date)
        .fetch_optional(&self.pool)
        .await?;

        period.ok_or_else(|| RepositoryError::BusinessRule("Only an active period can be ended".to_string()))
    }

    /// Move a period from one of `from` to `to`
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[PeriodStatus],
        to: PeriodStatus,
    ) -> RepoResult<MealPeriod> {
        let allowed: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let period = sqlx::query_as::<_, MealPeriod>(
            r#"
            UPDATE meal_periods
            SET status = $3
            WHERE id = $1 AND status = ANY($2)
            RETURNING id, room_id, name, start_date, end_date, status, opening_balance,
                      created_by, created_at, ended_at
            "#,
        )
        .bind(id)
        .bind(&allowed)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        period.ok_or_else(|| {
            RepositoryError::BusinessRule(format!(
                "Period must be {} to become {}",
                allowed.join(" or "),
                to
            ))
        })
    }
}

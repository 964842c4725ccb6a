//! Money moving in and out of a room: member payments, shared extra
//! expenses and the per-member ledger (adjustments, refunds, carry-forwards).

use crate::error::RepoResult;
use crate::models::{
    AccountTransaction, ExpenseCategory, ExtraExpense, Payment, PaymentMethod, TransactionKind,
    UserAmount, UserLedgerTotal,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        note: Option<&str>,
        paid_on: NaiveDate,
        recorded_by: Uuid,
    ) -> RepoResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (room_id, period_id, user_id, amount, method, note, paid_on, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, room_id, period_id, user_id, amount, method, note, paid_on,
                      recorded_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(user_id)
        .bind(amount)
        .bind(method.as_str())
        .bind(note)
        .bind(paid_on)
        .bind(recorded_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, room_id, period_id, user_id, amount, method, note, paid_on,
                   recorded_by, created_at
            FROM payments
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn list(
        &self,
        room_id: Uuid,
        period_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> RepoResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, room_id, period_id, user_id, amount, method, note, paid_on,
                   recorded_by, created_at
            FROM payments
            WHERE room_id = $1
              AND ($2::UUID IS NULL OR period_id = $2)
              AND ($3::UUID IS NULL OR user_id = $3)
            ORDER BY paid_on DESC, created_at DESC
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Amount paid per member in a period
    pub async fn totals_by_user(&self, period_id: Uuid) -> RepoResult<Vec<UserAmount>> {
        let totals = sqlx::query_as::<_, UserAmount>(
            r#"
            SELECT p.user_id, u.name, SUM(p.amount) AS amount
            FROM payments p
            JOIN users u ON u.id = p.user_id
            WHERE p.period_id = $1
            GROUP BY p.user_id, u.name
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}

pub struct ExpenseRepository {
    pool: PgPool,
}

impl ExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        category: ExpenseCategory,
        description: &str,
        amount: Decimal,
        spent_on: NaiveDate,
        recorded_by: Uuid,
    ) -> RepoResult<ExtraExpense> {
        let expense = sqlx::query_as::<_, ExtraExpense>(
            r#"
            INSERT INTO extra_expenses (room_id, period_id, category, description, amount, spent_on, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, room_id, period_id, category, description, amount, spent_on,
                      recorded_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(category.as_str())
        .bind(description)
        .bind(amount)
        .bind(spent_on)
        .bind(recorded_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(expense)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<ExtraExpense>> {
        let expense = sqlx::query_as::<_, ExtraExpense>(
            r#"
            SELECT id, room_id, period_id, category, description, amount, spent_on,
                   recorded_by, created_at
            FROM extra_expenses
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expense)
    }

    pub async fn list(&self, room_id: Uuid, period_id: Option<Uuid>) -> RepoResult<Vec<ExtraExpense>> {
        let expenses = sqlx::query_as::<_, ExtraExpense>(
            r#"
            SELECT id, room_id, period_id, category, description, amount, spent_on,
                   recorded_by, created_at
            FROM extra_expenses
            WHERE room_id = $1
              AND ($2::UUID IS NULL OR period_id = $2)
            ORDER BY spent_on DESC, created_at DESC
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM extra_expenses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn total(&self, period_id: Uuid) -> RepoResult<Decimal> {
        let (total,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM extra_expenses WHERE period_id = $1",
        )
        .bind(period_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a ledger entry; `amount` must already carry its sign
    pub async fn create(
        &self,
        room_id: Uuid,
        period_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: Option<&str>,
        created_by: Uuid,
    ) -> RepoResult<AccountTransaction> {
        let transaction = sqlx::query_as::<_, AccountTransaction>(
            r#"
            INSERT INTO account_transactions
                (room_id, period_id, user_id, amount, kind, description, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, room_id, period_id, user_id, amount, kind, description,
                      created_by, created_at
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(user_id)
        .bind(amount)
        .bind(kind.as_str())
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(transaction)
    }

    pub async fn list(
        &self,
        room_id: Uuid,
        period_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> RepoResult<Vec<AccountTransaction>> {
        let transactions = sqlx::query_as::<_, AccountTransaction>(
            r#"
            SELECT id, room_id, period_id, user_id, amount, kind, description,
                   created_by, created_at
            FROM account_transactions
            WHERE room_id = $1
              AND ($2::UUID IS NULL OR period_id = $2)
              AND ($3::UUID IS NULL OR user_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(room_id)
        .bind(period_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Ledger totals per member and kind in a period
    pub async fn totals_by_user(&self, period_id: Uuid) -> RepoResult<Vec<UserLedgerTotal>> {
        let totals = sqlx::query_as::<_, UserLedgerTotal>(
            r#"
            SELECT t.user_id, u.name, t.kind, SUM(t.amount) AS amount
            FROM account_transactions t
            JOIN users u ON u.id = t.user_id
            WHERE t.period_id = $1
            GROUP BY t.user_id, u.name, t.kind
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}

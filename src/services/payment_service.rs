use crate::accounting::MemberSummary;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccountTransaction, ExpenseCategory, ExtraExpense, MealPeriod, NotificationKind, Payment,
    PaymentMethod, TransactionKind,
};
use crate::permissions::Permission;
use crate::repositories::{ExpenseRepository, PaymentRepository, TransactionRepository};
use crate::services::validation::{nonzero_amount, optional_text, positive_amount, required_text};
use crate::services::{AccessControl, AuditTrailService, NotificationService, PeriodService};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_NOTE_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: Decimal,
    #[serde(default = "default_method")]
    pub method: PaymentMethod,
    pub paid_on: Option<NaiveDate>,
    pub note: Option<String>,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::Cash
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub spent_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub description: Option<String>,
}

/// Member balances of the active period
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheet {
    pub period_id: Option<Uuid>,
    pub period_name: Option<String>,
    pub members: Vec<MemberSummary>,
}

/// Signed amount to store for a manual ledger entry
fn ledger_amount(kind: TransactionKind, amount: Decimal) -> AppResult<Decimal> {
    if kind == TransactionKind::CarryForward {
        return Err(AppError::Validation(
            "Carry-forward entries are created when a period starts".to_string(),
        ));
    }
    let amount = nonzero_amount(amount, "amount")?;
    Ok(kind.signed_amount(amount))
}

/// Money dated outside the period would skew its cash in hand
fn dated_in_period(period: &MealPeriod, date: Option<NaiveDate>, field: &str) -> AppResult<NaiveDate> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    if !period.contains(date) {
        return Err(AppError::Validation(format!(
            "{} {} is outside the active period '{}'",
            field, date, period.name
        )));
    }
    Ok(date)
}

pub struct PaymentService {
    payments: Arc<PaymentRepository>,
    expenses: Arc<ExpenseRepository>,
    transactions: Arc<TransactionRepository>,
    periods: Arc<PeriodService>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditTrailService>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<PaymentRepository>,
        expenses: Arc<ExpenseRepository>,
        transactions: Arc<TransactionRepository>,
        periods: Arc<PeriodService>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            payments,
            expenses,
            transactions,
            periods,
            access,
            notifications,
            audit,
        }
    }

    fn changed(&self, room_id: Uuid) {
        self.periods.invalidate_summaries(room_id);
    }

    // ── Payments ────────────────────────────────────────────────────────────

    pub async fn record_payment(&self, room_id: Uuid, actor_id: Uuid, request: &NewPayment) -> AppResult<Payment> {
        self.access
            .require(room_id, actor_id, Permission::ManagePayments)
            .await?;
        self.access.ensure_member(room_id, request.user_id).await?;
        let amount = positive_amount(request.amount, "amount")?;
        let note = optional_text(request.note.as_deref(), "note", MAX_NOTE_LEN)?;

        let period = self.periods.active_period(room_id).await?;
        let paid_on = dated_in_period(&period, request.paid_on, "paid_on")?;

        let payment = self
            .payments
            .create(
                room_id,
                period.id,
                request.user_id,
                amount,
                request.method,
                note.as_deref(),
                paid_on,
                actor_id,
            )
            .await?;
        self.changed(room_id);

        self.audit
            .record(
                "payment_recorded",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({
                    "payment_id": payment.id,
                    "user_id": payment.user_id,
                    "amount": payment.amount,
                }),
            )
            .await;
        if payment.user_id != actor_id {
            self.notifications
                .notify_quietly(
                    payment.user_id,
                    Some(room_id),
                    NotificationKind::PaymentRecorded,
                    "Payment recorded",
                    &format!("A payment of {} ({}) was recorded for you", payment.amount, payment.method),
                )
                .await;
        }
        info!(
            "Payment {} of {} for {} recorded in room {} by {}",
            payment.id, payment.amount, payment.user_id, room_id, actor_id
        );
        Ok(payment)
    }

    pub async fn list_payments(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        period_id: Option<Uuid>,
        member_id: Option<Uuid>,
    ) -> AppResult<Vec<Payment>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.payments.list(room_id, period_id, member_id).await?)
    }

    pub async fn delete_payment(&self, room_id: Uuid, actor_id: Uuid, payment_id: Uuid) -> AppResult<()> {
        self.access
            .require(room_id, actor_id, Permission::ManagePayments)
            .await?;
        let payment = self
            .payments
            .find_by_id(room_id, payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        self.periods.editable_period(room_id, payment.period_id).await?;

        self.payments.delete(payment_id).await?;
        self.changed(room_id);
        self.audit
            .record(
                "payment_deleted",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({ "payment_id": payment_id, "amount": payment.amount }),
            )
            .await;
        info!("Payment {} deleted by {}", payment_id, actor_id);
        Ok(())
    }

    // ── Extra expenses ──────────────────────────────────────────────────────

    pub async fn record_expense(&self, room_id: Uuid, actor_id: Uuid, request: &NewExpense) -> AppResult<ExtraExpense> {
        self.access
            .require(room_id, actor_id, Permission::ManageExpenses)
            .await?;
        let description = required_text(&request.description, "description", MAX_DESCRIPTION_LEN)?;
        let amount = positive_amount(request.amount, "amount")?;

        let period = self.periods.active_period(room_id).await?;
        let spent_on = dated_in_period(&period, request.spent_on, "spent_on")?;

        let expense = self
            .expenses
            .create(
                room_id,
                period.id,
                request.category,
                &description,
                amount,
                spent_on,
                actor_id,
            )
            .await?;
        self.changed(room_id);

        info!(
            "Expense {} ({} {}) recorded in room {} by {}",
            expense.id, expense.category, expense.amount, room_id, actor_id
        );
        Ok(expense)
    }

    pub async fn list_expenses(&self, room_id: Uuid, user_id: Uuid, period_id: Option<Uuid>) -> AppResult<Vec<ExtraExpense>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.expenses.list(room_id, period_id).await?)
    }

    pub async fn delete_expense(&self, room_id: Uuid, actor_id: Uuid, expense_id: Uuid) -> AppResult<()> {
        self.access
            .require(room_id, actor_id, Permission::ManageExpenses)
            .await?;
        let expense = self
            .expenses
            .find_by_id(room_id, expense_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))?;
        self.periods.editable_period(room_id, expense.period_id).await?;

        self.expenses.delete(expense_id).await?;
        self.changed(room_id);
        info!("Expense {} deleted by {}", expense_id, actor_id);
        Ok(())
    }

    // ── Account transactions ────────────────────────────────────────────────

    pub async fn record_transaction(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        request: &NewTransaction,
    ) -> AppResult<AccountTransaction> {
        self.access
            .require(room_id, actor_id, Permission::ManageTransactions)
            .await?;
        self.access.ensure_member(room_id, request.user_id).await?;
        let amount = ledger_amount(request.kind, request.amount)?;
        let description = optional_text(request.description.as_deref(), "description", MAX_DESCRIPTION_LEN)?;

        let period = self.periods.active_period(room_id).await?;
        let transaction = self
            .transactions
            .create(
                room_id,
                period.id,
                request.user_id,
                amount,
                request.kind,
                description.as_deref(),
                actor_id,
            )
            .await?;
        self.changed(room_id);

        self.audit
            .record(
                "transaction_recorded",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({
                    "transaction_id": transaction.id,
                    "user_id": transaction.user_id,
                    "kind": transaction.kind,
                    "amount": transaction.amount,
                }),
            )
            .await;
        self.notifications
            .notify_quietly(
                transaction.user_id,
                Some(room_id),
                NotificationKind::TransactionRecorded,
                "Account updated",
                &format!("A {} of {} was recorded on your account", transaction.kind, transaction.amount),
            )
            .await;
        info!(
            "Transaction {} ({} {}) for {} recorded in room {} by {}",
            transaction.id, transaction.kind, transaction.amount, transaction.user_id, room_id, actor_id
        );
        Ok(transaction)
    }

    pub async fn list_transactions(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        period_id: Option<Uuid>,
        member_id: Option<Uuid>,
    ) -> AppResult<Vec<AccountTransaction>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.transactions.list(room_id, period_id, member_id).await?)
    }

    /// Member balances of the active period; empty when none is running
    pub async fn balances(&self, room_id: Uuid, user_id: Uuid) -> AppResult<BalanceSheet> {
        self.access
            .require(room_id, user_id, Permission::ViewReports)
            .await?;
        let Some(period) = self.periods.resolve(room_id, None).await? else {
            return Ok(BalanceSheet {
                period_id: None,
                period_name: None,
                members: Vec::new(),
            });
        };
        let summary = self.periods.summary_for(&period).await?;
        Ok(BalanceSheet {
            period_id: Some(period.id),
            period_name: Some(period.name),
            members: summary.members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_refunds_are_stored_negative() {
        assert_eq!(ledger_amount(TransactionKind::Refund, dec("30")).unwrap(), dec("-30"));
        assert_eq!(ledger_amount(TransactionKind::Refund, dec("-30")).unwrap(), dec("-30"));
    }

    #[test]
    fn test_adjustments_keep_their_sign() {
        assert_eq!(ledger_amount(TransactionKind::Adjustment, dec("-12.5")).unwrap(), dec("-12.5"));
        assert_eq!(ledger_amount(TransactionKind::Adjustment, dec("12.5")).unwrap(), dec("12.5"));
    }

    #[test]
    fn test_ledger_rejects_zero_and_manual_carry_forward() {
        assert!(ledger_amount(TransactionKind::Adjustment, Decimal::ZERO).is_err());
        assert!(ledger_amount(TransactionKind::CarryForward, dec("10")).is_err());
    }

    #[test]
    fn test_money_must_be_dated_inside_the_period() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let period = MealPeriod {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            name: "March".into(),
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2025, 3, 31),
            status: "active".into(),
            opening_balance: Decimal::ZERO,
            created_by: Uuid::new_v4(),
            created_at: Utc::now().naive_utc(),
            ended_at: None,
        };

        assert_eq!(dated_in_period(&period, Some(start), "paid_on").unwrap(), start);
        let before = start - chrono::Duration::days(1);
        assert!(matches!(
            dated_in_period(&period, Some(before), "paid_on"),
            Err(AppError::Validation(_))
        ));
        let after = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert!(dated_in_period(&period, Some(after), "spent_on").is_err());
    }

    #[test]
    fn test_payment_method_defaults_to_cash() {
        let payment: NewPayment = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::new_v4(),
            "amount": "150.00",
        }))
        .unwrap();
        assert_eq!(payment.method, PaymentMethod::Cash);
        assert_eq!(payment.amount, dec("150"));
    }
}

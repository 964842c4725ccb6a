//! Billing periods: lifecycle, the editable rule and cached summaries.

use crate::accounting::{PeriodInputs, PeriodSummary};
use crate::cache::{summary_key, summary_prefix, Cache};
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    MealPeriod, MemberDetails, NotificationKind, PeriodStatus, TransactionKind, UserAmount,
    UserCount, UserLedgerTotal,
};
use crate::permissions::Permission;
use crate::repositories::{
    ExpenseRepository, GuestMealRepository, MealRepository, PaymentRepository, PeriodRepository,
    RoomMemberRepository, ShoppingRepository, TransactionRepository,
};
use crate::services::{AccessControl, AuditTrailService, NotificationService};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_PERIOD_NAME_LEN: usize = 80;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPeriod {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub opening_balance: Option<Decimal>,
    #[serde(default)]
    pub carry_forward: bool,
}

/// Repositories the summary reads from
#[derive(Clone)]
pub struct SummarySources {
    pub members: Arc<RoomMemberRepository>,
    pub meals: Arc<MealRepository>,
    pub guest_meals: Arc<GuestMealRepository>,
    pub shopping: Arc<ShoppingRepository>,
    pub payments: Arc<PaymentRepository>,
    pub expenses: Arc<ExpenseRepository>,
    pub transactions: Arc<TransactionRepository>,
}

/// Fold per-user aggregates into calculation inputs
#[allow(clippy::too_many_arguments)]
fn build_inputs(
    period: &MealPeriod,
    total_shopping: Decimal,
    total_extra: Decimal,
    members: &[MemberDetails],
    meals: &[UserCount],
    guests: &[UserCount],
    payments: &[UserAmount],
    ledger: &[UserLedgerTotal],
) -> PeriodInputs {
    let mut inputs = PeriodInputs::new(period.opening_balance, total_shopping, total_extra);
    for m in members {
        inputs.add_member(m.user_id, &m.name);
    }
    for c in meals {
        inputs.add_meals(c.user_id, &c.name, c.count);
    }
    for c in guests {
        inputs.add_guest_meals(c.user_id, &c.name, c.count);
    }
    for p in payments {
        inputs.add_payment(p.user_id, &p.name, p.amount);
    }
    for t in ledger {
        let is_refund = t.kind == TransactionKind::Refund.as_str();
        inputs.add_transaction(t.user_id, &t.name, t.amount, is_refund);
    }
    inputs
}

fn period_name(name: Option<&str>, start_date: NaiveDate) -> AppResult<String> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) if n.chars().count() > MAX_PERIOD_NAME_LEN => Err(AppError::Validation(format!(
            "Period name must be at most {} characters",
            MAX_PERIOD_NAME_LEN
        ))),
        Some(n) => Ok(n.to_string()),
        None => Ok(start_date.format("%B %Y").to_string()),
    }
}

fn validate_end_date(period: &MealPeriod, end_date: NaiveDate) -> AppResult<()> {
    if end_date < period.start_date {
        return Err(AppError::Validation(format!(
            "End date {} is before the period start {}",
            end_date, period.start_date
        )));
    }
    Ok(())
}

/// A new period must begin after the last closed one ends
fn check_start_after(previous_end: Option<NaiveDate>, start_date: NaiveDate) -> AppResult<()> {
    match previous_end {
        Some(end) if start_date <= end => Err(AppError::Validation(format!(
            "A new period must start after {}, when the previous period ended",
            end
        ))),
        _ => Ok(()),
    }
}

pub struct PeriodService {
    periods: Arc<PeriodRepository>,
    sources: SummarySources,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditTrailService>,
    cache: Cache,
}

impl PeriodService {
    pub fn new(
        periods: Arc<PeriodRepository>,
        sources: SummarySources,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditTrailService>,
        cache: Cache,
    ) -> Self {
        Self {
            periods,
            sources,
            access,
            notifications,
            audit,
            cache,
        }
    }

    pub async fn start_period(&self, room_id: Uuid, user_id: Uuid, request: &NewPeriod) -> AppResult<MealPeriod> {
        self.access
            .require(room_id, user_id, Permission::ManagePeriods)
            .await?;

        if let Some(active) = self.periods.find_active(room_id).await? {
            return Err(AppError::Conflict(format!(
                "Period '{}' is still active; end it first",
                active.name
            )));
        }

        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
        check_start_after(self.periods.latest_end_date(room_id).await?, start_date)?;
        let name = period_name(request.name.as_deref(), start_date)?;
        let opening_balance = request.opening_balance.unwrap_or(Decimal::ZERO);
        if opening_balance.is_sign_negative() {
            return Err(AppError::Validation("opening_balance cannot be negative".to_string()));
        }

        let carried = if request.carry_forward {
            self.carried_balances(room_id).await?
        } else {
            Vec::new()
        };

        let period = self
            .periods
            .create(room_id, &name, start_date, opening_balance, user_id, &carried)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::Conflict("Another period is already active".to_string())
                }
                other => other.into(),
            })?;

        info!(
            "Period {} ({}) started in room {} by {}, {} balances carried",
            period.name,
            period.id,
            room_id,
            user_id,
            carried.len()
        );
        self.notifications
            .notify_room(
                room_id,
                Some(user_id),
                NotificationKind::PeriodStarted,
                "New period",
                &format!("Period '{}' started on {}", period.name, period.start_date),
            )
            .await;
        self.notifications
            .websocket()
            .push_room_update(room_id, "period", "started")
            .await;
        Ok(period)
    }

    /// Closing balances of current members from the most recent closed period
    async fn carried_balances(&self, room_id: Uuid) -> AppResult<Vec<(Uuid, Decimal)>> {
        let Some(previous) = self.periods.find_latest_closed(room_id).await? else {
            debug!("No closed period to carry forward from in room {}", room_id);
            return Ok(Vec::new());
        };
        let summary = self.summary_for(&previous).await?;
        let members = self.sources.members.member_ids(room_id).await?;

        Ok(members
            .into_iter()
            .filter_map(|id| summary.balance_of(id).map(|b| (id, b)))
            .filter(|(_, b)| !b.is_zero())
            .collect())
    }

    pub async fn end_period(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        period_id: Uuid,
        end_date: Option<NaiveDate>,
    ) -> AppResult<MealPeriod> {
        self.access
            .require(room_id, user_id, Permission::ManagePeriods)
            .await?;
        let period = self.find(room_id, period_id).await?;
        if !period.is_editable() {
            return Err(AppError::BusinessLogic("Only an active period can be ended".to_string()));
        }
        let end_date = end_date.unwrap_or_else(|| Utc::now().date_naive());
        validate_end_date(&period, end_date)?;

        let ended = self.periods.end(period_id, end_date).await?;
        self.invalidate_summaries(room_id);

        self.audit
            .record(
                "period_ended",
                Some(room_id),
                Some(user_id),
                serde_json::json!({ "period_id": period_id, "end_date": end_date }),
            )
            .await;
        self.notifications
            .notify_room(
                room_id,
                Some(user_id),
                NotificationKind::PeriodEnded,
                "Period ended",
                &format!("Period '{}' ended on {}", ended.name, end_date),
            )
            .await;
        info!("Period {} of room {} ended by {}", period_id, room_id, user_id);
        Ok(ended)
    }

    async fn move_period(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        period_id: Uuid,
        from: &[PeriodStatus],
        to: PeriodStatus,
    ) -> AppResult<MealPeriod> {
        self.access
            .require(room_id, user_id, Permission::ManagePeriods)
            .await?;
        self.find(room_id, period_id).await?;

        let period = self.periods.transition(period_id, from, to).await?;
        self.invalidate_summaries(room_id);

        self.audit
            .record(
                &format!("period_{}", to),
                Some(room_id),
                Some(user_id),
                serde_json::json!({ "period_id": period_id }),
            )
            .await;
        info!("Period {} of room {} is now {}", period_id, room_id, to);
        Ok(period)
    }

    pub async fn lock_period(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        self.move_period(room_id, user_id, period_id, &[PeriodStatus::Ended], PeriodStatus::Locked)
            .await
    }

    pub async fn unlock_period(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        self.move_period(room_id, user_id, period_id, &[PeriodStatus::Locked], PeriodStatus::Ended)
            .await
    }

    pub async fn archive_period(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        self.move_period(
            room_id,
            user_id,
            period_id,
            &[PeriodStatus::Ended, PeriodStatus::Locked],
            PeriodStatus::Archived,
        )
        .await
    }

    pub async fn current_period(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Option<MealPeriod>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.periods.find_active(room_id).await?)
    }

    pub async fn list_periods(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<MealPeriod>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.periods.list(room_id).await?)
    }

    pub async fn get_period(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        self.access.membership(room_id, user_id).await?;
        self.find(room_id, period_id).await
    }

    pub async fn period_summary(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<PeriodSummary> {
        self.access
            .require(room_id, user_id, Permission::ViewReports)
            .await?;
        let period = self.find(room_id, period_id).await?;
        self.summary_for(&period).await
    }

    /// Summary of a period the caller already resolved; cached per period
    pub async fn summary_for(&self, period: &MealPeriod) -> AppResult<PeriodSummary> {
        let key = summary_key(period.room_id, period.id);
        self.cache
            .get_or_load(&key, self.cache.default_ttl(), || self.compute_summary(period))
            .await
    }

    async fn compute_summary(&self, period: &MealPeriod) -> AppResult<PeriodSummary> {
        let s = &self.sources;
        let (members, meals, guests, payments, ledger, shopping, extra) = tokio::try_join!(
            s.members.list_details(period.room_id),
            s.meals.counts_by_user(period.id),
            s.guest_meals.counts_by_host(period.id),
            s.payments.totals_by_user(period.id),
            s.transactions.totals_by_user(period.id),
            s.shopping.total_approved(period.id),
            s.expenses.total(period.id),
        )?;

        let inputs = build_inputs(period, shopping, extra, &members, &meals, &guests, &payments, &ledger);
        debug!(
            "Computed summary of period {} with {} participants",
            period.id,
            inputs.participant_count()
        );
        Ok(PeriodSummary::compute(&inputs))
    }

    async fn find(&self, room_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        self.periods
            .find_by_id(room_id, period_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Period not found".to_string()))
    }

    /// The room's active period; writes are refused without one
    pub async fn active_period(&self, room_id: Uuid) -> AppResult<MealPeriod> {
        self.periods.find_active(room_id).await?.ok_or_else(|| {
            AppError::BusinessLogic("The room has no active period; start one first".to_string())
        })
    }

    /// A period that still accepts writes
    pub async fn editable_period(&self, room_id: Uuid, period_id: Uuid) -> AppResult<MealPeriod> {
        let period = self.find(room_id, period_id).await?;
        if !period.is_editable() {
            return Err(AppError::BusinessLogic(format!(
                "Period '{}' is {} and read-only",
                period.name, period.status
            )));
        }
        Ok(period)
    }

    /// Resolve an optional period filter, defaulting to the active period
    pub async fn resolve(&self, room_id: Uuid, period_id: Option<Uuid>) -> AppResult<Option<MealPeriod>> {
        match period_id {
            Some(id) => self.find(room_id, id).await.map(Some),
            None => Ok(self.periods.find_active(room_id).await?),
        }
    }

    /// Drop cached summaries after any write touching money or meals
    pub fn invalidate_summaries(&self, room_id: Uuid) {
        self.cache.invalidate_prefix(&summary_prefix(room_id));
    }
}

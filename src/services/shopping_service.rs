use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{MarketDate, NotificationKind, RoomMember, ShoppingItem};
use crate::permissions::Permission;
use crate::repositories::{MarketDateRepository, ShoppingRepository};
use crate::services::validation::{optional_text, positive_amount, required_text};
use crate::services::{AccessControl, NotificationService, PeriodService};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_DESCRIPTION_LEN: usize = 200;
const MAX_NOTE_LEN: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct NewShoppingItem {
    pub purchased_by: Option<Uuid>,
    pub purchase_date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShoppingItemChanges {
    pub purchased_by: Option<Uuid>,
    pub purchase_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMarketDate {
    pub user_id: Uuid,
    pub market_date: NaiveDate,
    pub note: Option<String>,
}

/// Creators may edit their own item until it is approved
fn can_modify_item(item: &ShoppingItem, member: &RoomMember) -> bool {
    member.role_enum().has(Permission::ManageShopping) || (item.created_by == member.user_id && !item.approved)
}

pub struct ShoppingService {
    items: Arc<ShoppingRepository>,
    market_dates: Arc<MarketDateRepository>,
    periods: Arc<PeriodService>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
}

impl ShoppingService {
    pub fn new(
        items: Arc<ShoppingRepository>,
        market_dates: Arc<MarketDateRepository>,
        periods: Arc<PeriodService>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            items,
            market_dates,
            periods,
            access,
            notifications,
        }
    }

    async fn find_item(&self, room_id: Uuid, item_id: Uuid) -> AppResult<ShoppingItem> {
        self.items
            .find_by_id(room_id, item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shopping item not found".to_string()))
    }

    fn changed(&self, room_id: Uuid) {
        self.periods.invalidate_summaries(room_id);
    }

    pub async fn add_item(&self, room_id: Uuid, actor_id: Uuid, request: &NewShoppingItem) -> AppResult<ShoppingItem> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let purchased_by = request.purchased_by.unwrap_or(actor_id);
        if purchased_by != actor_id {
            self.access.ensure_member(room_id, purchased_by).await?;
        }
        let description = required_text(&request.description, "description", MAX_DESCRIPTION_LEN)?;
        let amount = positive_amount(request.amount, "amount")?;

        let period = self.periods.active_period(room_id).await?;
        let purchase_date = request.purchase_date.unwrap_or_else(|| Utc::now().date_naive());
        if !period.contains(purchase_date) {
            return Err(AppError::Validation(format!(
                "{} is outside the active period '{}'",
                purchase_date, period.name
            )));
        }

        let approved_by = actor
            .role_enum()
            .has(Permission::ApproveShopping)
            .then_some(actor_id);
        let item = self
            .items
            .create(
                room_id,
                period.id,
                purchased_by,
                purchase_date,
                &description,
                amount,
                approved_by,
                actor_id,
            )
            .await?;
        if item.approved {
            self.changed(room_id);
        }

        info!(
            "Shopping item {} ({}) added to room {} by {}, approved={}",
            item.id, item.amount, room_id, actor_id, item.approved
        );
        self.notifications
            .websocket()
            .push_room_update(room_id, "shopping", "created")
            .await;
        Ok(item)
    }

    pub async fn list_items(&self, room_id: Uuid, user_id: Uuid, period_id: Option<Uuid>) -> AppResult<Vec<ShoppingItem>> {
        self.access.membership(room_id, user_id).await?;
        match self.periods.resolve(room_id, period_id).await? {
            Some(period) => Ok(self.items.list_for_period(period.id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn approve_item(&self, room_id: Uuid, actor_id: Uuid, item_id: Uuid) -> AppResult<ShoppingItem> {
        self.access
            .require(room_id, actor_id, Permission::ApproveShopping)
            .await?;
        let item = self.find_item(room_id, item_id).await?;
        if item.approved {
            return Ok(item);
        }
        self.periods.editable_period(room_id, item.period_id).await?;

        let approved = self.items.approve(item_id, actor_id).await?;
        self.changed(room_id);

        info!("Shopping item {} approved by {}", item_id, actor_id);
        if approved.purchased_by != actor_id {
            self.notifications
                .notify_quietly(
                    approved.purchased_by,
                    Some(room_id),
                    NotificationKind::ShoppingApproved,
                    "Purchase approved",
                    &format!("'{}' ({}) was approved", approved.description, approved.amount),
                )
                .await;
        }
        Ok(approved)
    }

    pub async fn update_item(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        item_id: Uuid,
        changes: &ShoppingItemChanges,
    ) -> AppResult<ShoppingItem> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let item = self.find_item(room_id, item_id).await?;
        if !can_modify_item(&item, &actor) {
            return Err(AppError::Forbidden(
                "Only the creator (before approval) or a shopping manager can edit this item".to_string(),
            ));
        }
        let period = self.periods.editable_period(room_id, item.period_id).await?;

        let purchased_by = changes.purchased_by.unwrap_or(item.purchased_by);
        if purchased_by != item.purchased_by {
            self.access.ensure_member(room_id, purchased_by).await?;
        }
        let purchase_date = changes.purchase_date.unwrap_or(item.purchase_date);
        if !period.contains(purchase_date) {
            return Err(AppError::Validation(format!(
                "{} is outside the period '{}'",
                purchase_date, period.name
            )));
        }
        let description = match &changes.description {
            Some(d) => required_text(d, "description", MAX_DESCRIPTION_LEN)?,
            None => item.description.clone(),
        };
        let amount = match changes.amount {
            Some(a) => positive_amount(a, "amount")?,
            None => item.amount,
        };

        let updated = self
            .items
            .update(item_id, purchased_by, purchase_date, &description, amount)
            .await?;
        if updated.approved {
            self.changed(room_id);
        }
        info!("Shopping item {} updated by {}", item_id, actor_id);
        Ok(updated)
    }

    pub async fn delete_item(&self, room_id: Uuid, actor_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let item = self.find_item(room_id, item_id).await?;
        if !can_modify_item(&item, &actor) {
            return Err(AppError::Forbidden(
                "Only the creator (before approval) or a shopping manager can delete this item".to_string(),
            ));
        }
        self.periods.editable_period(room_id, item.period_id).await?;

        self.items.delete(item_id).await?;
        if item.approved {
            self.changed(room_id);
        }
        info!("Shopping item {} deleted by {}", item_id, actor_id);
        Ok(())
    }

    // ── Market schedule ─────────────────────────────────────────────────────

    pub async fn schedule_market_date(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        request: &NewMarketDate,
    ) -> AppResult<MarketDate> {
        self.access
            .require(room_id, actor_id, Permission::ManageMarketSchedule)
            .await?;
        self.access.ensure_member(room_id, request.user_id).await?;
        let note = optional_text(request.note.as_deref(), "note", MAX_NOTE_LEN)?;

        let date = self
            .market_dates
            .create(room_id, request.user_id, request.market_date, note.as_deref())
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => AppError::Conflict(
                    "This member is already scheduled for that date".to_string(),
                ),
                other => other.into(),
            })?;

        info!(
            "Market date {} scheduled for {} in room {}",
            date.market_date, date.user_id, room_id
        );
        self.notifications
            .notify_quietly(
                date.user_id,
                Some(room_id),
                NotificationKind::MarketReminder,
                "Market duty",
                &format!("You are scheduled to do the shopping on {}", date.market_date),
            )
            .await;
        Ok(date)
    }

    pub async fn list_market_dates(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<MarketDate>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.market_dates.list(room_id, from, to).await?)
    }

    pub async fn complete_market_date(&self, room_id: Uuid, actor_id: Uuid, date_id: Uuid) -> AppResult<MarketDate> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let date = self
            .market_dates
            .find_by_id(room_id, date_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Market date not found".to_string()))?;
        if date.user_id != actor_id && !actor.role_enum().has(Permission::ManageMarketSchedule) {
            return Err(AppError::Forbidden(
                "Only the assignee or a market manager can complete this date".to_string(),
            ));
        }

        let completed = self.market_dates.complete(date_id).await?;
        info!("Market date {} completed by {}", date_id, actor_id);
        Ok(completed)
    }

    pub async fn delete_market_date(&self, room_id: Uuid, actor_id: Uuid, date_id: Uuid) -> AppResult<()> {
        self.access
            .require(room_id, actor_id, Permission::ManageMarketSchedule)
            .await?;
        if self.market_dates.find_by_id(room_id, date_id).await?.is_none() {
            return Err(AppError::NotFound("Market date not found".to_string()));
        }
        self.market_dates.delete(date_id).await?;
        info!("Market date {} deleted by {}", date_id, actor_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: Uuid, role: &str) -> RoomMember {
        RoomMember {
            room_id: Uuid::new_v4(),
            user_id,
            role: role.into(),
            joined_at: Utc::now().naive_utc(),
        }
    }

    fn item(created_by: Uuid, approved: bool) -> ShoppingItem {
        ShoppingItem {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            period_id: Uuid::new_v4(),
            purchased_by: created_by,
            purchase_date: Utc::now().date_naive(),
            description: "Rice".into(),
            amount: Decimal::new(4500, 2),
            approved,
            approved_by: None,
            created_by,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_creator_edits_until_approved() {
        let me = Uuid::new_v4();
        assert!(can_modify_item(&item(me, false), &member(me, "member")));
        assert!(!can_modify_item(&item(me, true), &member(me, "member")));
    }

    #[test]
    fn test_others_need_manage_shopping() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(!can_modify_item(&item(other, false), &member(me, "accountant")));
        assert!(can_modify_item(&item(other, true), &member(me, "market_manager")));
        assert!(can_modify_item(&item(other, true), &member(me, "manager")));
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    pub enum NotificationKind {
        Invitation => "invitation",
        MemberJoined => "member_joined",
        RoleChanged => "role_changed",
        MemberRemoved => "member_removed",
        MealUpdated => "meal_updated",
        PaymentRecorded => "payment_recorded",
        TransactionRecorded => "transaction_recorded",
        ShoppingApproved => "shopping_approved",
        MarketReminder => "market_reminder",
        PeriodStarted => "period_started",
        PeriodEnded => "period_ended",
        VoteCreated => "vote_created",
        VoteClosed => "vote_closed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

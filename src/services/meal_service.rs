use crate::error::{AppError, AppResult};
use crate::models::{GuestMeal, Meal, MealPeriod, MealType, Room, UserCount};
use crate::permissions::Permission;
use crate::repositories::{GuestMealRepository, MealFilter, MealRepository, RoomRepository};
use crate::services::{AccessControl, PeriodService};
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Longest span `set_meals_range` accepts, in days
pub const MAX_RANGE_DAYS: i64 = 62;

/// State of one meal slot after a change
#[derive(Debug, Clone, Serialize)]
pub struct MealState {
    pub user_id: Uuid,
    pub meal_date: NaiveDate,
    pub meal_type: MealType,
    pub on: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeResult {
    pub user_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub on: bool,
    pub changed: u64,
}

/// Own and hosted meals of one member in a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealCount {
    pub user_id: Uuid,
    pub name: String,
    pub meals: i64,
    pub guest_meals: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGuestMeal {
    pub host_user_id: Option<Uuid>,
    pub meal_date: NaiveDate,
    pub meal_type: MealType,
    pub count: i32,
    pub note: Option<String>,
}

/// Whether a member may still change their own meal on `date`.
///
/// Future days are always open; today closes at `cutoff_hour` (UTC).
pub fn can_self_serve(now: NaiveDateTime, date: NaiveDate, cutoff_hour: i16) -> bool {
    let today = now.date();
    if date > today {
        return true;
    }
    date == today && i64::from(now.hour()) < i64::from(cutoff_hour)
}

/// Who may change which meal, and when
fn check_meal_edit(
    actor_id: Uuid,
    target_id: Uuid,
    can_manage: bool,
    now: NaiveDateTime,
    date: NaiveDate,
    cutoff_hour: i16,
) -> AppResult<()> {
    if can_manage {
        return Ok(());
    }
    if actor_id != target_id {
        return Err(AppError::Forbidden(
            "Only meal managers can change meals of other members".to_string(),
        ));
    }
    if !can_self_serve(now, date, cutoff_hour) {
        return Err(AppError::BusinessLogic(format!(
            "Meals for {} can no longer be changed (cutoff {:02}:00 UTC)",
            date, cutoff_hour
        )));
    }
    Ok(())
}

fn check_in_period(period: &MealPeriod, date: NaiveDate) -> AppResult<()> {
    if !period.contains(date) {
        return Err(AppError::Validation(format!(
            "{} is outside the active period '{}'",
            date, period.name
        )));
    }
    Ok(())
}

/// Every day from `from` to `to` inclusive, bounded by [`MAX_RANGE_DAYS`]
fn range_days(from: NaiveDate, to: NaiveDate) -> AppResult<Vec<NaiveDate>> {
    if to < from {
        return Err(AppError::Validation("'to' must not be before 'from'".to_string()));
    }
    let span = (to - from).num_days() + 1;
    if span > MAX_RANGE_DAYS {
        return Err(AppError::Validation(format!(
            "A range covers at most {} days",
            MAX_RANGE_DAYS
        )));
    }
    Ok(from.iter_days().take(span as usize).collect())
}

/// Merge own and hosted meal counts into one line per member
fn merge_counts(meals: Vec<UserCount>, guests: Vec<UserCount>) -> Vec<MealCount> {
    let mut merged: BTreeMap<Uuid, MealCount> = BTreeMap::new();
    for c in meals {
        let entry = merged.entry(c.user_id).or_insert_with(|| MealCount {
            user_id: c.user_id,
            name: c.name.clone(),
            meals: 0,
            guest_meals: 0,
            total: 0,
        });
        entry.meals += c.count;
        entry.total += c.count;
    }
    for c in guests {
        let entry = merged.entry(c.user_id).or_insert_with(|| MealCount {
            user_id: c.user_id,
            name: c.name.clone(),
            meals: 0,
            guest_meals: 0,
            total: 0,
        });
        entry.guest_meals += c.count;
        entry.total += c.count;
    }
    let mut counts: Vec<MealCount> = merged.into_values().collect();
    counts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    counts
}

pub struct MealService {
    meals: Arc<MealRepository>,
    guests: Arc<GuestMealRepository>,
    rooms: Arc<RoomRepository>,
    periods: Arc<PeriodService>,
    access: Arc<AccessControl>,
}

impl MealService {
    pub fn new(
        meals: Arc<MealRepository>,
        guests: Arc<GuestMealRepository>,
        rooms: Arc<RoomRepository>,
        periods: Arc<PeriodService>,
        access: Arc<AccessControl>,
    ) -> Self {
        Self {
            meals,
            guests,
            rooms,
            periods,
            access,
        }
    }

    async fn room(&self, room_id: Uuid) -> AppResult<Room> {
        self.rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
    }

    /// Run every check for `actor` changing `target`'s meals on `dates`
    async fn authorize(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        dates: &[NaiveDate],
    ) -> AppResult<(Room, MealPeriod)> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let can_manage = actor.role_enum().has(Permission::ManageMeals);
        if target_id != actor_id {
            self.access.ensure_member(room_id, target_id).await?;
        }

        let room = self.room(room_id).await?;
        let period = self.periods.active_period(room_id).await?;
        let now = Utc::now().naive_utc();
        for date in dates {
            check_in_period(&period, *date)?;
            check_meal_edit(actor_id, target_id, can_manage, now, *date, room.meal_cutoff_hour)?;
        }
        Ok((room, period))
    }

    fn changed(&self, room_id: Uuid) {
        self.periods.invalidate_summaries(room_id);
    }

    pub async fn set_meal(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        date: NaiveDate,
        meal_type: MealType,
        on: bool,
    ) -> AppResult<MealState> {
        let (_, period) = self.authorize(room_id, actor_id, target_id, &[date]).await?;
        self.write_meal(&period, actor_id, target_id, date, meal_type, on)
            .await
    }

    pub async fn toggle_meal(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        date: NaiveDate,
        meal_type: MealType,
    ) -> AppResult<MealState> {
        let (_, period) = self.authorize(room_id, actor_id, target_id, &[date]).await?;
        let currently_on = self.meals.exists(period.id, target_id, date, meal_type).await?;
        self.write_meal(&period, actor_id, target_id, date, meal_type, !currently_on)
            .await
    }

    /// Persist one slot of an authorized change in `period`
    async fn write_meal(
        &self,
        period: &MealPeriod,
        actor_id: Uuid,
        target_id: Uuid,
        date: NaiveDate,
        meal_type: MealType,
        on: bool,
    ) -> AppResult<MealState> {
        let room_id = period.room_id;
        let changed = if on {
            self.meals
                .insert(room_id, period.id, target_id, date, meal_type, actor_id)
                .await?
        } else {
            self.meals.delete(period.id, target_id, date, meal_type).await?
        };
        if changed {
            self.changed(room_id);
            info!(
                "Meal {} on {} for {} in room {} set {} by {}",
                meal_type,
                date,
                target_id,
                room_id,
                if on { "on" } else { "off" },
                actor_id
            );
        }

        Ok(MealState {
            user_id: target_id,
            meal_date: date,
            meal_type,
            on,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_meals_range(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        meal_types: &[MealType],
        on: bool,
    ) -> AppResult<RangeResult> {
        if meal_types.is_empty() {
            return Err(AppError::Validation("Choose at least one meal type".to_string()));
        }
        let days = range_days(from, to)?;
        let (_, period) = self.authorize(room_id, actor_id, target_id, &days).await?;

        let slots: Vec<(NaiveDate, MealType)> = days
            .iter()
            .flat_map(|d| meal_types.iter().map(move |t| (*d, *t)))
            .collect();
        let changed = self
            .meals
            .set_many(room_id, period.id, target_id, &slots, on, actor_id)
            .await?;
        if changed > 0 {
            self.changed(room_id);
        }

        info!(
            "{} meal slots of {} in room {} changed by {} ({}..={})",
            changed, target_id, room_id, actor_id, from, to
        );
        Ok(RangeResult {
            user_id: target_id,
            from,
            to,
            on,
            changed,
        })
    }

    pub async fn list_meals(&self, room_id: Uuid, user_id: Uuid, filter: &MealFilter) -> AppResult<Vec<Meal>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.meals.list(room_id, filter).await?)
    }

    /// Per-member meal counts of a period (the active one by default)
    pub async fn meal_counts(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        period_id: Option<Uuid>,
    ) -> AppResult<Vec<MealCount>> {
        self.access.membership(room_id, user_id).await?;
        let Some(period) = self.periods.resolve(room_id, period_id).await? else {
            return Ok(Vec::new());
        };
        let (meals, guests) = tokio::try_join!(
            self.meals.counts_by_user(period.id),
            self.guests.counts_by_host(period.id),
        )?;
        Ok(merge_counts(meals, guests))
    }

    pub async fn add_guest_meal(&self, room_id: Uuid, actor_id: Uuid, request: &NewGuestMeal) -> AppResult<GuestMeal> {
        let host_id = request.host_user_id.unwrap_or(actor_id);
        if request.count < 1 {
            return Err(AppError::Validation("Guest count must be at least 1".to_string()));
        }

        let (room, period) = self
            .authorize(room_id, actor_id, host_id, &[request.meal_date])
            .await?;

        let booked = self
            .guests
            .total_for_host_on(room_id, host_id, request.meal_date)
            .await?;
        let limit = i64::from(room.guest_meal_limit);
        if booked + i64::from(request.count) > limit {
            return Err(AppError::BusinessLogic(format!(
                "Guest meal limit is {} per member per day ({} already booked)",
                limit, booked
            )));
        }

        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let guest = self
            .guests
            .create(
                room_id,
                period.id,
                host_id,
                request.meal_date,
                request.meal_type,
                request.count,
                note,
                actor_id,
            )
            .await?;
        self.changed(room_id);

        info!(
            "{} guest meals added for host {} in room {} on {}",
            guest.count, host_id, room_id, guest.meal_date
        );
        Ok(guest)
    }

    pub async fn list_guest_meals(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        filter: &MealFilter,
    ) -> AppResult<Vec<GuestMeal>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.guests.list(room_id, filter).await?)
    }

    pub async fn delete_guest_meal(&self, room_id: Uuid, user_id: Uuid, guest_id: Uuid) -> AppResult<()> {
        let member = self.access.membership(room_id, user_id).await?;
        let guest = self
            .guests
            .find_by_id(room_id, guest_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Guest meal not found".to_string()))?;

        if guest.created_by != user_id && !member.role_enum().has(Permission::ManageMeals) {
            return Err(AppError::Forbidden(
                "Only the creator or a meal manager can delete this guest meal".to_string(),
            ));
        }
        self.periods.editable_period(room_id, guest.period_id).await?;

        self.guests.delete(guest_id).await?;
        self.changed(room_id);
        info!("Guest meal {} deleted from room {} by {}", guest_id, room_id, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, hour: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_self_service_cutoff() {
        let cutoff = 10;
        // before the cutoff today
        assert!(can_self_serve(at("2025-03-10", 9), day("2025-03-10"), cutoff));
        // at or after the cutoff hour
        assert!(!can_self_serve(at("2025-03-10", 10), day("2025-03-10"), cutoff));
        assert!(!can_self_serve(at("2025-03-10", 23), day("2025-03-10"), cutoff));
        // tomorrow is always open
        assert!(can_self_serve(at("2025-03-10", 23), day("2025-03-11"), cutoff));
        // the past is closed
        assert!(!can_self_serve(at("2025-03-10", 0), day("2025-03-09"), cutoff));
    }

    #[test]
    fn test_zero_cutoff_closes_today() {
        assert!(!can_self_serve(at("2025-03-10", 0), day("2025-03-10"), 0));
    }

    #[test]
    fn test_meal_edit_rules() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = at("2025-03-10", 12);

        assert!(check_meal_edit(me, me, false, now, day("2025-03-11"), 10).is_ok());
        assert!(matches!(
            check_meal_edit(me, other, false, now, day("2025-03-11"), 10),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_meal_edit(me, me, false, now, day("2025-03-10"), 10),
            Err(AppError::BusinessLogic(_))
        ));
        // managers bypass the cutoff and may act for others
        assert!(check_meal_edit(me, other, true, now, day("2025-03-01"), 10).is_ok());
    }

    #[test]
    fn test_range_days() {
        let days = range_days(day("2025-03-30"), day("2025-04-02")).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], day("2025-03-30"));
        assert_eq!(days[3], day("2025-04-02"));

        assert_eq!(range_days(day("2025-03-01"), day("2025-03-01")).unwrap().len(), 1);
        assert!(range_days(day("2025-03-02"), day("2025-03-01")).is_err());
        assert_eq!(range_days(day("2025-01-01"), day("2025-03-03")).unwrap().len(), 62);
        assert!(range_days(day("2025-01-01"), day("2025-03-04")).is_err());
    }

    #[test]
    fn test_merge_counts() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let counts = merge_counts(
            vec![
                UserCount { user_id: b, name: "bea".into(), count: 4 },
                UserCount { user_id: a, name: "Arun".into(), count: 6 },
            ],
            vec![UserCount { user_id: b, name: "bea".into(), count: 2 }],
        );
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].name, "Arun");
        assert_eq!(counts[0].total, 6);
        assert_eq!(counts[1].meals, 4);
        assert_eq!(counts[1].guest_meals, 2);
        assert_eq!(counts[1].total, 6);
    }
}

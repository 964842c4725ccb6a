//! Period export to `.xlsx` and bulk import of meals and payments.

use crate::error::{AppError, AppResult};
use crate::excel::{
    export_workbook, parse_workbook, MealRow, PaymentRow, PeriodExport, RowError, MEALS_SHEET,
    PAYMENTS_SHEET,
};
use crate::models::{MealPeriod, MealType, MemberDetails};
use crate::permissions::Permission;
use crate::repositories::RoomRepository;
use crate::services::period_service::SummarySources;
use crate::services::validation::{optional_text, positive_amount};
use crate::services::{AccessControl, AuditTrailService, NotificationService, PeriodService};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_NOTE_LEN: usize = 500;

/// A rendered workbook ready to download
#[derive(Debug, Clone)]
pub struct ExportedWorkbook {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub period_id: Uuid,
    pub meal_rows: usize,
    pub meals_added: u64,
    pub meals_removed: u64,
    pub payments_recorded: usize,
    pub errors: Vec<RowError>,
}

/// Meal slots to switch on and off for one member
#[derive(Debug, Default, PartialEq)]
struct MealPlan {
    on: Vec<(NaiveDate, MealType)>,
    off: Vec<(NaiveDate, MealType)>,
}

fn file_name(room_name: &str, period_name: &str) -> String {
    let clean: String = format!("{}-{}", room_name, period_name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}.xlsx", clean)
}

fn email_index(members: &[MemberDetails]) -> HashMap<String, Uuid> {
    members
        .iter()
        .map(|m| (m.email.to_lowercase(), m.user_id))
        .collect()
}

/// Resolve a row's member and check its date against the target period
fn row_member(
    sheet: &str,
    row: usize,
    email: &str,
    date: NaiveDate,
    emails: &HashMap<String, Uuid>,
    period: &MealPeriod,
) -> Result<Uuid, RowError> {
    let user_id = emails
        .get(email)
        .copied()
        .ok_or_else(|| RowError::new(sheet, row, format!("No member with email {}", email)))?;
    if !period.contains(date) {
        return Err(RowError::new(
            sheet,
            row,
            format!("{} is outside the period '{}'", date, period.name),
        ));
    }
    Ok(user_id)
}

/// Group meal rows into per-member on/off slot lists
fn plan_meals(
    rows: &[MealRow],
    emails: &HashMap<String, Uuid>,
    period: &MealPeriod,
    errors: &mut Vec<RowError>,
) -> BTreeMap<Uuid, MealPlan> {
    let mut plans: BTreeMap<Uuid, MealPlan> = BTreeMap::new();
    for row in rows {
        let user_id = match row_member(MEALS_SHEET, row.row, &row.email, row.date, emails, period) {
            Ok(id) => id,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let (on, off) = row.split();
        let plan = plans.entry(user_id).or_default();
        plan.on.extend(on.into_iter().map(|t| (row.date, t)));
        plan.off.extend(off.into_iter().map(|t| (row.date, t)));
    }
    plans
}

pub struct ExcelService {
    rooms: Arc<RoomRepository>,
    sources: SummarySources,
    periods: Arc<PeriodService>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditTrailService>,
}

impl ExcelService {
    pub fn new(
        rooms: Arc<RoomRepository>,
        sources: SummarySources,
        periods: Arc<PeriodService>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            rooms,
            sources,
            periods,
            access,
            notifications,
            audit,
        }
    }

    pub async fn export_period(&self, room_id: Uuid, user_id: Uuid, period_id: Uuid) -> AppResult<ExportedWorkbook> {
        self.access
            .require(room_id, user_id, Permission::ExportData)
            .await?;
        let period = self.periods.get_period(room_id, user_id, period_id).await?;
        let room = self
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let s = &self.sources;
        let (members, meals, guest_meals, shopping, payments, expenses, transactions) = tokio::try_join!(
            s.members.list_details(room_id),
            s.meals.list_for_period(period.id),
            s.guest_meals.list_for_period(period.id),
            s.shopping.list_for_period(period.id),
            s.payments.list(room_id, Some(period.id), None),
            s.expenses.list(room_id, Some(period.id)),
            s.transactions.list(room_id, Some(period.id), None),
        )?;
        let summary = self.periods.summary_for(&period).await?;

        let name = file_name(&room.name, &period.name);
        let export = PeriodExport {
            room_name: room.name,
            period,
            summary,
            members,
            meals,
            guest_meals,
            shopping,
            payments,
            expenses,
            transactions,
        };
        let bytes = tokio::task::spawn_blocking(move || export_workbook(&export))
            .await
            .map_err(|e| AppError::Excel(format!("Export task failed: {}", e)))??;

        info!(
            "Exported period {} of room {} for {} ({} bytes)",
            period_id,
            room_id,
            user_id,
            bytes.len()
        );
        Ok(ExportedWorkbook {
            file_name: name,
            bytes,
        })
    }

    pub async fn import_workbook(&self, room_id: Uuid, actor_id: Uuid, bytes: Vec<u8>) -> AppResult<ImportReport> {
        self.access
            .require(room_id, actor_id, Permission::ImportData)
            .await?;
        let period = self.periods.active_period(room_id).await?;

        let parsed = tokio::task::spawn_blocking(move || parse_workbook(&bytes))
            .await
            .map_err(|e| AppError::Excel(format!("Import task failed: {}", e)))??;

        let members = self.sources.members.list_details(room_id).await?;
        let emails = email_index(&members);
        let mut report = ImportReport {
            period_id: period.id,
            meal_rows: parsed.meals.len(),
            errors: parsed.errors,
            ..Default::default()
        };

        let plans = plan_meals(&parsed.meals, &emails, &period, &mut report.errors);
        for (user_id, plan) in &plans {
            if !plan.on.is_empty() {
                report.meals_added += self
                    .sources
                    .meals
                    .set_many(room_id, period.id, *user_id, &plan.on, true, actor_id)
                    .await?;
            }
            if !plan.off.is_empty() {
                report.meals_removed += self
                    .sources
                    .meals
                    .set_many(room_id, period.id, *user_id, &plan.off, false, actor_id)
                    .await?;
            }
        }

        for row in &parsed.payments {
            match self.import_payment(room_id, actor_id, row, &emails, &period).await {
                Ok(()) => report.payments_recorded += 1,
                Err(e) => report.errors.push(e),
            }
        }
        report.errors.sort_by(|a, b| (&a.sheet, a.row).cmp(&(&b.sheet, b.row)));

        self.periods.invalidate_summaries(room_id);
        self.audit
            .record(
                "import_performed",
                Some(room_id),
                Some(actor_id),
                serde_json::json!({
                    "period_id": period.id,
                    "meals_added": report.meals_added,
                    "meals_removed": report.meals_removed,
                    "payments_recorded": report.payments_recorded,
                    "errors": report.errors.len(),
                }),
            )
            .await;
        self.notifications
            .websocket()
            .push_room_update(room_id, "import", "completed")
            .await;

        if !report.errors.is_empty() {
            warn!(
                "Import into room {} skipped {} row(s)",
                room_id,
                report.errors.len()
            );
        }
        info!(
            "Import into room {} by {}: +{} / -{} meals, {} payments",
            room_id, actor_id, report.meals_added, report.meals_removed, report.payments_recorded
        );
        Ok(report)
    }

    /// Record one imported payment; failures become row errors
    async fn import_payment(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        row: &PaymentRow,
        emails: &HashMap<String, Uuid>,
        period: &MealPeriod,
    ) -> Result<(), RowError> {
        let row_error = |e: AppError| RowError::new(PAYMENTS_SHEET, row.row, e.to_string());

        let user_id = row_member(PAYMENTS_SHEET, row.row, &row.email, row.date, emails, period)?;
        let amount = positive_amount(row.amount, "amount").map_err(row_error)?;
        let note = optional_text(row.note.as_deref(), "note", MAX_NOTE_LEN).map_err(row_error)?;

        self.sources
            .payments
            .create(
                room_id,
                period.id,
                user_id,
                amount,
                row.method,
                note.as_deref(),
                row.date,
                actor_id,
            )
            .await
            .map_err(|e| row_error(e.into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn period() -> MealPeriod {
        MealPeriod {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            name: "March 2025".into(),
            start_date: day("2025-03-01"),
            end_date: Some(day("2025-03-31")),
            status: "active".into(),
            opening_balance: Default::default(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now().naive_utc(),
            ended_at: None,
        }
    }

    fn meal_row(row: usize, date: &str, email: &str, flags: (bool, bool, bool)) -> MealRow {
        MealRow {
            row,
            date: day(date),
            email: email.into(),
            breakfast: flags.0,
            lunch: flags.1,
            dinner: flags.2,
        }
    }

    #[test]
    fn test_file_name_is_safe() {
        assert_eq!(file_name("Flat 4/B", "March 2025"), "Flat_4_B-March_2025.xlsx");
    }

    #[test]
    fn test_plan_groups_rows_by_member() {
        let asha = Uuid::new_v4();
        let emails = HashMap::from([("asha@example.com".to_string(), asha)]);
        let rows = vec![
            meal_row(2, "2025-03-02", "asha@example.com", (true, false, true)),
            meal_row(3, "2025-03-03", "asha@example.com", (false, true, false)),
            meal_row(4, "2025-03-03", "ghost@example.com", (true, true, true)),
            meal_row(5, "2025-04-01", "asha@example.com", (true, true, true)),
        ];
        let mut errors = Vec::new();

        let plans = plan_meals(&rows, &emails, &period(), &mut errors);

        let plan = &plans[&asha];
        assert_eq!(
            plan.on,
            vec![
                (day("2025-03-02"), MealType::Breakfast),
                (day("2025-03-02"), MealType::Dinner),
                (day("2025-03-03"), MealType::Lunch),
            ]
        );
        assert_eq!(plan.off.len(), 3);
        assert_eq!(errors.iter().map(|e| e.row).collect::<Vec<_>>(), vec![4, 5]);
        assert!(errors[0].message.contains("ghost@example.com"));
        assert!(errors[1].message.contains("outside"));
    }
}

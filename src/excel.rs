//! Workbook export and import parsing.
//!
//! Both directions are pure: export turns already-loaded period data into
//! `.xlsx` bytes, and [`parse_workbook`] turns uploaded bytes into typed rows
//! plus per-row errors. Database work lives in the excel service.

use crate::accounting::PeriodSummary;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccountTransaction, ExtraExpense, GuestMeal, Meal, MealPeriod, MealType, MemberDetails,
    Payment, PaymentMethod, ShoppingItem,
};
use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use uuid::Uuid;

pub const SUMMARY_SHEET: &str = "Summary";
pub const MEALS_SHEET: &str = "Meals";
pub const SHOPPING_SHEET: &str = "Shopping";
pub const PAYMENTS_SHEET: &str = "Payments";
pub const EXPENSES_SHEET: &str = "Expenses";
pub const TRANSACTIONS_SHEET: &str = "Transactions";

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// ZIP archive magic bytes (every .xlsx starts with them)
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Day zero of Excel's 1900 date system (serial 1 = 1900-01-01, leap bug included)
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

fn xlsx_error(e: XlsxError) -> AppError {
    AppError::Excel(format!("Failed to write workbook: {}", e))
}

// ── Export ──────────────────────────────────────────────────────────────────

/// Everything that goes into a period export
#[derive(Debug, Clone)]
pub struct PeriodExport {
    pub room_name: String,
    pub period: MealPeriod,
    pub summary: PeriodSummary,
    pub members: Vec<MemberDetails>,
    pub meals: Vec<Meal>,
    pub guest_meals: Vec<GuestMeal>,
    pub shopping: Vec<ShoppingItem>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<ExtraExpense>,
    pub transactions: Vec<AccountTransaction>,
}

/// One member's meals on one day
#[derive(Debug, Default, Clone, PartialEq)]
struct MealLine {
    breakfast: bool,
    lunch: bool,
    dinner: bool,
    guests: i64,
}

fn money(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

struct People {
    names: HashMap<Uuid, String>,
    emails: HashMap<Uuid, String>,
}

impl People {
    fn new(export: &PeriodExport) -> Self {
        let mut names: HashMap<Uuid, String> = export
            .summary
            .members
            .iter()
            .map(|m| (m.user_id, m.name.clone()))
            .collect();
        let mut emails = HashMap::new();
        for m in &export.members {
            names.insert(m.user_id, m.name.clone());
            emails.insert(m.user_id, m.email.clone());
        }
        Self { names, emails }
    }

    fn name(&self, id: Uuid) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn email(&self, id: Uuid) -> &str {
        self.emails.get(&id).map(String::as_str).unwrap_or("")
    }
}

fn header(sheet: &mut Worksheet, titles: &[&str], bold: &Format) -> Result<(), XlsxError> {
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, bold)?;
        sheet.set_column_width(col as u16, 16)?;
    }
    Ok(())
}

fn write_summary(sheet: &mut Worksheet, export: &PeriodExport, bold: &Format) -> Result<(), XlsxError> {
    let s = &export.summary;
    let period = &export.period;
    sheet.set_name(SUMMARY_SHEET)?;
    sheet.set_column_width(0, 22)?;

    let facts: [(&str, String); 4] = [
        ("Room", export.room_name.clone()),
        ("Period", period.name.clone()),
        ("Start date", period.start_date.to_string()),
        (
            "End date",
            period.end_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
    ];
    let mut row = 0u32;
    for (label, value) in facts {
        sheet.write_string_with_format(row, 0, label, bold)?;
        sheet.write_string(row, 1, value)?;
        row += 1;
    }

    let totals = [
        ("Opening balance", money(s.opening_balance)),
        ("Total meals", s.total_meals as f64),
        ("Total shopping", money(s.total_shopping)),
        ("Meal rate", money(s.meal_rate)),
        ("Total extra", money(s.total_extra)),
        ("Extra share", money(s.extra_share)),
        ("Total paid", money(s.total_paid)),
        ("Total adjustments", money(s.total_adjustments)),
        ("Cash in hand", money(s.cash_in_hand)),
    ];
    for (label, value) in totals {
        sheet.write_string_with_format(row, 0, label, bold)?;
        sheet.write_number(row, 1, value)?;
        row += 1;
    }

    row += 1;
    let titles = [
        "Member", "Meals", "Guest meals", "Meal cost", "Extra share", "Paid", "Adjustments",
        "Balance",
    ];
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *title, bold)?;
    }
    for m in &s.members {
        row += 1;
        sheet.write_string(row, 0, &m.name)?;
        sheet.write_number(row, 1, m.meals as f64)?;
        sheet.write_number(row, 2, m.guest_meals as f64)?;
        sheet.write_number(row, 3, money(m.meal_cost))?;
        sheet.write_number(row, 4, money(m.extra_share))?;
        sheet.write_number(row, 5, money(m.paid))?;
        sheet.write_number(row, 6, money(m.adjustments))?;
        sheet.write_number(row, 7, money(m.balance))?;
    }
    Ok(())
}

/// Meals grid: one row per (date, member) with B/L/D flags and guest count
fn meal_lines(meals: &[Meal], guests: &[GuestMeal]) -> BTreeMap<(NaiveDate, Uuid), MealLine> {
    let mut lines: BTreeMap<(NaiveDate, Uuid), MealLine> = BTreeMap::new();
    for meal in meals {
        let line = lines.entry((meal.meal_date, meal.user_id)).or_default();
        match meal.meal_type_enum() {
            Some(MealType::Breakfast) => line.breakfast = true,
            Some(MealType::Lunch) => line.lunch = true,
            Some(MealType::Dinner) => line.dinner = true,
            None => {}
        }
    }
    for guest in guests {
        lines
            .entry((guest.meal_date, guest.host_user_id))
            .or_default()
            .guests += i64::from(guest.count);
    }
    lines
}

fn write_meals(sheet: &mut Worksheet, export: &PeriodExport, people: &People, bold: &Format) -> Result<(), XlsxError> {
    sheet.set_name(MEALS_SHEET)?;
    header(
        sheet,
        &["Date", "Email", "Member", "Breakfast", "Lunch", "Dinner", "Guests"],
        bold,
    )?;
    let flag = |on: bool| if on { 1.0 } else { 0.0 };
    for (i, ((date, user_id), line)) in meal_lines(&export.meals, &export.guest_meals).iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, date.to_string())?;
        sheet.write_string(row, 1, people.email(*user_id))?;
        sheet.write_string(row, 2, people.name(*user_id))?;
        sheet.write_number(row, 3, flag(line.breakfast))?;
        sheet.write_number(row, 4, flag(line.lunch))?;
        sheet.write_number(row, 5, flag(line.dinner))?;
        sheet.write_number(row, 6, line.guests as f64)?;
    }
    Ok(())
}

fn write_shopping(sheet: &mut Worksheet, export: &PeriodExport, people: &People, bold: &Format) -> Result<(), XlsxError> {
    sheet.set_name(SHOPPING_SHEET)?;
    header(sheet, &["Date", "Purchased by", "Description", "Amount", "Approved"], bold)?;
    for (i, item) in export.shopping.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, item.purchase_date.to_string())?;
        sheet.write_string(row, 1, people.name(item.purchased_by))?;
        sheet.write_string(row, 2, &item.description)?;
        sheet.write_number(row, 3, money(item.amount))?;
        sheet.write_string(row, 4, if item.approved { "yes" } else { "no" })?;
    }
    Ok(())
}

fn write_payments(sheet: &mut Worksheet, export: &PeriodExport, people: &People, bold: &Format) -> Result<(), XlsxError> {
    sheet.set_name(PAYMENTS_SHEET)?;
    header(sheet, &["Date", "Email", "Member", "Amount", "Method", "Note"], bold)?;
    for (i, p) in export.payments.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, p.paid_on.to_string())?;
        sheet.write_string(row, 1, people.email(p.user_id))?;
        sheet.write_string(row, 2, people.name(p.user_id))?;
        sheet.write_number(row, 3, money(p.amount))?;
        sheet.write_string(row, 4, &p.method)?;
        sheet.write_string(row, 5, p.note.as_deref().unwrap_or(""))?;
    }
    Ok(())
}

fn write_expenses(sheet: &mut Worksheet, export: &PeriodExport, bold: &Format) -> Result<(), XlsxError> {
    sheet.set_name(EXPENSES_SHEET)?;
    header(sheet, &["Date", "Category", "Description", "Amount"], bold)?;
    for (i, e) in export.expenses.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, e.spent_on.to_string())?;
        sheet.write_string(row, 1, &e.category)?;
        sheet.write_string(row, 2, &e.description)?;
        sheet.write_number(row, 3, money(e.amount))?;
    }
    Ok(())
}

fn write_transactions(sheet: &mut Worksheet, export: &PeriodExport, people: &People, bold: &Format) -> Result<(), XlsxError> {
    sheet.set_name(TRANSACTIONS_SHEET)?;
    header(sheet, &["Recorded", "Member", "Kind", "Amount", "Description"], bold)?;
    for (i, t) in export.transactions.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, t.created_at.format("%Y-%m-%d %H:%M").to_string())?;
        sheet.write_string(row, 1, people.name(t.user_id))?;
        sheet.write_string(row, 2, &t.kind)?;
        sheet.write_number(row, 3, money(t.amount))?;
        sheet.write_string(row, 4, t.description.as_deref().unwrap_or(""))?;
    }
    Ok(())
}

/// Render a period as an `.xlsx` workbook
pub fn export_workbook(export: &PeriodExport) -> AppResult<Vec<u8>> {
    let people = People::new(export);
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();

    write_summary(workbook.add_worksheet(), export, &bold).map_err(xlsx_error)?;
    write_meals(workbook.add_worksheet(), export, &people, &bold).map_err(xlsx_error)?;
    write_shopping(workbook.add_worksheet(), export, &people, &bold).map_err(xlsx_error)?;
    write_payments(workbook.add_worksheet(), export, &people, &bold).map_err(xlsx_error)?;
    write_expenses(workbook.add_worksheet(), export, &bold).map_err(xlsx_error)?;
    write_transactions(workbook.add_worksheet(), export, &people, &bold).map_err(xlsx_error)?;

    workbook.save_to_buffer().map_err(xlsx_error)
}

// ── Import ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealRow {
    pub row: usize,
    pub date: NaiveDate,
    pub email: String,
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
}

impl MealRow {
    /// Meal types marked and unmarked on this row
    pub fn split(&self) -> (Vec<MealType>, Vec<MealType>) {
        let flags = [
            (MealType::Breakfast, self.breakfast),
            (MealType::Lunch, self.lunch),
            (MealType::Dinner, self.dinner),
        ];
        let on = flags.iter().filter(|(_, f)| *f).map(|(t, _)| *t).collect();
        let off = flags.iter().filter(|(_, f)| !*f).map(|(t, _)| *t).collect();
        (on, off)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub row: usize,
    pub date: NaiveDate,
    pub email: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub sheet: String,
    /// 1-based spreadsheet row number
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(sheet: &str, row: usize, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.to_string(),
            row,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedWorkbook {
    pub meals: Vec<MealRow>,
    pub payments: Vec<PaymentRow>,
    pub errors: Vec<RowError>,
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    }
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    excel_epoch()?.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// ISO text (optionally with a time part) or an Excel serial number
pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => serial_to_date(dt.as_f64()),
        Data::Float(f) => serial_to_date(*f),
        Data::Int(i) => serial_to_date(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            let date_part = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
        }
        _ => None,
    }
}

/// 1, yes, true, x (any case) mark a meal as taken
pub fn cell_truthy(cell: &Data) -> bool {
    match cell {
        Data::Bool(b) => *b,
        Data::Int(i) => *i == 1,
        Data::Float(f) => *f == 1.0,
        Data::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "yes" | "y" | "true" | "x"
        ),
        _ => false,
    }
}

fn cell_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::Float(f) => Decimal::try_from(*f).ok().map(|d| d.round_dp(2)),
        Data::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(|c| cell_text(c).is_empty())
}

/// Column positions by lower-cased header name
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_header(row: &[Data]) -> Self {
        Self(
            row.iter()
                .enumerate()
                .map(|(i, c)| (cell_text(c).to_lowercase(), i))
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        )
    }

    fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.0.contains_key(*name))
            .collect()
    }

    fn get<'r>(&self, row: &'r [Data], name: &str) -> Option<&'r Data> {
        self.0.get(name).and_then(|i| row.get(*i))
    }
}

/// Split a sheet into (header columns, numbered data rows), reporting missing columns
fn sheet_rows<'r>(
    sheet: &str,
    range: &'r Range<Data>,
    required: &[&str],
    errors: &mut Vec<RowError>,
) -> Option<(Columns, Vec<(usize, &'r [Data])>)> {
    let mut rows = range.rows();
    let columns = Columns::from_header(rows.next()?);
    let missing = columns.missing(required);
    if !missing.is_empty() {
        errors.push(RowError::new(
            sheet,
            1,
            format!("Missing column(s): {}", missing.join(", ")),
        ));
        return None;
    }
    let data = rows
        .enumerate()
        .map(|(i, r)| (i + 2, r))
        .filter(|(_, r)| !is_blank_row(r))
        .collect();
    Some((columns, data))
}

fn parse_meals(range: &Range<Data>, parsed: &mut ParsedWorkbook) {
    let Some((cols, rows)) = sheet_rows(
        MEALS_SHEET,
        range,
        &["date", "email", "breakfast", "lunch", "dinner"],
        &mut parsed.errors,
    ) else {
        return;
    };

    for (n, row) in rows {
        let Some(date) = cols.get(row, "date").and_then(cell_date) else {
            parsed.errors.push(RowError::new(MEALS_SHEET, n, "Invalid or missing date"));
            continue;
        };
        let email = cols.get(row, "email").map(cell_text).unwrap_or_default().to_lowercase();
        if email.is_empty() {
            parsed.errors.push(RowError::new(MEALS_SHEET, n, "Missing email"));
            continue;
        }
        let flag = |name: &str| cols.get(row, name).is_some_and(cell_truthy);
        parsed.meals.push(MealRow {
            row: n,
            date,
            email,
            breakfast: flag("breakfast"),
            lunch: flag("lunch"),
            dinner: flag("dinner"),
        });
    }
}

fn parse_payments(range: &Range<Data>, parsed: &mut ParsedWorkbook) {
    let Some((cols, rows)) = sheet_rows(
        PAYMENTS_SHEET,
        range,
        &["date", "email", "amount"],
        &mut parsed.errors,
    ) else {
        return;
    };

    for (n, row) in rows {
        let Some(date) = cols.get(row, "date").and_then(cell_date) else {
            parsed.errors.push(RowError::new(PAYMENTS_SHEET, n, "Invalid or missing date"));
            continue;
        };
        let email = cols.get(row, "email").map(cell_text).unwrap_or_default().to_lowercase();
        if email.is_empty() {
            parsed.errors.push(RowError::new(PAYMENTS_SHEET, n, "Missing email"));
            continue;
        }
        let amount = match cols.get(row, "amount").and_then(cell_decimal) {
            Some(a) if a > Decimal::ZERO => a,
            _ => {
                parsed
                    .errors
                    .push(RowError::new(PAYMENTS_SHEET, n, "Amount must be a positive number"));
                continue;
            }
        };
        let method_text = cols.get(row, "method").map(cell_text).unwrap_or_default();
        let method = if method_text.is_empty() {
            PaymentMethod::Cash
        } else {
            match method_text.parse::<PaymentMethod>() {
                Ok(m) => m,
                Err(_) => {
                    parsed.errors.push(RowError::new(
                        PAYMENTS_SHEET,
                        n,
                        format!("Unknown payment method '{}'", method_text),
                    ));
                    continue;
                }
            }
        };
        let note = cols
            .get(row, "note")
            .map(cell_text)
            .filter(|s| !s.is_empty());

        parsed.payments.push(PaymentRow {
            row: n,
            date,
            email,
            amount,
            method,
            note,
        });
    }
}

/// Read the Meals and Payments sheets of an uploaded workbook
pub fn parse_workbook(bytes: &[u8]) -> AppResult<ParsedWorkbook> {
    if bytes.len() < ZIP_MAGIC.len() || bytes[..ZIP_MAGIC.len()] != ZIP_MAGIC {
        return Err(AppError::Excel("Upload is not an .xlsx workbook".to_string()));
    }
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| AppError::Excel(format!("Failed to open workbook: {}", e)))?;

    let names = workbook.sheet_names();
    let find = |wanted: &str| names.iter().find(|n| n.eq_ignore_ascii_case(wanted)).cloned();
    let meals_sheet = find(MEALS_SHEET);
    let payments_sheet = find(PAYMENTS_SHEET);
    if meals_sheet.is_none() && payments_sheet.is_none() {
        return Err(AppError::Excel(format!(
            "Workbook needs a '{}' or '{}' sheet",
            MEALS_SHEET, PAYMENTS_SHEET
        )));
    }

    let mut parsed = ParsedWorkbook::default();
    if let Some(name) = meals_sheet {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AppError::Excel(format!("Failed to read sheet '{}': {}", name, e)))?;
        parse_meals(&range, &mut parsed);
    }
    if let Some(name) = payments_sheet {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AppError::Excel(format!("Failed to read sheet '{}': {}", name, e)))?;
        parse_payments(&range, &mut parsed);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{PeriodInputs, PeriodSummary};
    use chrono::Utc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn upload(build: impl FnOnce(&mut Workbook)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        build(&mut workbook);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_date(45_658.0), Some(day("2025-01-01")));
        assert_eq!(serial_to_date(45_658.75), Some(day("2025-01-01")));
        assert_eq!(serial_to_date(0.0), None);
        assert_eq!(cell_date(&Data::String("2025-03-04".into())), Some(day("2025-03-04")));
        assert_eq!(cell_date(&Data::String("2025-03-04T08:00:00".into())), Some(day("2025-03-04")));
        assert_eq!(cell_date(&Data::String("yesterday".into())), None);
    }

    #[test]
    fn test_truthy_values() {
        for v in ["1", "yes", "YES", "true", "x", " X "] {
            assert!(cell_truthy(&Data::String(v.into())), "{v}");
        }
        assert!(cell_truthy(&Data::Float(1.0)));
        assert!(cell_truthy(&Data::Bool(true)));
        assert!(!cell_truthy(&Data::Float(0.0)));
        assert!(!cell_truthy(&Data::String("no".into())));
        assert!(!cell_truthy(&Data::Empty));
    }

    #[test]
    fn test_parse_reports_bad_rows_without_failing() {
        let bytes = upload(|wb| {
            let meals = wb.add_worksheet();
            meals.set_name("Meals").unwrap();
            for (col, title) in ["Date", "Email", "Breakfast", "Lunch", "Dinner"].iter().enumerate() {
                meals.write_string(0, col as u16, *title).unwrap();
            }
            meals.write_string(1, 0, "2025-03-01").unwrap();
            meals.write_string(1, 1, "Asha@Example.com").unwrap();
            meals.write_number(1, 2, 1.0).unwrap();
            meals.write_string(1, 3, "x").unwrap();
            meals.write_string(1, 4, "no").unwrap();
            // serial date, dinner only
            meals.write_number(2, 0, 45_717.0).unwrap();
            meals.write_string(2, 1, "ben@example.com").unwrap();
            meals.write_string(2, 4, "yes").unwrap();
            // bad date
            meals.write_string(3, 0, "soon").unwrap();
            meals.write_string(3, 1, "ben@example.com").unwrap();

            let payments = wb.add_worksheet();
            payments.set_name("Payments").unwrap();
            for (col, title) in ["Date", "Email", "Amount", "Method", "Note"].iter().enumerate() {
                payments.write_string(0, col as u16, *title).unwrap();
            }
            payments.write_string(1, 0, "2025-03-02").unwrap();
            payments.write_string(1, 1, "asha@example.com").unwrap();
            payments.write_number(1, 2, 500.0).unwrap();
            payments.write_string(1, 3, "bank").unwrap();
            payments.write_string(2, 0, "2025-03-02").unwrap();
            payments.write_string(2, 1, "ben@example.com").unwrap();
            payments.write_number(2, 2, -5.0).unwrap();
            payments.write_string(3, 0, "2025-03-03").unwrap();
            payments.write_string(3, 1, "ben@example.com").unwrap();
            payments.write_string(3, 2, "120.50").unwrap();
            payments.write_string(3, 3, "cheque").unwrap();
        });

        let parsed = parse_workbook(&bytes).unwrap();

        assert_eq!(parsed.meals.len(), 2);
        assert_eq!(parsed.meals[0].email, "asha@example.com");
        assert!(parsed.meals[0].breakfast && parsed.meals[0].lunch && !parsed.meals[0].dinner);
        assert_eq!(parsed.meals[1].date, day("2025-03-01"));
        assert_eq!(parsed.meals[1].row, 3);
        assert_eq!(
            parsed.meals[1].split(),
            (vec![MealType::Dinner], vec![MealType::Breakfast, MealType::Lunch])
        );

        assert_eq!(parsed.payments.len(), 1);
        assert_eq!(parsed.payments[0].amount, Decimal::from(500));
        assert_eq!(parsed.payments[0].method, PaymentMethod::Bank);

        let rows: Vec<(&str, usize)> = parsed.errors.iter().map(|e| (e.sheet.as_str(), e.row)).collect();
        assert_eq!(rows, vec![("Meals", 4), ("Payments", 3), ("Payments", 4)]);
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let bytes = upload(|wb| {
            let meals = wb.add_worksheet();
            meals.set_name("Meals").unwrap();
            meals.write_string(0, 0, "Date").unwrap();
            meals.write_string(0, 1, "Email").unwrap();
        });
        let parsed = parse_workbook(&bytes).unwrap();
        assert!(parsed.meals.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].message.contains("breakfast"));
    }

    #[test]
    fn test_rejects_non_workbooks() {
        assert!(matches!(parse_workbook(b"date,email\n"), Err(AppError::Excel(_))));

        let bytes = upload(|wb| {
            wb.add_worksheet().set_name("Notes").unwrap();
        });
        assert!(matches!(parse_workbook(&bytes), Err(AppError::Excel(_))));
    }

    #[test]
    fn test_export_has_every_sheet_and_reimports() {
        let room = Uuid::new_v4();
        let asha = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let period = MealPeriod {
            id: Uuid::new_v4(),
            room_id: room,
            name: "March 2025".into(),
            start_date: day("2025-03-01"),
            end_date: None,
            status: "active".into(),
            opening_balance: Decimal::ZERO,
            created_by: asha,
            created_at: now,
            ended_at: None,
        };
        let mut inputs = PeriodInputs::new(Decimal::ZERO, Decimal::from(100), Decimal::ZERO);
        inputs.add_meals(asha, "Asha", 2);
        let meal = |t: &str| Meal {
            id: Uuid::new_v4(),
            room_id: room,
            period_id: period.id,
            user_id: asha,
            meal_date: day("2025-03-02"),
            meal_type: t.into(),
            created_by: asha,
            created_at: now,
        };
        let export = PeriodExport {
            room_name: "Flat 4".into(),
            summary: PeriodSummary::compute(&inputs),
            members: vec![MemberDetails {
                user_id: asha,
                name: "Asha".into(),
                email: "asha@example.com".into(),
                role: "admin".into(),
                joined_at: now,
            }],
            meals: vec![meal("breakfast"), meal("dinner")],
            guest_meals: Vec::new(),
            shopping: Vec::new(),
            payments: Vec::new(),
            expenses: Vec::new(),
            transactions: Vec::new(),
            period,
        };

        let bytes = export_workbook(&export).unwrap();
        let workbook = Xlsx::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Summary", "Meals", "Shopping", "Payments", "Expenses", "Transactions"]
        );

        let parsed = parse_workbook(&bytes).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.meals,
            vec![MealRow {
                row: 2,
                date: day("2025-03-02"),
                email: "asha@example.com".into(),
                breakfast: true,
                lunch: false,
                dinner: true,
            }]
        );
    }
}

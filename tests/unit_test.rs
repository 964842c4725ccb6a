mod helpers;

use chrono::Utc;
use messmate_backend::accounting::{PeriodInputs, PeriodSummary};
use messmate_backend::crypto::{self, SecretBox};
use messmate_backend::database::create_lazy_pool;
use messmate_backend::error::AppError;
use messmate_backend::models::{Role, VoteBallot};
use messmate_backend::permissions::Permission;
use messmate_backend::services::vote_service::tally;
use messmate_backend::AppState;
use rust_decimal::Decimal;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Unit tests for period accounting
#[test]
fn test_summary_splits_shopping_by_meals() {
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let mut inputs = PeriodInputs::new(dec("100"), dec("1000"), dec("90"));
    inputs
        .add_meals(a, "Asha", 30)
        .add_meals(b, "Bilal", 20)
        .add_guest_meals(b, "Bilal", 5)
        .add_member(c, "Chen")
        .add_payment(a, "Asha", dec("700"))
        .add_payment(b, "Bilal", dec("400"));

    let summary = PeriodSummary::compute(&inputs);

    assert_eq!(summary.total_meals, 55);
    // 1000 / 55 = 18.1818...
    assert_eq!(summary.meal_rate, dec("18.1818"));
    assert_eq!(summary.extra_share, dec("30"));
    assert_eq!(summary.members.len(), 3);
    assert_eq!(summary.members[0].name, "Asha");

    let asha = &summary.members[0];
    assert_eq!(asha.meal_cost, dec("545.45"));
    assert_eq!(asha.balance, dec("124.55"));

    let chen = &summary.members[2];
    assert_eq!(chen.total_meals, 0);
    assert_eq!(chen.balance, dec("-30"));

    // opening + paid - shopping - extra
    assert_eq!(summary.cash_in_hand, dec("110"));
}

#[test]
fn test_summary_refunds_leave_the_fund() {
    let a = Uuid::new_v4();
    let mut inputs = PeriodInputs::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    inputs
        .add_payment(a, "Asha", dec("200"))
        .add_transaction(a, "Asha", dec("-50"), true)
        .add_transaction(a, "Asha", dec("10"), false);

    let summary = PeriodSummary::compute(&inputs);

    assert_eq!(summary.total_adjustments, dec("-40"));
    assert_eq!(summary.cash_in_hand, dec("150"));
    assert_eq!(summary.balance_of(a), Some(dec("160")));
}

#[test]
fn test_empty_period_has_zero_rate() {
    let summary = PeriodSummary::compute(&PeriodInputs::new(dec("25"), dec("0"), dec("0")));
    assert_eq!(summary.meal_rate, Decimal::ZERO);
    assert_eq!(summary.extra_share, Decimal::ZERO);
    assert_eq!(summary.cash_in_hand, dec("25"));
    assert!(summary.members.is_empty());
}

/// Unit tests for roles
#[test]
fn test_role_ladder() {
    assert!(Role::Admin.has(Permission::DeleteRoom));
    assert!(!Role::Manager.has(Permission::DeleteRoom));
    assert!(Role::Manager.has(Permission::ImportData));
    assert!(Role::MarketManager.has(Permission::ApproveShopping));
    assert!(!Role::MealManager.has(Permission::ManagePayments));
    assert!(!Role::Member.has(Permission::ExportData));

    for role in Role::ALL {
        assert!(role.has(Permission::ViewReports), "{} cannot view reports", role);
        assert!(Role::Admin.rank() >= role.rank());
    }
    assert!(!Role::Manager.can_assign(Role::Manager));
    assert!(Role::Manager.can_assign(Role::Accountant));
}

/// Unit tests for votes
#[test]
fn test_tally_winner_and_tie() {
    let options = vec!["Rice".to_string(), "Pasta".to_string()];
    let ballot = |choice: &str| VoteBallot {
        vote_id: Uuid::nil(),
        user_id: Uuid::new_v4(),
        choice: choice.to_string(),
        cast_at: Utc::now().naive_utc(),
    };

    let t = tally(&options, &[ballot("Rice"), ballot("Rice"), ballot("Pasta")]);
    assert_eq!(t.total, 3);
    assert_eq!(t.winner.as_deref(), Some("Rice"));

    let t = tally(&options, &[ballot("Rice"), ballot("Pasta")]);
    assert_eq!(t.winner, None);

    let t = tally(&options, &[]);
    assert_eq!(t.total, 0);
    assert_eq!(t.winner, None);
}

/// Unit tests for secrets
#[test]
fn test_join_code_sealing() {
    let key = [7u8; 32];
    let secrets = SecretBox::new(&key);
    let code = crypto::generate_join_code().unwrap();

    let sealed = secrets.seal(&code).unwrap();
    assert_ne!(sealed, code);
    assert_eq!(secrets.open(&sealed).unwrap(), code);

    let other = SecretBox::new(&[8u8; 32]);
    assert!(other.open(&sealed).is_err());

    let typed = code.to_lowercase();
    assert_eq!(crypto::normalize_join_code(&typed), code);
    assert_eq!(
        crypto::hash_token(&crypto::normalize_join_code(&typed)),
        crypto::hash_token(&code)
    );
}

/// Unit tests for configuration
#[tokio::test]
async fn test_state_rejects_rate_limit_below_one_token() {
    let mut config = helpers::test_config();
    config.rate_limit.capacity = 0.5;
    let pool = create_lazy_pool(&config.database).unwrap();

    let result = AppState::new(pool, config);
    assert!(matches!(result, Err(AppError::Config(_))));
}

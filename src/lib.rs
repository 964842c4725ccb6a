//! Messmate Backend Library
//!
//! Exposes the backend components to the binary and to integration tests.

pub mod accounting;
pub mod auth;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod excel;
pub mod models;
pub mod permissions;
pub mod rate_limit;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use cache::Cache;
use crypto::SecretBox;
use database::Database;
use rate_limit::RateLimiter;
use repositories::*;
use services::*;
use std::sync::Arc;
use websocket::WebSocketServer;

/// Application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub cache: Cache,
    pub rate_limiter: Arc<RateLimiter>,
    pub ws_server: Arc<WebSocketServer>,
    pub auth: Arc<AuthService>,
    pub rooms: Arc<RoomService>,
    pub invitations: Arc<InvitationService>,
    pub periods: Arc<PeriodService>,
    pub meals: Arc<MealService>,
    pub shopping: Arc<ShoppingService>,
    pub payments: Arc<PaymentService>,
    pub votes: Arc<VoteService>,
    pub notifications: Arc<NotificationService>,
    pub excel: Arc<ExcelService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: sqlx::PgPool, config: AppConfig) -> AppResult<Self> {
        config.rate_limit.validate().map_err(AppError::Config)?;
        let database = Database::new(pool.clone());
        let cache = Cache::new(&config.cache);

        let users = Arc::new(UserRepository::new(pool.clone()));
        let sessions = Arc::new(SessionRepository::new(pool.clone()));
        let rooms = Arc::new(RoomRepository::new(pool.clone()));
        let members = Arc::new(RoomMemberRepository::new(pool.clone()));
        let invitations = Arc::new(InvitationRepository::new(pool.clone()));
        let periods = Arc::new(PeriodRepository::new(pool.clone()));
        let votes = Arc::new(VoteRepository::new(pool.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(pool.clone()));
        let sources = SummarySources {
            members: members.clone(),
            meals: Arc::new(MealRepository::new(pool.clone())),
            guest_meals: Arc::new(GuestMealRepository::new(pool.clone())),
            shopping: Arc::new(ShoppingRepository::new(pool.clone())),
            payments: Arc::new(PaymentRepository::new(pool.clone())),
            expenses: Arc::new(ExpenseRepository::new(pool.clone())),
            transactions: Arc::new(TransactionRepository::new(pool.clone())),
        };
        let market_dates = Arc::new(MarketDateRepository::new(pool));

        let auth = Arc::new(AuthService::new(
            users.clone(),
            sessions,
            config.auth.session_ttl_hours,
        ));
        let ws_server = Arc::new(WebSocketServer::new(auth.clone(), members.clone()));
        let notifications = Arc::new(NotificationService::new(
            notification_repo,
            members.clone(),
            ws_server.clone(),
        ));
        let access = Arc::new(AccessControl::new(members.clone(), cache.clone()));
        let audit = Arc::new(AuditTrailService::new(config.audit_log_dir.clone())?);
        let email = Arc::new(EmailClient::new(config.email.clone()));

        let room_service = Arc::new(RoomService::new(
            rooms.clone(),
            members.clone(),
            access.clone(),
            notifications.clone(),
            audit.clone(),
            SecretBox::new(&config.auth.encryption_key),
        ));
        let invitation_service = Arc::new(InvitationService::new(
            invitations,
            rooms.clone(),
            users,
            access.clone(),
            notifications.clone(),
            email,
            config.public_base_url.clone(),
        ));
        let period_service = Arc::new(PeriodService::new(
            periods,
            sources.clone(),
            access.clone(),
            notifications.clone(),
            audit.clone(),
            cache.clone(),
        ));
        let meal_service = Arc::new(MealService::new(
            sources.meals.clone(),
            sources.guest_meals.clone(),
            rooms.clone(),
            period_service.clone(),
            access.clone(),
        ));
        let shopping_service = Arc::new(ShoppingService::new(
            sources.shopping.clone(),
            market_dates,
            period_service.clone(),
            access.clone(),
            notifications.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            sources.payments.clone(),
            sources.expenses.clone(),
            sources.transactions.clone(),
            period_service.clone(),
            access.clone(),
            notifications.clone(),
            audit.clone(),
        ));
        let vote_service = Arc::new(VoteService::new(
            votes,
            members,
            access.clone(),
            notifications.clone(),
            audit.clone(),
        ));
        let excel_service = Arc::new(ExcelService::new(
            rooms,
            sources,
            period_service.clone(),
            access,
            notifications.clone(),
            audit,
        ));

        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config: Arc::new(config),
            database,
            cache,
            ws_server,
            auth,
            rooms: room_service,
            invitations: invitation_service,
            periods: period_service,
            meals: meal_service,
            shopping: shopping_service,
            payments: payment_service,
            votes: vote_service,
            notifications,
            excel: excel_service,
        })
    }

    /// Background sweeper over this state's services
    pub fn housekeeper(&self) -> Housekeeper {
        Housekeeper::new(
            self.auth.clone(),
            self.invitations.clone(),
            self.votes.clone(),
            self.rate_limiter.clone(),
        )
        .with_interval(self.config.housekeeping_interval())
    }
}

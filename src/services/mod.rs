pub mod access;
pub mod audit;
pub mod auth_service;
pub mod email;
pub mod excel_service;
pub mod housekeeping;
pub mod invitation_service;
pub mod meal_service;
pub mod notification_service;
pub mod payment_service;
pub mod period_service;
pub mod room_service;
pub mod shopping_service;
pub mod validation;
pub mod vote_service;

pub use access::AccessControl;
pub use audit::AuditTrailService;
pub use auth_service::AuthService;
pub use email::EmailClient;
pub use excel_service::{ExcelService, ExportedWorkbook, ImportReport};
pub use housekeeping::Housekeeper;
pub use invitation_service::InvitationService;
pub use meal_service::MealService;
pub use notification_service::NotificationService;
pub use payment_service::PaymentService;
pub use period_service::{PeriodService, SummarySources};
pub use room_service::RoomService;
pub use shopping_service::ShoppingService;
pub use vote_service::VoteService;

pub mod invitation_repository;
pub mod meal_repository;
pub mod notification_repository;
pub mod payment_repository;
pub mod period_repository;
pub mod room_member_repository;
pub mod room_repository;
pub mod shopping_repository;
pub mod user_repository;
pub mod vote_repository;

// Re-export all repositories for convenient access
pub use invitation_repository::InvitationRepository;
pub use meal_repository::{GuestMealRepository, MealFilter, MealRepository};
pub use notification_repository::NotificationRepository;
pub use payment_repository::{ExpenseRepository, PaymentRepository, TransactionRepository};
pub use period_repository::PeriodRepository;
pub use room_member_repository::RoomMemberRepository;
pub use room_repository::RoomRepository;
pub use shopping_repository::{MarketDateRepository, ShoppingRepository};
pub use user_repository::{SessionRepository, UserRepository};
pub use vote_repository::VoteRepository;

//! Domain models for the Messmate backend.
//!
//! This module contains all database-backed models representing
//! the core entities of the shared-living platform.

/// Declares a text-backed enum stored as TEXT in the database.
///
/// Generates `as_str`, `ALL`, `FromStr` and `Display`, with serde using the
/// same snake_case spelling as the database.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Convert to database string
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod invitation;
pub mod meal;
pub mod notification;
pub mod payment;
pub mod period;
pub mod report;
pub mod room;
pub mod room_member;
pub mod shopping;
pub mod user;
pub mod vote;

// Re-export all models for convenient access
pub use invitation::InviteToken;
pub use meal::{GuestMeal, Meal, MealType};
pub use notification::{Notification, NotificationKind};
pub use payment::{
    AccountTransaction, ExpenseCategory, ExtraExpense, Payment, PaymentMethod, TransactionKind,
};
pub use period::{MealPeriod, PeriodStatus};
pub use report::{UserAmount, UserCount, UserLedgerTotal};
pub use room::{Room, RoomOverview};
pub use room_member::{MemberDetails, Role, RoomMember};
pub use shopping::{MarketDate, ShoppingItem};
pub use user::{Session, User};
pub use vote::{Vote, VoteBallot, VoteStatus, VoteType};

//! Period accounting: meal rate, member shares and balances.
//!
//! Everything here is pure; the period service feeds it aggregates read
//! from the repositories.

pub mod summary;

pub use summary::{
    meal_rate, round_money, MemberActivity, MemberSummary, PeriodInputs, PeriodSummary,
};

//! SeaORM entities for the campaign ledger.

pub mod daily_tap;
pub mod phone_registration;
pub mod prize_exchange;
pub mod quiz_completion;
pub mod referral;
pub mod telegram_subscription;
pub mod user;

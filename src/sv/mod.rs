pub mod ledger;
pub mod prize;
pub mod referral;
pub mod stats;
pub mod tap;
pub mod task;
pub mod user;

pub use ledger::Ledger;
pub use prize::Prize;
pub use referral::Referral;
pub use stats::Stats;
pub use tap::Tap;
pub use task::Task;
pub use user::User;

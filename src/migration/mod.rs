//! Database migrations using SeaORM

use sea_orm_migration::prelude::*;

mod m20250401_000001_create_users;
mod m20250401_000002_create_quiz_completions;
mod m20250401_000003_create_telegram_subscriptions;
mod m20250401_000004_create_phone_registrations;
mod m20250401_000005_create_referrals;
mod m20250401_000006_create_prize_exchanges;
mod m20250401_000007_create_daily_taps;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20250401_000001_create_users::Migration),
      Box::new(m20250401_000002_create_quiz_completions::Migration),
      Box::new(m20250401_000003_create_telegram_subscriptions::Migration),
      Box::new(m20250401_000004_create_phone_registrations::Migration),
      Box::new(m20250401_000005_create_referrals::Migration),
      Box::new(m20250401_000006_create_prize_exchanges::Migration),
      Box::new(m20250401_000007_create_daily_taps::Migration),
    ]
  }
}

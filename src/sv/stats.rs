//! Read-side aggregates: the profile snapshot served to the mini-app,
//! the leaderboard and the campaign-wide totals for the admin bot.

use crate::{
  entity::{
    phone_registration, prize_exchange, quiz_completion,
    telegram_subscription, user,
  },
  prelude::*,
  sv,
};

/// Everything the mini-app needs to render after a launch, collected in
/// one place so handlers don't hand-assemble it.
#[derive(Debug, Clone)]
pub struct Profile {
  pub user: user::Model,
  pub quiz_completed: bool,
  pub keyword_completed: bool,
  pub telegram_subscribed: bool,
  pub phone_registered: bool,
  pub referral_count: u64,
  pub taps_today: i32,
  pub exchanges: Vec<prize_exchange::Model>,
}

#[derive(Debug, Clone, Copy)]
pub struct CampaignTotals {
  pub users: u64,
  pub repeat_users: u64,
  pub referrals: u64,
  pub quiz_completions: u64,
  pub keyword_completions: u64,
  pub telegram_subscriptions: u64,
  pub phone_registrations: u64,
  pub exchanges: u64,
}

pub struct Stats<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Stats<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn profile(&self, tg_user_id: i64) -> Result<Profile> {
    let user = user::Entity::find_by_id(tg_user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    let tasks = sv::Task::new(self.db);
    let quiz_completed = tasks.status(tg_user_id, sv::task::TaskKind::Quiz).await?;
    let telegram_subscribed =
      tasks.status(tg_user_id, sv::task::TaskKind::Telegram).await?;
    let phone_registered =
      tasks.status(tg_user_id, sv::task::TaskKind::Phone).await?;

    let referral_count = sv::Referral::new(self.db).count(tg_user_id).await?;
    let taps_today = sv::Tap::new(self.db).taps_today(tg_user_id).await?;
    let exchanges = sv::Prize::new(self.db).of_user(tg_user_id).await?;

    Ok(Profile {
      keyword_completed: user.keyword_completed,
      user,
      quiz_completed,
      telegram_subscribed,
      phone_registered,
      referral_count,
      taps_today,
      exchanges,
    })
  }

  pub async fn leaderboard(&self, limit: u64) -> Result<Vec<user::Model>> {
    let rows = user::Entity::find()
      .order_by_desc(user::Column::Points)
      .order_by_asc(user::Column::CreatedAt)
      .limit(limit)
      .all(self.db)
      .await?;
    Ok(rows)
  }

  pub async fn totals(&self) -> Result<CampaignTotals> {
    Ok(CampaignTotals {
      users: sv::User::new(self.db).count().await?,
      repeat_users: user::Entity::find()
        .filter(user::Column::IsRepeat.eq(true))
        .count(self.db)
        .await?,
      referrals: sv::Referral::new(self.db).total().await?,
      quiz_completions: quiz_completion::Entity::find().count(self.db).await?,
      keyword_completions: user::Entity::find()
        .filter(user::Column::KeywordCompleted.eq(true))
        .count(self.db)
        .await?,
      telegram_subscriptions: telegram_subscription::Entity::find()
        .count(self.db)
        .await?,
      phone_registrations: phone_registration::Entity::find()
        .count(self.db)
        .await?,
      exchanges: sv::Prize::new(self.db).total().await?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::testing::{seed_user, setup_test_db};

  #[tokio::test]
  async fn profile_reflects_task_and_referral_state() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    seed_user(&db, 2).await;

    sv::Task::new(&db).complete_quiz(1, 5).await.unwrap();
    sv::Task::new(&db).complete_keyword(1, "Talentsy").await.unwrap();
    sv::Referral::new(&db).link(1, 2).await.unwrap();

    let profile = Stats::new(&db).profile(1).await.unwrap();
    assert!(profile.quiz_completed);
    assert!(profile.keyword_completed);
    assert!(!profile.telegram_subscribed);
    assert!(!profile.phone_registered);
    assert_eq!(profile.referral_count, 1);
    assert_eq!(profile.taps_today, 0);
    assert!(profile.exchanges.is_empty());
    assert_eq!(profile.user.points, 300);
  }

  #[tokio::test]
  async fn profile_of_unknown_user_fails() {
    let db = setup_test_db().await;

    assert!(matches!(
      Stats::new(&db).profile(404).await,
      Err(Error::UserNotFound)
    ));
  }

  #[tokio::test]
  async fn leaderboard_orders_by_points() {
    let db = setup_test_db().await;
    for id in 1..=3 {
      seed_user(&db, id).await;
    }
    let ledger = sv::Ledger::new(&db);
    ledger.credit(1, 100).await.unwrap();
    ledger.credit(2, 300).await.unwrap();
    ledger.credit(3, 200).await.unwrap();

    let board = Stats::new(&db).leaderboard(2).await.unwrap();
    let ids = board.iter().map(|row| row.tg_user_id).collect::<Vec<_>>();
    assert_eq!(ids, [2, 3]);
  }

  #[tokio::test]
  async fn totals_count_campaign_activity() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    seed_user(&db, 2).await;
    seed_user(&db, 3).await;
    // second launch marks user 3 as a repeat participant
    seed_user(&db, 3).await;

    sv::Referral::new(&db).link(1, 2).await.unwrap();
    sv::Ledger::new(&db).credit(1, 600).await.unwrap();
    sv::Prize::new(&db).exchange(1, 1).await.unwrap();

    let task = sv::Task::new(&db);
    task.complete_quiz(1, 5).await.unwrap();
    task.complete_quiz(2, 5).await.unwrap();
    task.complete_keyword(1, "talentsy").await.unwrap();
    task.complete_subscription(2).await.unwrap();
    task.complete_phone(3, "79123456789").await.unwrap();

    let totals = Stats::new(&db).totals().await.unwrap();
    assert_eq!(totals.users, 3);
    assert_eq!(totals.repeat_users, 1);
    assert_eq!(totals.referrals, 1);
    assert_eq!(totals.quiz_completions, 2);
    assert_eq!(totals.keyword_completions, 1);
    assert_eq!(totals.telegram_subscriptions, 1);
    assert_eq!(totals.phone_registrations, 1);
    assert_eq!(totals.exchanges, 1);
  }
}

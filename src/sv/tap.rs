//! Daily tap counter. The ceiling is enforced by a single guarded upsert
//! (`tap_count + 1` only while under the limit), and the +2 credit joins
//! it in one transaction, so a tap can never be counted without being
//! paid or paid without being counted.

use sea_orm::{DatabaseBackend, Statement};

use crate::{entity::daily_tap, prelude::*, sv::ledger};

pub const DAILY_TAP_LIMIT: i32 = 10;
pub const TAP_REWARD: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapOutcome {
  pub accepted: bool,
  pub taps_today: i32,
}

pub struct Tap<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Tap<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn tap(&self, tg_user_id: i64) -> Result<TapOutcome> {
    self.tap_on(tg_user_id, utils::campaign_date()).await
  }

  pub(crate) async fn tap_on(
    &self,
    tg_user_id: i64,
    date: NaiveDate,
  ) -> Result<TapOutcome> {
    let txn = self.db.begin().await?;

    let upsert = Statement::from_sql_and_values(
      DatabaseBackend::Sqlite,
      r#"
      INSERT INTO daily_taps (tg_user_id, tap_date, tap_count)
      VALUES (?, ?, 1)
      ON CONFLICT (tg_user_id, tap_date)
      DO UPDATE SET tap_count = tap_count + 1
      WHERE tap_count < ?
      "#,
      [tg_user_id.into(), date.into(), DAILY_TAP_LIMIT.into()],
    );
    let accepted = txn.execute(upsert).await?.rows_affected() > 0;

    if accepted {
      ledger::credit_on(&txn, tg_user_id, TAP_REWARD).await?;
    }

    let taps_today = count_on(&txn, tg_user_id, date).await?;
    txn.commit().await?;

    Ok(TapOutcome { accepted, taps_today })
  }

  pub async fn taps_today(&self, tg_user_id: i64) -> Result<i32> {
    count_on(self.db, tg_user_id, utils::campaign_date()).await
  }

  /// Sum over the whole campaign, for the admin view.
  pub async fn total_taps(&self, tg_user_id: i64) -> Result<i64> {
    let rows = daily_tap::Entity::find()
      .filter(daily_tap::Column::TgUserId.eq(tg_user_id))
      .all(self.db)
      .await?;
    Ok(rows.iter().map(|row| row.tap_count as i64).sum())
  }
}

async fn count_on<C: ConnectionTrait>(
  conn: &C,
  tg_user_id: i64,
  date: NaiveDate,
) -> Result<i32> {
  let row = daily_tap::Entity::find_by_id((tg_user_id, date)).one(conn).await?;
  Ok(row.map(|row| row.tap_count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    Ledger,
    testing::{seed_user, setup_test_db},
  };

  #[tokio::test]
  async fn ceiling_caps_taps_and_rewards() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Tap::new(&db);
    let date = "2025-04-10".parse().unwrap();

    for n in 1..=DAILY_TAP_LIMIT {
      let outcome = sv.tap_on(1, date).await.unwrap();
      assert!(outcome.accepted);
      assert_eq!(outcome.taps_today, n);
    }
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 20);

    // the 11th tap of the day is rejected and pays nothing
    let eleventh = sv.tap_on(1, date).await.unwrap();
    assert!(!eleventh.accepted);
    assert_eq!(eleventh.taps_today, DAILY_TAP_LIMIT);
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 20);
  }

  #[tokio::test]
  async fn ceiling_resets_on_date_boundary() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Tap::new(&db);

    let today = "2025-04-10".parse().unwrap();
    let tomorrow = "2025-04-11".parse().unwrap();

    for _ in 0..DAILY_TAP_LIMIT {
      sv.tap_on(1, today).await.unwrap();
    }
    assert!(!sv.tap_on(1, today).await.unwrap().accepted);

    let fresh = sv.tap_on(1, tomorrow).await.unwrap();
    assert!(fresh.accepted);
    assert_eq!(fresh.taps_today, 1);

    assert_eq!(sv.total_taps(1).await.unwrap(), 11);
    assert_eq!(
      Ledger::new(&db).balance(1).await.unwrap(),
      11 * TAP_REWARD
    );
  }

  #[tokio::test]
  async fn counters_are_per_user() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    seed_user(&db, 2).await;
    let sv = Tap::new(&db);
    let date = "2025-04-10".parse().unwrap();

    for _ in 0..DAILY_TAP_LIMIT {
      sv.tap_on(1, date).await.unwrap();
    }
    let other = sv.tap_on(2, date).await.unwrap();
    assert!(other.accepted);
    assert_eq!(other.taps_today, 1);
  }
}

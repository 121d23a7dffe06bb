//! Referral graph. A user can be referred at most once (`referred_id` is
//! the primary key), so concurrent link attempts resolve to first-wins
//! inside the database instead of a check-then-insert race. Self-referral
//! and unknown referrers are silent no-ops: the launch must never fail
//! because a share link was stale or doctored.

use sea_orm::DbErr;
use sea_orm::sea_query::OnConflict;

use crate::{
  entity::{referral, user},
  prelude::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralOutcome {
  Linked,
  SelfReferral,
  AlreadyReferred,
  UnknownReferrer,
}

pub struct Referral<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn link(
    &self,
    referrer_id: i64,
    referred_id: i64,
  ) -> Result<ReferralOutcome> {
    if referrer_id == referred_id {
      return Ok(ReferralOutcome::SelfReferral);
    }

    if user::Entity::find_by_id(referrer_id).one(self.db).await?.is_none() {
      return Ok(ReferralOutcome::UnknownReferrer);
    }

    let res = referral::Entity::insert(referral::ActiveModel {
      referred_id: Set(referred_id),
      referrer_id: Set(referrer_id),
      created_at: Set(Utc::now().naive_utc()),
    })
    .on_conflict(
      OnConflict::column(referral::Column::ReferredId).do_nothing().to_owned(),
    )
    .exec(self.db)
    .await;

    match res {
      Ok(_) => {
        info!(referrer_id, referred_id, "referral linked");
        Ok(ReferralOutcome::Linked)
      }
      Err(DbErr::RecordNotInserted) => Ok(ReferralOutcome::AlreadyReferred),
      Err(err) => Err(err.into()),
    }
  }

  pub async fn count(&self, referrer_id: i64) -> Result<u64> {
    let count = referral::Entity::find()
      .filter(referral::Column::ReferrerId.eq(referrer_id))
      .count(self.db)
      .await?;
    Ok(count)
  }

  pub async fn of_referrer(
    &self,
    referrer_id: i64,
  ) -> Result<Vec<referral::Model>> {
    let rows = referral::Entity::find()
      .filter(referral::Column::ReferrerId.eq(referrer_id))
      .order_by_asc(referral::Column::CreatedAt)
      .all(self.db)
      .await?;
    Ok(rows)
  }

  pub async fn total(&self) -> Result<u64> {
    Ok(referral::Entity::find().count(self.db).await?)
  }

  /// Admin escape hatch: detach a referred user so they can be linked
  /// to another referrer (or not at all).
  pub async fn unlink(&self, referred_id: i64) -> Result<bool> {
    let res = referral::Entity::delete_by_id(referred_id).exec(self.db).await?;
    if res.rows_affected > 0 {
      warn!(referred_id, "admin removed referral");
    }
    Ok(res.rows_affected > 0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::testing::{seed_user, setup_test_db};

  #[tokio::test]
  async fn self_referral_never_creates_a_record() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Referral::new(&db);

    assert_eq!(sv.link(1, 1).await.unwrap(), ReferralOutcome::SelfReferral);
    assert_eq!(sv.total().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn unknown_referrer_is_a_noop() {
    let db = setup_test_db().await;
    seed_user(&db, 2).await;
    let sv = Referral::new(&db);

    assert_eq!(
      sv.link(404, 2).await.unwrap(),
      ReferralOutcome::UnknownReferrer
    );
    assert_eq!(sv.total().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn first_referrer_wins() {
    let db = setup_test_db().await;
    seed_user(&db, 10).await; // referrer A
    seed_user(&db, 20).await; // referrer B
    seed_user(&db, 30).await; // referred X
    let sv = Referral::new(&db);

    assert_eq!(sv.link(10, 30).await.unwrap(), ReferralOutcome::Linked);
    assert_eq!(
      sv.link(20, 30).await.unwrap(),
      ReferralOutcome::AlreadyReferred
    );

    assert_eq!(sv.count(10).await.unwrap(), 1);
    assert_eq!(sv.count(20).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn repeated_launch_with_same_link_is_idempotent() {
    let db = setup_test_db().await;
    seed_user(&db, 10).await;
    seed_user(&db, 30).await;
    let sv = Referral::new(&db);

    assert_eq!(sv.link(10, 30).await.unwrap(), ReferralOutcome::Linked);
    assert_eq!(
      sv.link(10, 30).await.unwrap(),
      ReferralOutcome::AlreadyReferred
    );
    assert_eq!(sv.count(10).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn unlink_allows_relinking() {
    let db = setup_test_db().await;
    seed_user(&db, 10).await;
    seed_user(&db, 20).await;
    seed_user(&db, 30).await;
    let sv = Referral::new(&db);

    sv.link(10, 30).await.unwrap();
    assert!(sv.unlink(30).await.unwrap());
    assert!(!sv.unlink(30).await.unwrap());

    assert_eq!(sv.link(20, 30).await.unwrap(), ReferralOutcome::Linked);
    assert_eq!(sv.count(20).await.unwrap(), 1);
  }
}

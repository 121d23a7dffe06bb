//! Prize exchange: a one-way `not-exchanged -> exchanged` transition per
//! (user, prize). Balance check, debit and exchange record all live in
//! one transaction keyed on the composite primary key, so a debit can
//! never land without its record and a prize can never be bought twice.

use sea_orm::{DbErr, IntoActiveModel};
use sea_orm::sea_query::OnConflict;

use crate::{entity::prize_exchange, prelude::*, sv::ledger};

#[derive(Debug, Clone, Copy)]
pub struct PrizeDef {
  pub id: i32,
  pub name: &'static str,
  pub cost: i64,
  pub description: &'static str,
  pub bot_url: &'static str,
}

/// Fixed campaign catalog; not configurable at runtime.
pub const CATALOG: [PrizeDef; 2] = [
  PrizeDef {
    id: 1,
    name: "Найди свой путь: практикум по поиску призвания",
    cost: 600,
    description: "Пошаговая система для тех, кто хочет понять свои цели, \
                  найти дело по душе и перестать сомневаться в своём выборе.",
    bot_url: "https://salebot.site/talentsy_ref1_1",
  },
  PrizeDef {
    id: 2,
    name: "Практикум «Путь к уверенности»",
    cost: 600,
    description: "Пошаговая система для тех, кто устал сомневаться в себе, \
                  хочет обрести уверенность и повысить самооценку.",
    bot_url: "https://salebot.site/talensy_ref2_1",
  },
];

pub fn find(prize_id: i32) -> Option<&'static PrizeDef> {
  CATALOG.iter().find(|prize| prize.id == prize_id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
  Exchanged(prize_exchange::Model),
  AlreadyExchanged(prize_exchange::Model),
}

impl ExchangeOutcome {
  pub fn record(&self) -> &prize_exchange::Model {
    match self {
      Self::Exchanged(record) | Self::AlreadyExchanged(record) => record,
    }
  }
}

pub struct Prize<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Prize<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn exchange(
    &self,
    tg_user_id: i64,
    prize_id: i32,
  ) -> Result<ExchangeOutcome> {
    let prize = find(prize_id).ok_or(Error::UnknownPrize)?;

    let txn = self.db.begin().await?;

    // terminal state short-circuits before any balance check
    if let Some(existing) =
      prize_exchange::Entity::find_by_id((tg_user_id, prize_id))
        .one(&txn)
        .await?
    {
      return Ok(ExchangeOutcome::AlreadyExchanged(existing));
    }

    ledger::debit_on(&txn, tg_user_id, prize.cost).await?;

    let record = prize_exchange::Model {
      tg_user_id,
      prize_id,
      prize_name: prize.name.to_string(),
      points_spent: prize.cost,
      bot_url: prize.bot_url.to_string(),
      created_at: Utc::now().naive_utc(),
    };

    let res = prize_exchange::Entity::insert(record.clone().into_active_model())
      .on_conflict(
        OnConflict::columns([
          prize_exchange::Column::TgUserId,
          prize_exchange::Column::PrizeId,
        ])
        .do_nothing()
        .to_owned(),
      )
      .exec(&txn)
      .await;

    match res {
      Ok(_) => {
        txn.commit().await?;
        info!(tg_user_id, prize_id, cost = prize.cost, "prize exchanged");
        Ok(ExchangeOutcome::Exchanged(record))
      }
      // lost a race: drop the transaction so the debit never lands
      Err(DbErr::RecordNotInserted) => {
        drop(txn);
        let existing = prize_exchange::Entity::find_by_id((tg_user_id, prize_id))
          .one(self.db)
          .await?
          .ok_or_else(|| {
            Error::Internal("conflicting exchange vanished".into())
          })?;
        Ok(ExchangeOutcome::AlreadyExchanged(existing))
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn of_user(
    &self,
    tg_user_id: i64,
  ) -> Result<Vec<prize_exchange::Model>> {
    let rows = prize_exchange::Entity::find()
      .filter(prize_exchange::Column::TgUserId.eq(tg_user_id))
      .order_by_asc(prize_exchange::Column::CreatedAt)
      .all(self.db)
      .await?;
    Ok(rows)
  }

  pub async fn total(&self) -> Result<u64> {
    Ok(prize_exchange::Entity::find().count(self.db).await?)
  }

  /// Admin escape hatch: delete the exchange and return the points.
  pub async fn refund(&self, tg_user_id: i64, prize_id: i32) -> Result<bool> {
    let txn = self.db.begin().await?;

    let Some(record) =
      prize_exchange::Entity::find_by_id((tg_user_id, prize_id))
        .one(&txn)
        .await?
    else {
      return Ok(false);
    };

    let spent = record.points_spent;
    record.into_active_model().delete(&txn).await?;
    ledger::credit_on(&txn, tg_user_id, spent).await?;

    txn.commit().await?;
    warn!(tg_user_id, prize_id, spent, "admin refunded prize exchange");
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    Ledger,
    testing::{seed_user, setup_test_db},
  };

  #[tokio::test]
  async fn exchange_debits_and_records_once() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);
    let sv = Prize::new(&db);

    ledger.credit(1, 600).await.unwrap();

    let outcome = sv.exchange(1, 1).await.unwrap();
    let record = match outcome {
      ExchangeOutcome::Exchanged(record) => record,
      other => panic!("expected fresh exchange, got {other:?}"),
    };
    assert_eq!(record.points_spent, 600);
    assert_eq!(ledger.balance(1).await.unwrap(), 0);

    // second attempt: no second record, no balance change, and the
    // terminal state wins over the now-insufficient balance
    let again = sv.exchange(1, 1).await.unwrap();
    assert!(matches!(again, ExchangeOutcome::AlreadyExchanged(_)));
    assert_eq!(ledger.balance(1).await.unwrap(), 0);
    assert_eq!(sv.of_user(1).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn insufficient_balance_is_rejected_without_changes() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);
    let sv = Prize::new(&db);

    ledger.credit(1, 599).await.unwrap();

    let err = sv.exchange(1, 1).await.unwrap_err();
    assert!(matches!(
      err,
      Error::InsufficientPoints { have: 599, need: 600 }
    ));
    assert_eq!(ledger.balance(1).await.unwrap(), 599);
    assert!(sv.of_user(1).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn distinct_prizes_are_independent() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);
    let sv = Prize::new(&db);

    ledger.credit(1, 1200).await.unwrap();

    assert!(matches!(
      sv.exchange(1, 1).await.unwrap(),
      ExchangeOutcome::Exchanged(_)
    ));
    assert!(matches!(
      sv.exchange(1, 2).await.unwrap(),
      ExchangeOutcome::Exchanged(_)
    ));
    assert_eq!(ledger.balance(1).await.unwrap(), 0);
    assert_eq!(sv.of_user(1).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn unknown_prize_is_rejected() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;

    assert!(matches!(
      Prize::new(&db).exchange(1, 99).await,
      Err(Error::UnknownPrize)
    ));
  }

  #[tokio::test]
  async fn refund_returns_points_and_reopens_exchange() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);
    let sv = Prize::new(&db);

    ledger.credit(1, 600).await.unwrap();
    sv.exchange(1, 1).await.unwrap();

    assert!(sv.refund(1, 1).await.unwrap());
    assert_eq!(ledger.balance(1).await.unwrap(), 600);
    assert!(sv.of_user(1).await.unwrap().is_empty());

    assert!(!sv.refund(1, 1).await.unwrap());
  }
}

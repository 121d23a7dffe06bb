//! Point ledger. Balances move only through the column-expression updates
//! below: the increment happens inside the database, so concurrent
//! sessions can never lose updates, and the guarded debit makes a
//! negative balance unrepresentable on validated paths.

use sea_orm::sea_query::Expr;

use crate::{entity::user, prelude::*};

pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn balance(&self, tg_user_id: i64) -> Result<i64> {
    let user = user::Entity::find_by_id(tg_user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;
    Ok(user.points)
  }

  pub async fn credit(&self, tg_user_id: i64, delta: i64) -> Result<()> {
    credit_on(self.db, tg_user_id, delta).await
  }
}

/// `points += delta` as a single atomic update; `conn` may be a live
/// transaction so reward crediting commits together with its record.
pub(crate) async fn credit_on<C: ConnectionTrait>(
  conn: &C,
  tg_user_id: i64,
  delta: i64,
) -> Result<()> {
  let res = user::Entity::update_many()
    .col_expr(user::Column::Points, Expr::col(user::Column::Points).add(delta))
    .filter(user::Column::TgUserId.eq(tg_user_id))
    .exec(conn)
    .await?;

  if res.rows_affected == 0 {
    return Err(Error::UserNotFound);
  }
  Ok(())
}

/// `points -= cost`, guarded by `points >= cost` in the same statement.
/// Zero affected rows means insufficient funds (or no such user).
pub(crate) async fn debit_on<C: ConnectionTrait>(
  conn: &C,
  tg_user_id: i64,
  cost: i64,
) -> Result<()> {
  let res = user::Entity::update_many()
    .col_expr(user::Column::Points, Expr::col(user::Column::Points).sub(cost))
    .filter(user::Column::TgUserId.eq(tg_user_id))
    .filter(user::Column::Points.gte(cost))
    .exec(conn)
    .await?;

  if res.rows_affected == 0 {
    let have = user::Entity::find_by_id(tg_user_id)
      .one(conn)
      .await?
      .ok_or(Error::UserNotFound)?
      .points;
    return Err(Error::InsufficientPoints { have, need: cost });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::testing::{seed_user, setup_test_db};

  #[tokio::test]
  async fn credit_and_balance() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);

    ledger.credit(1, 150).await.unwrap();
    ledger.credit(1, 50).await.unwrap();

    assert_eq!(ledger.balance(1).await.unwrap(), 200);
  }

  #[tokio::test]
  async fn debit_rejects_overdraft() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let ledger = Ledger::new(&db);

    ledger.credit(1, 100).await.unwrap();

    let err = debit_on(&db, 1, 101).await.unwrap_err();
    assert!(matches!(
      err,
      Error::InsufficientPoints { have: 100, need: 101 }
    ));
    assert_eq!(ledger.balance(1).await.unwrap(), 100);

    debit_on(&db, 1, 100).await.unwrap();
    assert_eq!(ledger.balance(1).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn credit_unknown_user_fails() {
    let db = setup_test_db().await;
    let ledger = Ledger::new(&db);

    assert!(matches!(
      ledger.credit(404, 10).await,
      Err(Error::UserNotFound)
    ));
  }
}

//! One-time task completion. Every task is a two-state machine per user
//! (`incomplete -> complete`, one-way) and its reward must be credited
//! exactly once, no matter how many sessions race on the transition.
//!
//! The transition is an insert (or flag flip) guarded by a uniqueness
//! constraint; a conflict means some other call already completed the
//! task and is reported as `AlreadyCompleted`, never as an error and
//! never with a second credit. Record and credit share one transaction,
//! so a completion can't exist without its reward or vice versa.

use sea_orm::DbErr;
use sea_orm::sea_query::{Expr, OnConflict};

use crate::{
  entity::{phone_registration, quiz_completion, telegram_subscription, user},
  prelude::*,
  sv::ledger,
};

pub const QUIZ_QUESTIONS: u32 = 5;
pub const KEYWORD: &str = "talentsy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
  Quiz,
  Keyword,
  Telegram,
  Phone,
}

impl TaskKind {
  pub const fn reward(self) -> i64 {
    match self {
      Self::Quiz => 200,
      Self::Keyword => 100,
      Self::Telegram => 150,
      Self::Phone => 100,
    }
  }

  pub const fn name(self) -> &'static str {
    match self {
      Self::Quiz => "quiz",
      Self::Keyword => "keyword",
      Self::Telegram => "telegram",
      Self::Phone => "phone",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "quiz" => Some(Self::Quiz),
      "keyword" => Some(Self::Keyword),
      "telegram" => Some(Self::Telegram),
      "phone" => Some(Self::Phone),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
  Rewarded,
  AlreadyCompleted,
}

impl TaskOutcome {
  pub fn rewarded(self) -> bool {
    matches!(self, Self::Rewarded)
  }
}

pub struct Task<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Task<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Read-only completion check.
  pub async fn status(&self, tg_user_id: i64, kind: TaskKind) -> Result<bool> {
    let done = match kind {
      TaskKind::Quiz => quiz_completion::Entity::find_by_id(tg_user_id)
        .one(self.db)
        .await?
        .is_some(),
      TaskKind::Telegram => {
        telegram_subscription::Entity::find_by_id(tg_user_id)
          .one(self.db)
          .await?
          .is_some()
      }
      TaskKind::Phone => phone_registration::Entity::find_by_id(tg_user_id)
        .one(self.db)
        .await?
        .is_some(),
      TaskKind::Keyword => user::Entity::find_by_id(tg_user_id)
        .one(self.db)
        .await?
        .ok_or(Error::UserNotFound)?
        .keyword_completed,
    };
    Ok(done)
  }

  /// Proof: the user reached past the final question.
  pub async fn complete_quiz(
    &self,
    tg_user_id: i64,
    answered: u32,
  ) -> Result<TaskOutcome> {
    if answered < QUIZ_QUESTIONS {
      return Err(Error::QuizUnfinished);
    }
    self.claim_record(tg_user_id, TaskKind::Quiz).await
  }

  /// Proof: case-insensitive match against the secret word from the
  /// article. The completion flag lives on the user row; the flip is a
  /// conditional update so a repeated submit can't credit twice.
  pub async fn complete_keyword(
    &self,
    tg_user_id: i64,
    keyword: &str,
  ) -> Result<TaskOutcome> {
    if keyword.trim().to_lowercase() != KEYWORD {
      return Err(Error::WrongKeyword);
    }

    let txn = self.db.begin().await?;

    let res = user::Entity::update_many()
      .col_expr(user::Column::KeywordCompleted, Expr::value(true))
      .filter(user::Column::TgUserId.eq(tg_user_id))
      .filter(user::Column::KeywordCompleted.eq(false))
      .exec(&txn)
      .await?;

    let outcome = if res.rows_affected == 0 {
      if user::Entity::find_by_id(tg_user_id).one(&txn).await?.is_none() {
        return Err(Error::UserNotFound);
      }
      TaskOutcome::AlreadyCompleted
    } else {
      ledger::credit_on(&txn, tg_user_id, TaskKind::Keyword.reward()).await?;
      TaskOutcome::Rewarded
    };

    txn.commit().await?;
    Ok(outcome)
  }

  /// Caller must have verified channel membership via `getChatMember`
  /// first; this only performs the idempotent claim.
  pub async fn complete_subscription(
    &self,
    tg_user_id: i64,
  ) -> Result<TaskOutcome> {
    self.claim_record(tg_user_id, TaskKind::Telegram).await
  }

  /// Proof: 11 digits after normalization. The phone number itself is
  /// stored on every call; the reward is claimed at most once.
  pub async fn complete_phone(
    &self,
    tg_user_id: i64,
    phone: &str,
  ) -> Result<TaskOutcome> {
    let digits = utils::normalize_phone(phone).ok_or(Error::InvalidPhone)?;

    let txn = self.db.begin().await?;

    let res = user::Entity::update_many()
      .col_expr(user::Column::PhoneNumber, Expr::value(digits))
      .filter(user::Column::TgUserId.eq(tg_user_id))
      .exec(&txn)
      .await?;
    if res.rows_affected == 0 {
      return Err(Error::UserNotFound);
    }

    let outcome = claim_on(&txn, tg_user_id, TaskKind::Phone).await?;
    txn.commit().await?;
    Ok(outcome)
  }

  async fn claim_record(
    &self,
    tg_user_id: i64,
    kind: TaskKind,
  ) -> Result<TaskOutcome> {
    let txn = self.db.begin().await?;
    let outcome = claim_on(&txn, tg_user_id, kind).await?;
    txn.commit().await?;
    Ok(outcome)
  }

  /// Admin escape hatch: drop the completion and reclaim the reward.
  /// Returns false when there was nothing to revoke.
  pub async fn revoke(&self, tg_user_id: i64, kind: TaskKind) -> Result<bool> {
    let txn = self.db.begin().await?;

    let removed = match kind {
      TaskKind::Quiz => {
        quiz_completion::Entity::delete_by_id(tg_user_id)
          .exec(&txn)
          .await?
          .rows_affected
      }
      TaskKind::Telegram => {
        telegram_subscription::Entity::delete_by_id(tg_user_id)
          .exec(&txn)
          .await?
          .rows_affected
      }
      TaskKind::Phone => {
        phone_registration::Entity::delete_by_id(tg_user_id)
          .exec(&txn)
          .await?
          .rows_affected
      }
      TaskKind::Keyword => {
        user::Entity::update_many()
          .col_expr(user::Column::KeywordCompleted, Expr::value(false))
          .filter(user::Column::TgUserId.eq(tg_user_id))
          .filter(user::Column::KeywordCompleted.eq(true))
          .exec(&txn)
          .await?
          .rows_affected
      }
    };

    if removed == 0 {
      return Ok(false);
    }

    ledger::credit_on(&txn, tg_user_id, -kind.reward()).await?;
    txn.commit().await?;

    warn!(tg_user_id, task = kind.name(), "admin revoked task completion");
    Ok(true)
  }
}

/// Insert-once claim: a conflicted insert is a no-op success and the
/// reward is skipped.
async fn claim_on<C: ConnectionTrait>(
  conn: &C,
  tg_user_id: i64,
  kind: TaskKind,
) -> Result<TaskOutcome> {
  let now = Utc::now().naive_utc();

  let inserted = match kind {
    TaskKind::Quiz => {
      quiz_completion::Entity::insert(quiz_completion::ActiveModel {
        tg_user_id: Set(tg_user_id),
        completed_at: Set(now),
      })
      .on_conflict(
        OnConflict::column(quiz_completion::Column::TgUserId)
          .do_nothing()
          .to_owned(),
      )
      .exec(conn)
      .await
      .map(|_| ())
    }
    TaskKind::Telegram => {
      telegram_subscription::Entity::insert(
        telegram_subscription::ActiveModel {
          tg_user_id: Set(tg_user_id),
          subscribed_at: Set(now),
        },
      )
      .on_conflict(
        OnConflict::column(telegram_subscription::Column::TgUserId)
          .do_nothing()
          .to_owned(),
      )
      .exec(conn)
      .await
      .map(|_| ())
    }
    TaskKind::Phone => {
      phone_registration::Entity::insert(phone_registration::ActiveModel {
        tg_user_id: Set(tg_user_id),
        created_at: Set(now),
      })
      .on_conflict(
        OnConflict::column(phone_registration::Column::TgUserId)
          .do_nothing()
          .to_owned(),
      )
      .exec(conn)
      .await
      .map(|_| ())
    }
    TaskKind::Keyword => {
      return Err(Error::Internal(
        "keyword completion is tracked on the user row".into(),
      ));
    }
  };

  match inserted {
    Ok(_) => {
      ledger::credit_on(conn, tg_user_id, kind.reward()).await?;
      Ok(TaskOutcome::Rewarded)
    }
    Err(DbErr::RecordNotInserted) => Ok(TaskOutcome::AlreadyCompleted),
    Err(err) => Err(err.into()),
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
  async fn quiz_rewarded_exactly_once() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    assert!(!sv.status(1, TaskKind::Quiz).await.unwrap());

    let first = sv.complete_quiz(1, QUIZ_QUESTIONS).await.unwrap();
    assert_eq!(first, TaskOutcome::Rewarded);

    // repeated click / second tab
    let second = sv.complete_quiz(1, QUIZ_QUESTIONS).await.unwrap();
    assert_eq!(second, TaskOutcome::AlreadyCompleted);

    assert!(sv.status(1, TaskKind::Quiz).await.unwrap());
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 200);
  }

  #[tokio::test]
  async fn unfinished_quiz_is_rejected() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    let err = sv.complete_quiz(1, QUIZ_QUESTIONS - 1).await.unwrap_err();
    assert!(matches!(err, Error::QuizUnfinished));
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn keyword_is_case_insensitive_and_one_shot() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    assert!(matches!(
      sv.complete_keyword(1, "wrong").await,
      Err(Error::WrongKeyword)
    ));

    let first = sv.complete_keyword(1, "  TaLeNtSy ").await.unwrap();
    assert_eq!(first, TaskOutcome::Rewarded);
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 100);

    let again = sv.complete_keyword(1, "talentsy").await.unwrap();
    assert_eq!(again, TaskOutcome::AlreadyCompleted);
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 100);
    assert!(sv.status(1, TaskKind::Keyword).await.unwrap());
  }

  #[tokio::test]
  async fn subscription_claim_is_idempotent() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    assert_eq!(
      sv.complete_subscription(1).await.unwrap(),
      TaskOutcome::Rewarded
    );
    assert_eq!(
      sv.complete_subscription(1).await.unwrap(),
      TaskOutcome::AlreadyCompleted
    );
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 150);
  }

  #[tokio::test]
  async fn phone_reward_once_number_editable() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    assert!(matches!(
      sv.complete_phone(1, "12345").await,
      Err(Error::InvalidPhone)
    ));

    let first = sv.complete_phone(1, "+7 (912) 345-67-89").await.unwrap();
    assert_eq!(first, TaskOutcome::Rewarded);

    // number edit after the reward: stored, not paid again
    let second = sv.complete_phone(1, "+7 (999) 111-22-33").await.unwrap();
    assert_eq!(second, TaskOutcome::AlreadyCompleted);

    let user = crate::sv::User::new(&db).by_id(1).await.unwrap().unwrap();
    assert_eq!(user.phone_number.as_deref(), Some("79991112233"));
    assert_eq!(user.points, 100);
  }

  #[tokio::test]
  async fn revoke_reclaims_reward() {
    let db = setup_test_db().await;
    seed_user(&db, 1).await;
    let sv = Task::new(&db);

    sv.complete_quiz(1, QUIZ_QUESTIONS).await.unwrap();
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 200);

    assert!(sv.revoke(1, TaskKind::Quiz).await.unwrap());
    assert!(!sv.status(1, TaskKind::Quiz).await.unwrap());
    assert_eq!(Ledger::new(&db).balance(1).await.unwrap(), 0);

    assert!(!sv.revoke(1, TaskKind::Quiz).await.unwrap());
  }

  #[test]
  fn task_kind_parse() {
    assert_eq!(TaskKind::parse(" Quiz "), Some(TaskKind::Quiz));
    assert_eq!(TaskKind::parse("telegram"), Some(TaskKind::Telegram));
    assert_eq!(TaskKind::parse("nope"), None);
  }
}

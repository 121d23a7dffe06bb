use sea_orm::sea_query::{Expr, OnConflict};

use crate::{entity::user, prelude::*};

#[derive(Debug, Clone)]
pub struct LaunchProfile {
  pub tg_user_id: i64,
  pub first_name: String,
  pub username: Option<String>,
  pub avatar_url: Option<String>,
}

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// First launch creates the row (zero points, onboarding pending);
  /// later launches refresh the profile fields and `last_login`. The
  /// whole thing is one upsert, so two tabs launching at once cannot
  /// produce duplicate users or a lost insert.
  pub async fn launch(
    &self,
    profile: LaunchProfile,
    start_source: Option<String>,
  ) -> Result<user::Model> {
    let now = Utc::now().naive_utc();

    let mut on_conflict = OnConflict::column(user::Column::TgUserId)
      .update_columns([
        user::Column::Username,
        user::Column::FirstName,
        user::Column::AvatarUrl,
        user::Column::LastLogin,
      ])
      // an existing row means this is a returning user
      .value(user::Column::IsRepeat, Expr::value(true))
      .to_owned();
    // a launch without a payload must not erase the recorded source
    if start_source.is_some() {
      on_conflict.update_column(user::Column::StartSource);
    }

    let row = user::ActiveModel {
      tg_user_id: Set(profile.tg_user_id),
      username: Set(profile.username),
      first_name: Set(profile.first_name),
      avatar_url: Set(profile.avatar_url),
      phone_number: Set(None),
      points: Set(0),
      onboarding_completed: Set(false),
      keyword_completed: Set(false),
      is_repeat: Set(false),
      start_source: Set(start_source),
      created_at: Set(now),
      last_login: Set(now),
    };

    user::Entity::insert(row).on_conflict(on_conflict).exec(self.db).await?;

    self.by_id(profile.tg_user_id).await?.ok_or(Error::UserNotFound)
  }

  pub async fn by_id(&self, tg_user_id: i64) -> Result<Option<user::Model>> {
    let user = user::Entity::find_by_id(tg_user_id).one(self.db).await?;
    Ok(user)
  }

  pub async fn complete_onboarding(&self, tg_user_id: i64) -> Result<()> {
    let res = user::Entity::update_many()
      .col_expr(user::Column::OnboardingCompleted, Expr::value(true))
      .filter(user::Column::TgUserId.eq(tg_user_id))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::UserNotFound);
    }
    Ok(())
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }

  // --- admin overrides: the sanctioned invariant-bypass path ---

  /// Direct balance overwrite. Skips the ledger on purpose.
  pub async fn set_points(&self, tg_user_id: i64, points: i64) -> Result<()> {
    let res = user::Entity::update_many()
      .col_expr(user::Column::Points, Expr::value(points))
      .filter(user::Column::TgUserId.eq(tg_user_id))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::UserNotFound);
    }
    warn!(tg_user_id, points, "admin points override");
    Ok(())
  }

  pub async fn remove(&self, tg_user_id: i64) -> Result<bool> {
    let res = user::Entity::delete_by_id(tg_user_id).exec(self.db).await?;
    if res.rows_affected > 0 {
      warn!(tg_user_id, "admin removed user");
    }
    Ok(res.rows_affected > 0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::testing::setup_test_db;

  fn profile(tg_user_id: i64, first_name: &str) -> LaunchProfile {
    LaunchProfile {
      tg_user_id,
      first_name: first_name.to_string(),
      username: None,
      avatar_url: None,
    }
  }

  #[tokio::test]
  async fn first_launch_creates_user() {
    let db = setup_test_db().await;
    let sv = User::new(&db);

    let user =
      sv.launch(profile(1, "Alice"), Some("vk".to_string())).await.unwrap();

    assert_eq!(user.points, 0);
    assert!(!user.onboarding_completed);
    assert!(!user.is_repeat);
    assert_eq!(user.start_source.as_deref(), Some("vk"));
  }

  #[tokio::test]
  async fn relaunch_updates_profile_but_keeps_state() {
    let db = setup_test_db().await;
    let sv = User::new(&db);

    sv.launch(profile(1, "Alice"), Some("vk".to_string())).await.unwrap();
    sv.complete_onboarding(1).await.unwrap();
    crate::sv::ledger::credit_on(&db, 1, 42).await.unwrap();

    let mut renamed = profile(1, "Alice B.");
    renamed.username = Some("alice".to_string());
    let user = sv.launch(renamed, None).await.unwrap();

    assert_eq!(user.first_name, "Alice B.");
    assert_eq!(user.username.as_deref(), Some("alice"));
    // accumulated state survives the upsert
    assert_eq!(user.points, 42);
    assert!(user.onboarding_completed);
    assert!(user.is_repeat);
    assert_eq!(user.start_source.as_deref(), Some("vk"));
  }

  #[tokio::test]
  async fn admin_override_and_removal() {
    let db = setup_test_db().await;
    let sv = User::new(&db);

    sv.launch(profile(9, "Bob"), None).await.unwrap();
    sv.set_points(9, 777).await.unwrap();
    assert_eq!(sv.by_id(9).await.unwrap().unwrap().points, 777);

    assert!(sv.remove(9).await.unwrap());
    assert!(!sv.remove(9).await.unwrap());
    assert!(sv.by_id(9).await.unwrap().is_none());
  }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub tg_user_id: i64,
  pub username: Option<String>,
  pub first_name: String,
  pub avatar_url: Option<String>,
  pub phone_number: Option<String>,
  /// Only ever changed through `sv::Ledger` (or the admin override).
  pub points: i64,
  pub onboarding_completed: bool,
  pub keyword_completed: bool,
  /// Repeat participant: flipped by the launch upsert once the user
  /// comes back. Read only by the admin analytics.
  pub is_repeat: bool,
  /// Source tag carried by the launch payload ("vk", "ads", ...).
  pub start_source: Option<String>,
  pub created_at: DateTime,
  pub last_login: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_one = "super::quiz_completion::Entity")]
  QuizCompletion,
  #[sea_orm(has_one = "super::telegram_subscription::Entity")]
  TelegramSubscription,
  #[sea_orm(has_one = "super::phone_registration::Entity")]
  PhoneRegistration,
  #[sea_orm(has_many = "super::prize_exchange::Entity")]
  PrizeExchanges,
  #[sea_orm(has_many = "super::daily_tap::Entity")]
  DailyTaps,
}

impl Related<super::quiz_completion::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::QuizCompletion.def()
  }
}

impl Related<super::telegram_subscription::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::TelegramSubscription.def()
  }
}

impl Related<super::phone_registration::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::PhoneRegistration.def()
  }
}

impl Related<super::prize_exchange::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::PrizeExchanges.def()
  }
}

impl Related<super::daily_tap::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::DailyTaps.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}

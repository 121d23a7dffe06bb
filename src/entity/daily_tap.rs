use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-day tap counter. `tap_count` never exceeds the daily ceiling; the
/// guarded upsert in `sv::Tap` is the only writer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_taps")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub tg_user_id: i64,
  #[sea_orm(primary_key, auto_increment = false)]
  pub tap_date: Date,
  pub tap_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::user::Entity",
    from = "Column::TgUserId",
    to = "super::user::Column::TgUserId"
  )]
  User,
}

impl Related<super::user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}

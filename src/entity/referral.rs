use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Directed referral edge. `referred_id` is the primary key, so a user can
/// be referred at most once and the first successful insert wins.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub referred_id: i64,
  pub referrer_id: i64,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::user::Entity",
    from = "Column::ReferrerId",
    to = "super::user::Column::TgUserId"
  )]
  Referrer,
}

impl ActiveModelBehavior for ActiveModel {}

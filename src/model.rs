//! Wire types for the mini-app API. Every mutating request carries the
//! raw `initData` string; handlers verify it before touching anything.

use serde::{Deserialize, Serialize};

use crate::{
  entity::{prize_exchange, user},
  sv::{self, prize::PrizeDef, stats::Profile, task::TaskOutcome},
};

#[derive(Debug, Deserialize)]
pub struct Authed {
  pub init_data: String,
}

#[derive(Debug, Deserialize)]
pub struct QuizReq {
  pub init_data: String,
  pub answered: u32,
}

#[derive(Debug, Deserialize)]
pub struct KeywordReq {
  pub init_data: String,
  pub keyword: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneReq {
  pub init_data: String,
  pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeReq {
  pub init_data: String,
  pub prize_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
  #[serde(default = "default_leaderboard_limit")]
  pub limit: u64,
}

fn default_leaderboard_limit() -> u64 {
  10
}

#[derive(Debug, Serialize)]
pub struct ProfileResp {
  pub tg_user_id: i64,
  pub first_name: String,
  pub username: Option<String>,
  pub avatar_url: Option<String>,
  pub phone_number: Option<String>,
  pub points: i64,
  pub onboarding_completed: bool,
  pub is_repeat: bool,
  pub quiz_completed: bool,
  pub keyword_completed: bool,
  pub telegram_subscribed: bool,
  pub phone_registered: bool,
  pub referral_count: u64,
  pub taps_today: i32,
  pub daily_tap_limit: i32,
  pub exchanges: Vec<ExchangeResp>,
}

impl From<Profile> for ProfileResp {
  fn from(profile: Profile) -> Self {
    Self {
      tg_user_id: profile.user.tg_user_id,
      first_name: profile.user.first_name,
      username: profile.user.username,
      avatar_url: profile.user.avatar_url,
      phone_number: profile.user.phone_number,
      points: profile.user.points,
      onboarding_completed: profile.user.onboarding_completed,
      is_repeat: profile.user.is_repeat,
      quiz_completed: profile.quiz_completed,
      keyword_completed: profile.keyword_completed,
      telegram_subscribed: profile.telegram_subscribed,
      phone_registered: profile.phone_registered,
      referral_count: profile.referral_count,
      taps_today: profile.taps_today,
      daily_tap_limit: sv::tap::DAILY_TAP_LIMIT,
      exchanges: profile.exchanges.into_iter().map(Into::into).collect(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct TapResp {
  pub accepted: bool,
  pub taps_today: i32,
  pub daily_tap_limit: i32,
  pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskResp {
  pub rewarded: bool,
  pub reward: i64,
  pub points: i64,
}

impl TaskResp {
  pub fn new(outcome: TaskOutcome, reward: i64, points: i64) -> Self {
    Self { rewarded: outcome.rewarded(), reward, points }
  }
}

#[derive(Debug, Serialize)]
pub struct ExchangeResp {
  pub prize_id: i32,
  pub prize_name: String,
  pub points_spent: i64,
  pub bot_url: String,
}

impl From<prize_exchange::Model> for ExchangeResp {
  fn from(record: prize_exchange::Model) -> Self {
    Self {
      prize_id: record.prize_id,
      prize_name: record.prize_name,
      points_spent: record.points_spent,
      bot_url: record.bot_url,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct PrizeResp {
  pub id: i32,
  pub name: &'static str,
  pub cost: i64,
  pub description: &'static str,
}

impl From<&PrizeDef> for PrizeResp {
  fn from(prize: &PrizeDef) -> Self {
    Self {
      id: prize.id,
      name: prize.name,
      cost: prize.cost,
      description: prize.description,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
  pub tg_user_id: i64,
  pub first_name: String,
  pub username: Option<String>,
  pub avatar_url: Option<String>,
  pub points: i64,
}

impl From<user::Model> for LeaderboardRow {
  fn from(user: user::Model) -> Self {
    Self {
      tg_user_id: user.tg_user_id,
      first_name: user.first_name,
      username: user.username,
      avatar_url: user.avatar_url,
      points: user.points,
    }
  }
}

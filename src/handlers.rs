use std::convert::Infallible;

use axum::{
  Json,
  extract::{Query, State},
  response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
  auth, bot,
  events::Topic,
  model::*,
  prelude::*,
  start,
  state::App,
  sv::{
    prize::{self, ExchangeOutcome},
    referral::ReferralOutcome,
    tap::DAILY_TAP_LIMIT,
    task::TaskKind,
    user::LaunchProfile,
  },
};

fn authorize(app: &App, init_data: &str) -> Result<auth::InitData> {
  auth::verify(init_data, app.bot.token())
}

/// Entry point of every mini-app session: upserts the profile, applies
/// the start payload (referral link, traffic source) and returns the
/// full snapshot the frontend renders from.
pub async fn launch(
  State(app): State<Arc<App>>,
  Json(req): Json<Authed>,
) -> Result<Json<ProfileResp>> {
  let init = authorize(&app, &req.init_data)?;
  let payload = init
    .start_param
    .as_deref()
    .and_then(start::decode)
    .unwrap_or_default();

  let sv = app.sv();
  let user = sv
    .user
    .launch(
      LaunchProfile {
        tg_user_id: init.user.id,
        first_name: init.user.first_name,
        username: init.user.username,
        avatar_url: init.user.photo_url,
      },
      payload.source,
    )
    .await?;

  if let Some(referrer_id) = payload.referrer_id
    && sv.referral.link(referrer_id, user.tg_user_id).await?
      == ReferralOutcome::Linked
  {
    app.events.publish(Topic::Referrals, referrer_id);
  }
  app.events.publish(Topic::Users, user.tg_user_id);

  let profile = sv.stats.profile(user.tg_user_id).await?;
  Ok(Json(profile.into()))
}

pub async fn me(
  State(app): State<Arc<App>>,
  Query(req): Query<Authed>,
) -> Result<Json<ProfileResp>> {
  let init = authorize(&app, &req.init_data)?;
  let profile = app.sv().stats.profile(init.user.id).await?;
  Ok(Json(profile.into()))
}

pub async fn onboarding(
  State(app): State<Arc<App>>,
  Json(req): Json<Authed>,
) -> Result<Json<ProfileResp>> {
  let init = authorize(&app, &req.init_data)?;

  let sv = app.sv();
  sv.user.complete_onboarding(init.user.id).await?;
  app.events.publish(Topic::Users, init.user.id);

  let profile = sv.stats.profile(init.user.id).await?;
  Ok(Json(profile.into()))
}

pub async fn tap(
  State(app): State<Arc<App>>,
  Json(req): Json<Authed>,
) -> Result<Json<TapResp>> {
  let init = authorize(&app, &req.init_data)?;
  let tg_user_id = init.user.id;
  let sv = app.sv();

  // burst within the debounce window: report state, count nothing
  if !app.debounce_tap(tg_user_id) {
    return Ok(Json(TapResp {
      accepted: false,
      taps_today: sv.tap.taps_today(tg_user_id).await?,
      daily_tap_limit: DAILY_TAP_LIMIT,
      points: sv.ledger.balance(tg_user_id).await?,
    }));
  }

  let outcome = sv.tap.tap(tg_user_id).await?;
  if outcome.accepted {
    app.events.publish(Topic::Taps, tg_user_id);
    app.events.publish(Topic::Balance, tg_user_id);
  }

  Ok(Json(TapResp {
    accepted: outcome.accepted,
    taps_today: outcome.taps_today,
    daily_tap_limit: DAILY_TAP_LIMIT,
    points: sv.ledger.balance(tg_user_id).await?,
  }))
}

async fn task_resp(
  app: &App,
  tg_user_id: i64,
  kind: TaskKind,
  outcome: crate::sv::task::TaskOutcome,
) -> Result<Json<TaskResp>> {
  if outcome.rewarded() {
    app.events.publish(Topic::Tasks, tg_user_id);
    app.events.publish(Topic::Balance, tg_user_id);
  }
  let points = app.sv().ledger.balance(tg_user_id).await?;
  Ok(Json(TaskResp::new(outcome, kind.reward(), points)))
}

pub async fn quiz(
  State(app): State<Arc<App>>,
  Json(req): Json<QuizReq>,
) -> Result<Json<TaskResp>> {
  let init = authorize(&app, &req.init_data)?;
  let outcome =
    app.sv().task.complete_quiz(init.user.id, req.answered).await?;
  task_resp(&app, init.user.id, TaskKind::Quiz, outcome).await
}

pub async fn keyword(
  State(app): State<Arc<App>>,
  Json(req): Json<KeywordReq>,
) -> Result<Json<TaskResp>> {
  let init = authorize(&app, &req.init_data)?;
  let outcome =
    app.sv().task.complete_keyword(init.user.id, &req.keyword).await?;
  task_resp(&app, init.user.id, TaskKind::Keyword, outcome).await
}

pub async fn subscription(
  State(app): State<Arc<App>>,
  Json(req): Json<Authed>,
) -> Result<Json<TaskResp>> {
  let init = authorize(&app, &req.init_data)?;

  // membership is checked live against Telegram on every claim attempt
  if !bot::is_channel_member(&app.bot, &app.config.channel, init.user.id)
    .await?
  {
    return Err(Error::NotSubscribed);
  }

  let outcome = app.sv().task.complete_subscription(init.user.id).await?;
  task_resp(&app, init.user.id, TaskKind::Telegram, outcome).await
}

pub async fn phone(
  State(app): State<Arc<App>>,
  Json(req): Json<PhoneReq>,
) -> Result<Json<TaskResp>> {
  let init = authorize(&app, &req.init_data)?;
  let outcome = app.sv().task.complete_phone(init.user.id, &req.phone).await?;
  task_resp(&app, init.user.id, TaskKind::Phone, outcome).await
}

pub async fn prizes() -> Json<Vec<PrizeResp>> {
  Json(prize::CATALOG.iter().map(Into::into).collect())
}

#[derive(Debug, Serialize)]
pub struct ExchangeOk {
  pub already_exchanged: bool,
  pub points: i64,
  #[serde(flatten)]
  pub exchange: ExchangeResp,
}

pub async fn exchange(
  State(app): State<Arc<App>>,
  Json(req): Json<ExchangeReq>,
) -> Result<Json<ExchangeOk>> {
  let init = authorize(&app, &req.init_data)?;
  let sv = app.sv();

  let outcome = sv.prize.exchange(init.user.id, req.prize_id).await?;
  let already_exchanged = matches!(outcome, ExchangeOutcome::AlreadyExchanged(_));
  if !already_exchanged {
    app.events.publish(Topic::Prizes, init.user.id);
    app.events.publish(Topic::Balance, init.user.id);
  }

  let record = match outcome {
    ExchangeOutcome::Exchanged(record)
    | ExchangeOutcome::AlreadyExchanged(record) => record,
  };

  Ok(Json(ExchangeOk {
    already_exchanged,
    points: sv.ledger.balance(init.user.id).await?,
    exchange: record.into(),
  }))
}

pub async fn leaderboard(
  State(app): State<Arc<App>>,
  Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>> {
  let limit = query.limit.min(100);
  let rows = app.sv().stats.leaderboard(limit).await?;
  Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Change feed for the mini-app: one SSE message per published event.
/// Lagging subscribers skip missed events and keep going.
pub async fn events(
  State(app): State<Arc<App>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
  let rx = app.events.subscribe();

  let stream = futures::stream::unfold(rx, |mut rx| async move {
    loop {
      match rx.recv().await {
        Ok(event) => match SseEvent::default().json_data(&event) {
          Ok(sse) => return Some((Ok(sse), rx)),
          Err(_) => continue,
        },
        Err(broadcast::error::RecvError::Lagged(_)) => continue,
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  });

  Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

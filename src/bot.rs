use teloxide::prelude::*;
use teloxide::types::{
  InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient, UserId,
  WebAppInfo,
};
use teloxide::utils::command::BotCommands;

use crate::prelude::*;
use crate::state::App;
use crate::sv::task::TaskKind;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
  // --- PUBLIC COMMANDS ---
  Start,
  Balance,
  Help,

  // --- ADMIN COMMANDS ---
  Info(i64),
  #[command(parse_with = "split")]
  Points(i64, i64),
  #[command(parse_with = "split")]
  Revoke(i64, String),
  Unrefer(i64),
  #[command(parse_with = "split")]
  Refund(i64, i32),
  Stats,
  Backup,
}

trait BotExt {
  async fn reply_to(
    &self,
    chat_id: ChatId,
    text: impl ToString,
  ) -> ResponseResult<()>;

  async fn infer_username(&self, chat_id: ChatId) -> String;
}

impl BotExt for Bot {
  async fn reply_to(
    &self,
    chat_id: ChatId,
    text: impl ToString,
  ) -> ResponseResult<()> {
    self
      .send_message(chat_id, text.to_string())
      .parse_mode(ParseMode::Html)
      .await?;
    Ok(())
  }

  async fn infer_username(&self, chat_id: ChatId) -> String {
    match self.get_chat(chat_id).await {
      Ok(chat) => {
        if let Some(username) = chat.username() {
          format!("@{}", username)
        } else {
          format!("tg://user?id={}\">", chat_id)
        }
      }
      Err(_) => {
        format!("<code>{}</code> (API Error)", chat_id)
      }
    }
  }
}

/// Live membership check against the campaign channel. A Telegram API
/// error about the user (never seen in the channel) reads as "not a
/// member"; transport errors propagate.
pub async fn is_channel_member(
  bot: &Bot,
  channel: &str,
  tg_user_id: i64,
) -> Result<bool> {
  let chat = Recipient::ChannelUsername(format!("@{channel}"));

  match bot.get_chat_member(chat, UserId(tg_user_id as u64)).await {
    Ok(member) => Ok(
      member.kind.is_owner()
        || member.kind.is_administrator()
        || member.kind.is_member(),
    ),
    Err(teloxide::RequestError::Api(_)) => Ok(false),
    Err(err) => Err(err.into()),
  }
}

fn help_text(admin: bool) -> String {
  let mut text = String::from("<b>Talentsy Campaign Bot</b>\n\n");

  text.push_str("/start - Start bot\n");
  text.push_str("/balance - Your points and progress\n");
  text.push_str("/help - Show this menu\n");

  if admin {
    text.push_str("\n<b>Admin Commands:</b>\n");
    text.push_str("/info <code>id</code> - user info\n");
    text.push_str("/points <code>id</code> <code>n</code> - set balance\n");
    text.push_str(
      "/revoke <code>id</code> <code>task</code> - revoke task reward\n",
    );
    text.push_str("/unrefer <code>id</code> - detach referral\n");
    text.push_str(
      "/refund <code>id</code> <code>prize</code> - refund exchange\n",
    );
    text.push_str("/stats - campaign stats\n");
    text.push_str("/backup - force backup db\n");
  }

  text
}

async fn update(
  app: Arc<App>,
  bot: Bot,
  msg: Message,
  cmd: Command,
) -> ResponseResult<()> {
  let user_id = msg.chat.id.0;
  let is_admin = app.admins.contains(&user_id);

  match cmd {
    Command::Start => {
      let text = "Добро пожаловать в Talentsy! Откройте мини-приложение, \
                  чтобы зарабатывать баллы и обменивать их на призы.";

      match app.config.webapp_url.parse() {
        Ok(url) => {
          let keyboard = InlineKeyboardMarkup::default().append_row([
            InlineKeyboardButton::web_app(
              "🚀 Открыть приложение",
              WebAppInfo { url },
            ),
          ]);
          bot
            .send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
        }
        // misconfigured link still leaves the bot usable
        Err(_) => bot.reply_to(msg.chat.id, text).await?,
      }
    }
    Command::Help => {
      bot.reply_to(msg.chat.id, help_text(is_admin)).await?;
    }
    Command::Balance => {
      let sv = app.sv();
      match sv.stats.profile(user_id).await {
        Ok(profile) => {
          let text = format!(
            "💎 <b>Ваш баланс: {}</b>\nТапов сегодня: {}/{}\nПриглашено друзей: {}",
            profile.user.points,
            profile.taps_today,
            crate::sv::tap::DAILY_TAP_LIMIT,
            profile.referral_count,
          );
          bot.reply_to(msg.chat.id, text).await?;
        }
        Err(Error::UserNotFound) => {
          bot
            .reply_to(
              msg.chat.id,
              "Вы ещё не запускали мини-приложение. Начните с него!",
            )
            .await?;
        }
        Err(err) => {
          error!("balance lookup failed: {err}");
          bot.reply_to(msg.chat.id, "Что-то пошло не так, попробуйте позже.").await?;
        }
      }
    }
    _ => {}
  }

  if is_admin {
    let _ = bot.set_my_commands(Command::bot_commands()).await;
    admin_space(app, bot, msg, cmd).await?;
  }

  Ok(())
}

async fn admin_space(
  app: Arc<App>,
  bot: Bot,
  msg: Message,
  cmd: Command,
) -> ResponseResult<()> {
  let sv = app.sv();

  match cmd {
    Command::Info(user_id) => match sv.stats.profile(user_id).await {
      Ok(profile) => {
        let username = bot.infer_username(ChatId(user_id)).await;
        let total_taps = sv.tap.total_taps(user_id).await.unwrap_or(0);

        let resp = format!(
          "👤 <b>User Info</b>\nWho: {}\nJoined: {}\nPoints: {}\nOnboarded: {}\nQuiz: {} | Keyword: {} | Channel: {} | Phone: {}\nReferrals: {}\nTaps (total): {}\nExchanges: {}\nSource: {}",
          username,
          utils::format_date(profile.user.created_at),
          profile.user.points,
          profile.user.onboarding_completed,
          profile.quiz_completed,
          profile.keyword_completed,
          profile.telegram_subscribed,
          profile.phone_registered,
          profile.referral_count,
          total_taps,
          profile.exchanges.len(),
          profile.user.start_source.as_deref().unwrap_or("-"),
        );
        bot.reply_to(msg.chat.id, resp).await?;
      }
      Err(Error::UserNotFound) => {
        bot.reply_to(msg.chat.id, "User not found").await?
      }
      Err(err) => bot.reply_to(msg.chat.id, format!("DB Error: {err}")).await?,
    },
    Command::Points(user_id, points) => {
      match sv.user.set_points(user_id, points).await {
        Ok(_) => {
          app.events.publish(crate::events::Topic::Balance, user_id);
          bot
            .reply_to(msg.chat.id, format!("Balance set to <b>{points}</b>"))
            .await?
        }
        Err(err) => bot.reply_to(msg.chat.id, format!("Error: {err}")).await?,
      }
    }
    Command::Revoke(user_id, task) => match TaskKind::parse(&task) {
      Some(kind) => match sv.task.revoke(user_id, kind).await {
        Ok(true) => {
          app.events.publish(crate::events::Topic::Tasks, user_id);
          bot.reply_to(msg.chat.id, "🚫 Task reward revoked").await?
        }
        Ok(false) => bot.reply_to(msg.chat.id, "Nothing to revoke").await?,
        Err(err) => bot.reply_to(msg.chat.id, format!("Error: {err}")).await?,
      },
      None => {
        bot
          .reply_to(
            msg.chat.id,
            "Unknown task. One of: quiz, keyword, telegram, phone",
          )
          .await?
      }
    },
    Command::Unrefer(user_id) => match sv.referral.unlink(user_id).await {
      Ok(true) => bot.reply_to(msg.chat.id, "✅ Referral detached").await?,
      Ok(false) => bot.reply_to(msg.chat.id, "No referral found").await?,
      Err(err) => bot.reply_to(msg.chat.id, format!("Error: {err}")).await?,
    },
    Command::Refund(user_id, prize_id) => {
      match sv.prize.refund(user_id, prize_id).await {
        Ok(true) => {
          app.events.publish(crate::events::Topic::Balance, user_id);
          bot.reply_to(msg.chat.id, "✅ Exchange refunded").await?
        }
        Ok(false) => bot.reply_to(msg.chat.id, "No such exchange").await?,
        Err(err) => bot.reply_to(msg.chat.id, format!("Error: {err}")).await?,
      }
    }
    Command::Stats => match sv.stats.totals().await {
      Ok(totals) => {
        let message = format!(
          "📊 <b>Campaign «{}»</b>\nUsers: {} ({} repeat)\nReferrals: {}\nQuiz: {} | Keyword: {} | Channel: {} | Phone: {}\nExchanges: {}",
          app.config.campaign,
          totals.users,
          totals.repeat_users,
          totals.referrals,
          totals.quiz_completions,
          totals.keyword_completions,
          totals.telegram_subscriptions,
          totals.phone_registrations,
          totals.exchanges,
        );
        bot.reply_to(msg.chat.id, message).await?;
      }
      Err(err) => bot.reply_to(msg.chat.id, format!("DB Error: {err}")).await?,
    },
    Command::Backup => {
      if let Err(err) = app.perform_backup(msg.chat.id).await {
        bot.reply_to(msg.chat.id, format!("Backup failed: {err}")).await?;
      }
    }
    _ => {}
  };

  Ok(())
}

pub async fn run_bot(app: Arc<App>) {
  let bot = app.bot.clone();
  let handler = Update::filter_message().filter_command::<Command>().endpoint(
    move |bot: Bot, msg: Message, cmd: Command| {
      let app = app.clone();
      update(app, bot, msg, cmd)
    },
  );

  Dispatcher::builder(bot, handler).build().dispatch().await;
}

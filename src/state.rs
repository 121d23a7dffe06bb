use std::{
  collections::{HashSet, hash_map::DefaultHasher},
  hash::{Hash, Hasher},
  path::Path,
  sync::atomic::{AtomicU64, Ordering},
};

use teloxide::{
  Bot,
  prelude::*,
  types::{InputFile, ParseMode},
};
use tokio::fs;

use crate::{events::Hub, migration::Migrator, prelude::*, sv};

#[derive(Debug, Clone)]
pub struct Config {
  /// Campaign slug; names the database and shows up in admin replies.
  pub campaign: String,
  /// Channel username (without `@`) whose membership earns the
  /// subscription reward.
  pub channel: String,
  /// Mini-app link offered by the bot's /start reply.
  pub webapp_url: String,
  pub tap_debounce_ms: i64,
  pub backup_hours: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      campaign: String::from("default"),
      channel: String::from("talentsy_official"),
      webapp_url: String::from("https://t.me/talentsy_kds_bot/app"),

      tap_debounce_ms: 300,
      backup_hours: 1,
    }
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub ledger: sv::Ledger<'a>,
  pub task: sv::Task<'a>,
  pub tap: sv::Tap<'a>,
  pub referral: sv::Referral<'a>,
  pub prize: sv::Prize<'a>,
  pub stats: sv::Stats<'a>,
}

pub struct App {
  pub db: DatabaseConnection,
  pub bot: Bot,
  pub admins: HashSet<i64>,
  pub config: Config,
  pub events: Hub,
  last_tap: DashMap<i64, DateTime>,
  // Backup deduplication
  backup_hash: AtomicU64,
}

fn hash_of(bytes: &[u8]) -> u64 {
  let mut hasher = DefaultHasher::new();
  bytes.hash(&mut hasher);
  hasher.finish()
}

impl App {
  pub async fn new(
    db_url: &str,
    bot_token: &str,
    admins: HashSet<i64>,
    config: Config,
  ) -> Self {
    info!("Connecting to database...");
    let db =
      Database::connect(db_url).await.expect("Failed to connect to database");

    info!("Running migrations...");
    Migrator::up(&db, None).await.expect("Failed to run migrations");

    Self {
      db,
      bot: Bot::new(bot_token),
      admins,
      config,
      events: Hub::new(),
      last_tap: DashMap::new(),
      backup_hash: AtomicU64::new(0),
    }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      user: sv::User::new(&self.db),
      ledger: sv::Ledger::new(&self.db),
      task: sv::Task::new(&self.db),
      tap: sv::Tap::new(&self.db),
      referral: sv::Referral::new(&self.db),
      prize: sv::Prize::new(&self.db),
      stats: sv::Stats::new(&self.db),
    }
  }

  /// Best-effort tap throttle in front of the daily ceiling: a burst
  /// from one finger collapses to one counted tap. Purely in-memory,
  /// lost on restart, which only ever lets an extra tap through.
  pub fn debounce_tap(&self, tg_user_id: i64) -> bool {
    let now = Utc::now().naive_utc();
    let window = TimeDelta::milliseconds(self.config.tap_debounce_ms);

    let mut entry = self.last_tap.entry(tg_user_id).or_insert(now - window);
    if now - *entry < window {
      return false;
    }
    *entry = now;
    true
  }

  pub fn gc_debounce(&self) {
    let now = Utc::now().naive_utc();
    let window = TimeDelta::milliseconds(self.config.tap_debounce_ms);

    self.last_tap.retain(|_key, last| now - *last < window * 10);
  }

  pub async fn vacuum_into(&self, filename: &str) -> anyhow::Result<()> {
    let query = format!("VACUUM INTO '{}'", filename);
    self
      .db
      .execute(sea_orm::Statement::from_string(
        sea_orm::DatabaseBackend::Sqlite,
        query,
      ))
      .await?;
    Ok(())
  }

  pub async fn perform_smart_backup(&self) -> anyhow::Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let filename = format!("backup_{}_{}.db", self.config.campaign, timestamp);
    let path = Path::new(&filename);

    if path.exists() {
      let _ = fs::remove_file(path).await;
    }

    self.vacuum_into(&filename).await?;

    let content = fs::read(path).await?;

    let new_hash = hash_of(&content);
    let old_hash = self.backup_hash.load(Ordering::Relaxed);

    self.backup_hash.store(new_hash, Ordering::Relaxed);

    if new_hash == old_hash || old_hash == 0 {
      debug!("No changes in DB, skipping backup notification");
    } else {
      for &admin in self.admins.iter() {
        let doc = InputFile::file(path);
        let caption = format!(
          "📦 <b>Database Backup</b>\nCampaign: {}\nTime: {}",
          self.config.campaign, timestamp
        );

        let _ = self
          .bot
          .send_document(ChatId(admin), doc)
          .caption(caption)
          .parse_mode(ParseMode::Html)
          .await;
      }
    }

    let _ = fs::remove_file(path).await;
    Ok(())
  }

  pub async fn perform_backup(&self, chat_id: ChatId) -> anyhow::Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let filename =
      format!("manual_backup_{}_{}.db", self.config.campaign, timestamp);

    self.vacuum_into(&filename).await?;

    let path = Path::new(&filename);
    let _ = self.bot.send_document(chat_id, InputFile::file(path)).await;
    let _ = fs::remove_file(path).await;

    Ok(())
  }
}

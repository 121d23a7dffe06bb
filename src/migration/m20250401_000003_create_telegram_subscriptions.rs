use sea_orm_migration::prelude::*;

use super::m20250401_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(TelegramSubscriptions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(TelegramSubscriptions::TgUserId)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(
            ColumnDef::new(TelegramSubscriptions::SubscribedAt)
              .date_time()
              .not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_telegram_subscriptions_user")
              .from(TelegramSubscriptions::Table, TelegramSubscriptions::TgUserId)
              .to(Users::Table, Users::TgUserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(TelegramSubscriptions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum TelegramSubscriptions {
  Table,
  TgUserId,
  SubscribedAt,
}

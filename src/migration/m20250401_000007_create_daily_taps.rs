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
          .table(DailyTaps::Table)
          .if_not_exists()
          .col(ColumnDef::new(DailyTaps::TgUserId).big_integer().not_null())
          .col(ColumnDef::new(DailyTaps::TapDate).date().not_null())
          .col(
            ColumnDef::new(DailyTaps::TapCount).integer().not_null().default(0),
          )
          .primary_key(
            Index::create().col(DailyTaps::TgUserId).col(DailyTaps::TapDate),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_daily_taps_user")
              .from(DailyTaps::Table, DailyTaps::TgUserId)
              .to(Users::Table, Users::TgUserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(DailyTaps::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum DailyTaps {
  Table,
  TgUserId,
  TapDate,
  TapCount,
}

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
          .table(PrizeExchanges::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PrizeExchanges::TgUserId).big_integer().not_null(),
          )
          .col(ColumnDef::new(PrizeExchanges::PrizeId).integer().not_null())
          .col(ColumnDef::new(PrizeExchanges::PrizeName).string().not_null())
          .col(
            ColumnDef::new(PrizeExchanges::PointsSpent)
              .big_integer()
              .not_null(),
          )
          .col(ColumnDef::new(PrizeExchanges::BotUrl).string().not_null())
          .col(ColumnDef::new(PrizeExchanges::CreatedAt).date_time().not_null())
          .primary_key(
            Index::create()
              .col(PrizeExchanges::TgUserId)
              .col(PrizeExchanges::PrizeId),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_prize_exchanges_user")
              .from(PrizeExchanges::Table, PrizeExchanges::TgUserId)
              .to(Users::Table, Users::TgUserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PrizeExchanges::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum PrizeExchanges {
  Table,
  TgUserId,
  PrizeId,
  PrizeName,
  PointsSpent,
  BotUrl,
  CreatedAt,
}

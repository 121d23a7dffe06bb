use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Users::TgUserId)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Users::Username).string().null())
          .col(ColumnDef::new(Users::FirstName).string().not_null())
          .col(ColumnDef::new(Users::AvatarUrl).string().null())
          .col(ColumnDef::new(Users::PhoneNumber).string().null())
          .col(
            ColumnDef::new(Users::Points).big_integer().not_null().default(0),
          )
          .col(
            ColumnDef::new(Users::OnboardingCompleted)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Users::KeywordCompleted)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Users::IsRepeat).boolean().not_null().default(false),
          )
          .col(ColumnDef::new(Users::StartSource).string().null())
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Users::LastLogin).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_users_points")
          .table(Users::Table)
          .col(Users::Points)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  TgUserId,
  Username,
  FirstName,
  AvatarUrl,
  PhoneNumber,
  Points,
  OnboardingCompleted,
  KeywordCompleted,
  IsRepeat,
  StartSource,
  CreatedAt,
  LastLogin,
}

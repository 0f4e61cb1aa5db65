use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserEmbeddings::Table)
                    .if_not_exists()
                    .col(big_pk_auto(UserEmbeddings::Id))
                    // Kept equal to domain_matching::MAX_USER_ID_LEN
                    .col(string_len_uniq(UserEmbeddings::UserId, 64))
                    .col(
                        ColumnDef::new(UserEmbeddings::Embedding)
                            .array(ColumnType::Float)
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(UserEmbeddings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(UserEmbeddings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_embeddings_updated_at")
                    .table(UserEmbeddings::Table)
                    .col(UserEmbeddings::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserEmbeddings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserEmbeddings {
    Table,
    Id,
    UserId,
    Embedding,
    CreatedAt,
    UpdatedAt,
}

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per wallet partition; payload is the JSON bookmark array
        manager
            .create_table(
                Table::create()
                    .table(BookmarkCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BookmarkCache::CacheKey)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BookmarkCache::Payload).text().not_null())
                    .col(
                        ColumnDef::new(BookmarkCache::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookmarkCache::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BookmarkCache {
    Table,
    CacheKey,
    Payload,
    UpdatedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Poems {
    Table,
    Id,
    AuthorId,
    Title,
    Content,
    Status,
    Language,
    Tags,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poems::AuthorId).integer().not_null())
                    .col(ColumnDef::new(Poems::Title).string_len(100).not_null())
                    .col(ColumnDef::new(Poems::Content).text().not_null())
                    .col(
                        ColumnDef::new(Poems::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Poems::Language)
                            .string_len(5)
                            .not_null()
                            .default("en"),
                    )
                    .col(
                        ColumnDef::new(Poems::Tags)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Poems::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Poems::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poems_author_id")
                            .from(Poems::Table, Poems::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poems_author_id")
                    .table(Poems::Table)
                    .col(Poems::AuthorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poems_status_created_at")
                    .table(Poems::Table)
                    .col(Poems::Status)
                    .col(Poems::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // tag filtering uses `tags ? 'tag'`
        manager
            .get_connection()
            .execute_unprepared("CREATE INDEX idx_poems_tags ON poems USING GIN (tags)")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poems::Table).to_owned())
            .await
    }
}

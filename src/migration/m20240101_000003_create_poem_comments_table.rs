use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum PoemComments {
    Table,
    Id,
    PoemId,
    UserId,
    Content,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Poems {
    Table,
    Id,
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
                    .table(PoemComments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PoemComments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PoemComments::PoemId).integer().not_null())
                    .col(ColumnDef::new(PoemComments::UserId).integer().not_null())
                    .col(ColumnDef::new(PoemComments::Content).text().not_null())
                    .col(
                        ColumnDef::new(PoemComments::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poem_comments_poem_id")
                            .from(PoemComments::Table, PoemComments::PoemId)
                            .to(Poems::Table, Poems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poem_comments_user_id")
                            .from(PoemComments::Table, PoemComments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poem_comments_poem_id_created_at")
                    .table(PoemComments::Table)
                    .col(PoemComments::PoemId)
                    .col(PoemComments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PoemComments::Table).to_owned())
            .await
    }
}

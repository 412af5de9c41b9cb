use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TABLE poem_likes (
                id SERIAL PRIMARY KEY,
                poem_id INTEGER NOT NULL REFERENCES poems(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT uq_poem_likes_poem_user UNIQUE (poem_id, user_id)
            )",
        )
        .await?;

        db.execute_unprepared("CREATE INDEX idx_poem_likes_user_id ON poem_likes (user_id)")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS poem_likes")
            .await?;
        Ok(())
    }
}

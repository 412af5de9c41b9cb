use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_create_poems_table;
mod m20240101_000003_create_poem_comments_table;
mod m20240101_000004_create_poem_likes_table;
mod m20240101_000005_create_refresh_tokens;
mod m20240101_000006_create_author_applications;
mod m20240101_000007_create_application_reviews;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_poems_table::Migration),
            Box::new(m20240101_000003_create_poem_comments_table::Migration),
            Box::new(m20240101_000004_create_poem_likes_table::Migration),
            Box::new(m20240101_000005_create_refresh_tokens::Migration),
            Box::new(m20240101_000006_create_author_applications::Migration),
            Box::new(m20240101_000007_create_application_reviews::Migration),
        ]
    }
}

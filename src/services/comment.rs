use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{poem_comment, user, PoemComment, PoemCommentModel, User, UserModel},
    permission::Permission,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::collections::HashMap;

pub const MAX_COMMENT_CHARS: usize = 1000;

pub struct CommentService {
    db: DatabaseConnection,
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Comments on a poem in the order they were written.
    pub async fn list_by_poem(
        &self,
        poem_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<(PoemCommentModel, Option<UserModel>)>, u64)> {
        let paginator = PoemComment::find()
            .filter(poem_comment::Column::PoemId.eq(poem_id))
            .order_by_asc(poem_comment::Column::CreatedAt)
            .order_by_asc(poem_comment::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let comments = paginator.fetch_page(page.saturating_sub(1)).await?;

        let authors = self.authors_for(&comments).await?;
        let items = comments
            .into_iter()
            .map(|c| {
                let author = authors.get(&c.user_id).cloned();
                (c, author)
            })
            .collect();
        Ok((items, total))
    }

    /// Caller must have checked that the poem accepts comments.
    pub async fn create(
        &self,
        poem_id: i32,
        user_id: i32,
        content: &str,
    ) -> AppResult<PoemCommentModel> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Comment must not be blank".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::Validation(format!(
                "Comment is longer than {MAX_COMMENT_CHARS} characters"
            )));
        }

        let comment = poem_comment::ActiveModel {
            poem_id: sea_orm::ActiveValue::Set(poem_id),
            user_id: sea_orm::ActiveValue::Set(user_id),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(comment)
    }

    /// The comment's author or a moderator may delete it.
    pub async fn delete(&self, id: i32, user: &AuthUser) -> AppResult<()> {
        let existing = PoemComment::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if existing.user_id != user.user_id {
            user.require(Permission::ModerateComments)?;
            tracing::info!(
                comment_id = id,
                moderator = user.user_id,
                "Comment removed by moderator"
            );
        }

        PoemComment::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn authors_for(&self, comments: &[PoemCommentModel]) -> AppResult<HashMap<i32, UserModel>> {
        let mut ids: Vec<i32> = comments.iter().map(|c| c.user_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = User::find()
            .filter(user::Column::Id.is_in(ids))
            .all(&self.db)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

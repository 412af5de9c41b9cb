use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{author_application, poem, user, AuthorApplication, Poem, PoemComment, User, UserModel},
    permission::Role,
    services::auth::AuthService,
    workflow::{ApplicationStatus, PoemStatus},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

pub struct AdminStats {
    pub total_users: u64,
    pub users_today: u64,
    pub draft_poems: u64,
    pub poems_under_review: u64,
    pub published_poems: u64,
    pub total_comments: u64,
    pub pending_applications: u64,
}

pub struct AdminService {
    db: DatabaseConnection,
}

impl AdminService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_stats(&self) -> AppResult<AdminStats> {
        let today_start = chrono::Utc::now()
            .naive_utc()
            .date()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid start of day"))?;

        let total_users = User::find().count(&self.db).await?;
        let users_today = User::find()
            .filter(user::Column::CreatedAt.gte(today_start))
            .count(&self.db)
            .await?;
        let total_comments = PoemComment::find().count(&self.db).await?;
        let pending_applications = AuthorApplication::find()
            .filter(author_application::Column::Status.is_in([
                ApplicationStatus::Submitted,
                ApplicationStatus::UnderReview,
            ]))
            .count(&self.db)
            .await?;

        Ok(AdminStats {
            total_users,
            users_today,
            draft_poems: self.count_poems(PoemStatus::Draft).await?,
            poems_under_review: self.count_poems(PoemStatus::UnderReview).await?,
            published_poems: self.count_poems(PoemStatus::Published).await?,
            total_comments,
            pending_applications,
        })
    }

    async fn count_poems(&self, status: PoemStatus) -> AppResult<u64> {
        let count = Poem::find()
            .filter(poem::Column::Status.eq(status))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn list_users(
        &self,
        role: Option<Role>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        let mut query = User::find();
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }
        let paginator = query
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    async fn find_user(&self, user_id: i32) -> AppResult<UserModel> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Assign a role. A superadmin may not change their own role, so the
    /// last superadmin cannot lock everyone out by accident.
    pub async fn update_user_role(
        &self,
        actor: &AuthUser,
        user_id: i32,
        role: Role,
    ) -> AppResult<UserModel> {
        if actor.user_id == user_id {
            return Err(AppError::Validation(
                "You cannot change your own role".to_string(),
            ));
        }

        let existing = self.find_user(user_id).await?;
        let previous = existing.role;
        let mut active: user::ActiveModel = existing.into();
        active.role = sea_orm::ActiveValue::Set(role);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;

        tracing::info!(
            user_id,
            by = actor.user_id,
            from = %previous,
            to = %role,
            "User role changed"
        );
        Ok(updated)
    }

    /// Sign a user out everywhere. Returns the number of revoked sessions.
    pub async fn revoke_sessions(&self, actor: &AuthUser, user_id: i32) -> AppResult<u64> {
        self.find_user(user_id).await?;
        let revoked = AuthService::new(self.db.clone())
            .revoke_all_user_refresh_tokens(user_id)
            .await?;
        tracing::info!(user_id, by = actor.user_id, revoked, "Sessions revoked");
        Ok(revoked)
    }

    pub async fn reset_user_password(
        &self,
        actor: &AuthUser,
        user_id: i32,
        new_password: &str,
    ) -> AppResult<()> {
        let target = self.find_user(user_id).await?;
        AuthService::new(self.db.clone())
            .set_password(target, new_password)
            .await?;
        tracing::info!(user_id, by = actor.user_id, "Password reset by administrator");
        Ok(())
    }
}

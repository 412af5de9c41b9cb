use crate::{
    error::{AppError, AppResult},
    models::{poem, user, Poem, User, UserModel},
    workflow::PoemStatus,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};

/// Partial profile edit. `None` leaves a field alone; an empty pen name or bio
/// clears it.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub pen_name: Option<String>,
    pub bio: Option<String>,
}

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// The user plus the number of poems they have published.
    pub async fn get_public_profile(&self, id: i32) -> AppResult<(UserModel, u64)> {
        let user = self.get_by_id(id).await?;
        let published = Poem::find()
            .filter(poem::Column::AuthorId.eq(id))
            .filter(poem::Column::Status.eq(PoemStatus::Published))
            .count(&self.db)
            .await?;
        Ok((user, published))
    }

    pub async fn update_profile(&self, user_id: i32, update: ProfileUpdate) -> AppResult<UserModel> {
        let existing = self.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = existing.into();

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("Name must not be blank".to_string()));
            }
            active.name = sea_orm::ActiveValue::Set(name.to_string());
        }
        if let Some(pen_name) = update.pen_name {
            active.pen_name = sea_orm::ActiveValue::Set(non_blank(pen_name));
        }
        if let Some(bio) = update.bio {
            active.bio = sea_orm::ActiveValue::Set(non_blank(bio));
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&self.db).await?;
        Ok(updated)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

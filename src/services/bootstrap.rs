use crate::config::parse_bool_env;
use crate::error::AppResult;
use crate::models::{user, User};
use crate::permission::Role;
use crate::utils::hash_password;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::env;

#[derive(Debug, Clone)]
pub struct BootstrapSuperadminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl BootstrapSuperadminConfig {
    pub fn from_env() -> Option<Self> {
        if !parse_bool_env("BOOTSTRAP_SUPERADMIN_ENABLED", false) {
            return None;
        }

        let cfg = Self {
            name: env::var("BOOTSTRAP_SUPERADMIN_NAME").ok()?,
            email: env::var("BOOTSTRAP_SUPERADMIN_EMAIL").ok()?,
            password: env::var("BOOTSTRAP_SUPERADMIN_PASSWORD").ok()?,
        };
        if cfg.password.len() < 8 {
            tracing::warn!("BOOTSTRAP_SUPERADMIN_PASSWORD is shorter than 8 characters, skipping");
            return None;
        }
        Some(cfg)
    }
}

/// Make sure a superadmin exists at startup.
///
/// Does nothing when one already exists. Otherwise the account with the
/// configured email is promoted, or a fresh verified account is created.
pub async fn ensure_bootstrap_superadmin(db: &DatabaseConnection) -> AppResult<()> {
    let Some(cfg) = BootstrapSuperadminConfig::from_env() else {
        return Ok(());
    };

    let superadmin_exists = User::find()
        .filter(user::Column::Role.eq(Role::Superadmin))
        .one(db)
        .await?
        .is_some();
    if superadmin_exists {
        return Ok(());
    }

    let email = cfg.email.trim().to_lowercase();
    let now = chrono::Utc::now().naive_utc();

    let existing = User::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        tracing::info!(user_id = existing.id, "Promoting bootstrap account to superadmin");
        let mut active: user::ActiveModel = existing.into();
        active.role = sea_orm::ActiveValue::Set(Role::Superadmin);
        active.updated_at = sea_orm::ActiveValue::Set(now);
        active.update(db).await?;
        return Ok(());
    }

    let password_hash = hash_password(&cfg.password)?;
    let created = user::ActiveModel {
        name: sea_orm::ActiveValue::Set(cfg.name),
        pen_name: sea_orm::ActiveValue::Set(None),
        email: sea_orm::ActiveValue::Set(email),
        password_hash: sea_orm::ActiveValue::Set(password_hash),
        role: sea_orm::ActiveValue::Set(Role::Superadmin),
        bio: sea_orm::ActiveValue::Set(None),
        email_verified: sea_orm::ActiveValue::Set(true),
        email_verification_token: sea_orm::ActiveValue::Set(None),
        email_verification_expires: sea_orm::ActiveValue::Set(None),
        password_reset_token: sea_orm::ActiveValue::Set(None),
        password_reset_expires: sea_orm::ActiveValue::Set(None),
        created_at: sea_orm::ActiveValue::Set(now),
        updated_at: sea_orm::ActiveValue::Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, "Created bootstrap superadmin");
    Ok(())
}

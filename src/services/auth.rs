use crate::{
    config::auth::AuthConfig,
    error::{AppError, AppResult},
    models::{refresh_token, user, RefreshToken, User, UserModel},
    permission::Role,
    services::email::EmailService,
    utils::{
        encode_access_token, encode_refresh_token, hash_password,
        jwt::{hash_refresh_token, refresh_token_expiry_seconds},
        verify_password,
    },
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, TransactionTrait,
};

/// Fields of a new account.
pub struct Registration<'a> {
    pub name: &'a str,
    pub pen_name: Option<&'a str>,
    pub email: &'a str,
    pub password: &'a str,
}

/// An access/refresh pair handed to the client.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    db: DatabaseConnection,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AuthConfig::from_env(),
        }
    }

    /// Register a new account with role `user` and sign it in.
    pub async fn register(
        &self,
        registration: Registration<'_>,
        email_service: &EmailService,
    ) -> AppResult<(UserModel, TokenPair)> {
        let email = normalize_email(registration.email);
        if self.email_taken(&email).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(registration.password)?;
        let now = chrono::Utc::now().naive_utc();
        let (email_verified, verification_token, verification_expires) =
            if self.config.require_email_verification {
                let token = uuid::Uuid::new_v4().to_string();
                (false, Some(token), Some(now + MailToken::Verification.lifetime()))
            } else {
                (true, None, None)
            };

        let new_user = user::ActiveModel {
            name: Set(registration.name.trim().to_string()),
            pen_name: Set(
                registration
                    .pen_name
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            ),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(Role::User),
            bio: Set(None),
            email_verified: Set(email_verified),
            email_verification_token: Set(verification_token.clone()),
            email_verification_expires: Set(verification_expires),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = new_user.insert(&self.db).await?;
        let tokens = self.issue_tokens(&self.db, user.id).await?;

        if let Some(token) = verification_token {
            if let Err(e) = email_service
                .send_verification_email(&user.email, &token)
                .await
            {
                tracing::warn!("Failed to send verification email: {e}");
            }
        }

        tracing::info!(user_id = user.id, "User registered");
        Ok((user, tokens))
    }

    /// Unknown email and wrong password both come back as 401.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(UserModel, TokenPair)> {
        let user = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let tokens = self.issue_tokens(&self.db, user.id).await?;
        Ok((user, tokens))
    }

    /// Swap a stored refresh token for a new pair. The old token stops working.
    pub async fn rotate_refresh_token(
        &self,
        user_id: i32,
        current_refresh_token: &str,
    ) -> AppResult<TokenPair> {
        let now = chrono::Utc::now().naive_utc();

        let existing = RefreshToken::find()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Token.eq(hash_refresh_token(current_refresh_token)))
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if existing.expires_at <= now {
            RefreshToken::delete_by_id(existing.id).exec(&self.db).await?;
            return Err(AppError::Unauthorized);
        }

        let txn = self.db.begin().await?;
        let deleted = RefreshToken::delete_by_id(existing.id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            // lost a race with a concurrent rotation of the same token
            return Err(AppError::Unauthorized);
        }
        let tokens = self.issue_tokens(&txn, user_id).await?;
        txn.commit().await?;
        Ok(tokens)
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> AppResult<()> {
        RefreshToken::delete_many()
            .filter(refresh_token::Column::Token.eq(hash_refresh_token(refresh_token)))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn revoke_all_user_refresh_tokens(&self, user_id: i32) -> AppResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        let count = User::find()
            .filter(user::Column::Email.eq(email))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// Change the caller's password. Every session is signed out.
    pub async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        self.set_password(user, new_password).await
    }

    /// Overwrite a password without knowing the old one and revoke sessions.
    pub async fn set_password(&self, user: UserModel, new_password: &str) -> AppResult<()> {
        let user_id = user.id;
        let new_hash = hash_password(new_password)?;
        let now = chrono::Utc::now().naive_utc();

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        self.revoke_all_user_refresh_tokens(user_id).await?;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<()> {
        let user = self.redeem(MailToken::Verification, token).await?;

        let mut active: user::ActiveModel = user.into();
        active.email_verified = Set(true);
        active.email_verification_token = Set(None);
        active.email_verification_expires = Set(None);
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn resend_verification(
        &self,
        user_id: i32,
        email_service: &EmailService,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;
        if user.email_verified {
            return Err(AppError::Validation("Email is already verified".to_string()));
        }

        let (email, token) = self.stamp(MailToken::Verification, user).await?;
        if let Err(e) = email_service.send_verification_email(&email, &token).await {
            tracing::warn!(%email, "Verification mail not sent: {e}");
        }
        Ok(())
    }

    /// Start a password reset. Unknown addresses succeed silently.
    pub async fn forgot_password(
        &self,
        email: &str,
        email_service: &EmailService,
    ) -> AppResult<()> {
        let found = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?;
        let Some(user) = found else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(());
        };

        let (email, token) = self.stamp(MailToken::Reset, user).await?;
        if let Err(e) = email_service.send_password_reset_email(&email, &token).await {
            tracing::warn!(%email, "Reset mail not sent: {e}");
        }
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let user = self.redeem(MailToken::Reset, token).await?;
        self.set_password(user, new_password).await
    }

    /// Store a fresh mailed token on `user`. Returns `(email, token)`.
    async fn stamp(&self, kind: MailToken, user: UserModel) -> AppResult<(String, String)> {
        let token = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();
        let expires = Some(now + kind.lifetime());
        let email = user.email.clone();

        let mut active: user::ActiveModel = user.into();
        match kind {
            MailToken::Verification => {
                active.email_verification_token = Set(Some(token.clone()));
                active.email_verification_expires = Set(expires);
            }
            MailToken::Reset => {
                active.password_reset_token = Set(Some(token.clone()));
                active.password_reset_expires = Set(expires);
            }
        }
        active.updated_at = Set(now);
        active.update(&self.db).await?;
        Ok((email, token))
    }

    /// Look up the owner of a mailed token and reject it once expired.
    async fn redeem(&self, kind: MailToken, token: &str) -> AppResult<UserModel> {
        let column = match kind {
            MailToken::Verification => user::Column::EmailVerificationToken,
            MailToken::Reset => user::Column::PasswordResetToken,
        };
        let user = User::find()
            .filter(column.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Invalid {} token", kind.label())))?;

        let expires = match kind {
            MailToken::Verification => user.email_verification_expires,
            MailToken::Reset => user.password_reset_expires,
        };
        if expires.is_some_and(|at| chrono::Utc::now().naive_utc() > at) {
            return Err(AppError::Validation(format!(
                "{} token has expired",
                kind.label_capitalized()
            )));
        }
        Ok(user)
    }

    async fn issue_tokens<C: ConnectionTrait>(&self, conn: &C, user_id: i32) -> AppResult<TokenPair> {
        let access_token = encode_access_token(user_id)?;
        let refresh_token = encode_refresh_token(user_id)?;

        let now = chrono::Utc::now().naive_utc();
        let expires_at = now + chrono::Duration::seconds(refresh_token_expiry_seconds() as i64);
        refresh_token::ActiveModel {
            user_id: Set(user_id),
            token: Set(hash_refresh_token(&refresh_token)),
            expires_at: Set(expires_at),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Single-use tokens sent by mail.
#[derive(Debug, Clone, Copy)]
enum MailToken {
    Verification,
    Reset,
}

impl MailToken {
    fn lifetime(self) -> chrono::Duration {
        match self {
            MailToken::Verification => chrono::Duration::hours(24),
            MailToken::Reset => chrono::Duration::hours(1),
        }
    }

    fn label(self) -> &'static str {
        match self {
            MailToken::Verification => "verification",
            MailToken::Reset => "reset",
        }
    }

    fn label_capitalized(self) -> &'static str {
        match self {
            MailToken::Verification => "Verification",
            MailToken::Reset => "Reset",
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, MailToken};

    #[test]
    fn reset_tokens_are_short_lived() {
        assert!(MailToken::Reset.lifetime() < MailToken::Verification.lifetime());
        assert_eq!(MailToken::Reset.label(), "reset");
    }

    #[test]
    fn emails_compare_case_insensitively() {
        assert_eq!(normalize_email("  Li.Bai@Example.COM "), "li.bai@example.com");
    }
}

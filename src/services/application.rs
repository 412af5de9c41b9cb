use crate::{
    config::auth::AuthConfig,
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{
        application_review,
        author_application::{self, Attachments, Portfolio, PortfolioItem},
        ApplicationReview, ApplicationReviewModel, AuthorApplication, AuthorApplicationModel,
        User, UserModel,
    },
    permission::Permission,
    services::email::EmailService,
    workflow::{evaluate_transition, Actor, ApplicationStatus, Decision},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

pub const STATEMENT_MIN_CHARS: usize = 10;
pub const STATEMENT_MAX_CHARS: usize = 200;
pub const MAX_PORTFOLIO_ITEMS: usize = 10;
pub const MAX_ATTACHMENTS: usize = 5;

/// Applicant-editable part of an application.
#[derive(Debug, Clone)]
pub struct ApplicationContent {
    pub statement: String,
    pub portfolio: Vec<PortfolioItem>,
    pub attachments: Vec<String>,
}

impl ApplicationContent {
    /// Trim everything and check the limits.
    pub fn normalized(self) -> AppResult<Self> {
        let statement = self.statement.trim().to_string();
        let len = statement.chars().count();
        if !(STATEMENT_MIN_CHARS..=STATEMENT_MAX_CHARS).contains(&len) {
            return Err(AppError::Validation(format!(
                "Statement must be {STATEMENT_MIN_CHARS}-{STATEMENT_MAX_CHARS} characters"
            )));
        }

        if self.portfolio.len() > MAX_PORTFOLIO_ITEMS {
            return Err(AppError::Validation(format!(
                "At most {MAX_PORTFOLIO_ITEMS} portfolio entries are allowed"
            )));
        }
        let mut portfolio = Vec::with_capacity(self.portfolio.len());
        for item in self.portfolio {
            let title = item.title.trim();
            let content = item.content.trim();
            if title.is_empty() || content.is_empty() {
                return Err(AppError::Validation(
                    "Portfolio entries need a title and content".to_string(),
                ));
            }
            portfolio.push(PortfolioItem {
                title: title.to_string(),
                content: content.to_string(),
            });
        }

        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(AppError::Validation(format!(
                "At most {MAX_ATTACHMENTS} attachments are allowed"
            )));
        }
        let mut attachments = Vec::with_capacity(self.attachments.len());
        for url in self.attachments {
            let url = url.trim();
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AppError::Validation(format!(
                    "Attachment '{url}' is not an http(s) URL"
                )));
            }
            attachments.push(url.to_string());
        }

        Ok(Self {
            statement,
            portfolio,
            attachments,
        })
    }
}

pub struct ApplicationService {
    db: DatabaseConnection,
    config: AuthConfig,
}

impl ApplicationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AuthConfig::from_env(),
        }
    }

    /// Start a new draft. A user holds at most one open application, and an
    /// approved author has nothing left to apply for.
    pub async fn create(
        &self,
        user_id: i32,
        content: ApplicationContent,
    ) -> AppResult<AuthorApplicationModel> {
        let content = content.normalized()?;
        let now = chrono::Utc::now().naive_utc();

        let blocking = AuthorApplication::find()
            .filter(author_application::Column::UserId.eq(user_id))
            .filter(
                still_open(now)
                    .add(author_application::Column::Status.eq(ApplicationStatus::Approved)),
            )
            .one(&self.db)
            .await?;
        if let Some(blocking) = blocking {
            return Err(AppError::Conflict(format!(
                "You already have an application in status '{}'",
                blocking.status
            )));
        }

        let application = author_application::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            statement: sea_orm::ActiveValue::Set(content.statement),
            portfolio: sea_orm::ActiveValue::Set(Portfolio(content.portfolio)),
            attachments: sea_orm::ActiveValue::Set(Attachments(content.attachments)),
            status: sea_orm::ActiveValue::Set(ApplicationStatus::Draft),
            expires_at: sea_orm::ActiveValue::Set(
                now + chrono::Duration::days(self.config.application_ttl_days),
            ),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(application_id = application.id, user_id, "Author application created");
        Ok(application)
    }

    async fn find(&self, id: i32) -> AppResult<AuthorApplicationModel> {
        AuthorApplication::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn reviews_for(&self, application_id: i32) -> AppResult<Vec<ApplicationReviewModel>> {
        let reviews = ApplicationReview::find()
            .filter(application_review::Column::ApplicationId.eq(application_id))
            .order_by_asc(application_review::Column::CreatedAt)
            .order_by_asc(application_review::Column::Id)
            .all(&self.db)
            .await?;
        Ok(reviews)
    }

    /// The user's most recent application with its review history.
    pub async fn latest_for_user(
        &self,
        user_id: i32,
    ) -> AppResult<Option<(AuthorApplicationModel, Vec<ApplicationReviewModel>)>> {
        let Some(application) = AuthorApplication::find()
            .filter(author_application::Column::UserId.eq(user_id))
            .order_by_desc(author_application::Column::CreatedAt)
            .order_by_desc(author_application::Column::Id)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let reviews = self.reviews_for(application.id).await?;
        Ok(Some((application, reviews)))
    }

    /// Visible to the applicant and to application reviewers.
    pub async fn get_for(
        &self,
        id: i32,
        user: &AuthUser,
    ) -> AppResult<(AuthorApplicationModel, Vec<ApplicationReviewModel>)> {
        let application = self.find(id).await?;
        if application.user_id != user.user_id {
            user.require(Permission::ReviewApplications)?;
        }
        let reviews = self.reviews_for(id).await?;
        Ok((application, reviews))
    }

    pub async fn update_content(
        &self,
        id: i32,
        user_id: i32,
        content: ApplicationContent,
    ) -> AppResult<AuthorApplicationModel> {
        let existing = self.find(id).await?;
        if existing.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        if !existing.status.is_editable() {
            return Err(AppError::Conflict(format!(
                "Application is '{}' and can no longer be edited",
                existing.status
            )));
        }
        let content = content.normalized()?;

        let mut active: author_application::ActiveModel = existing.into();
        active.statement = sea_orm::ActiveValue::Set(content.statement);
        active.portfolio = sea_orm::ActiveValue::Set(Portfolio(content.portfolio));
        active.attachments = sea_orm::ActiveValue::Set(Attachments(content.attachments));
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;
        Ok(updated)
    }

    /// Move an application along its lifecycle.
    ///
    /// The status write and the review entry are committed together. When
    /// the application was changed by someone else in the meantime nothing
    /// is written and the call fails with a conflict.
    pub async fn change_status(
        &self,
        id: i32,
        user: &AuthUser,
        requested: ApplicationStatus,
        feedback: Option<&str>,
        email_service: &EmailService,
    ) -> AppResult<(AuthorApplicationModel, Option<ApplicationReviewModel>)> {
        let existing = self.find(id).await?;
        let actor = Actor {
            user_id: user.user_id,
            role: user.role,
            is_owner: existing.user_id == user.user_id,
        };
        let now = chrono::Utc::now().naive_utc();
        let decision = evaluate_transition(existing.status, requested, &actor, feedback, now)?;

        if is_applicant_submission(&decision) {
            if existing.is_expired(now) {
                return Err(AppError::Validation(format!(
                    "Application expired on {}; start a new one",
                    existing.expires_at.date()
                )));
            }
            self.ensure_no_other_open(&existing, now).await?;
        }

        let txn = self.db.begin().await?;
        let result = AuthorApplication::update_many()
            .col_expr(author_application::Column::Status, Expr::value(decision.to))
            .col_expr(author_application::Column::UpdatedAt, Expr::value(decision.at))
            .filter(author_application::Column::Id.eq(id))
            .filter(author_application::Column::Status.eq(decision.from))
            .exec(&txn)
            .await
            .map_err(map_unique_violation)?;
        if result.rows_affected == 0 {
            return Err(AppError::Conflict(
                "Application status changed concurrently, reload and retry".to_string(),
            ));
        }

        let review = match &decision.audit {
            Some(audit) => Some(
                application_review::ActiveModel {
                    application_id: sea_orm::ActiveValue::Set(id),
                    reviewer_id: sea_orm::ActiveValue::Set(audit.reviewer_id),
                    action: sea_orm::ActiveValue::Set(audit.action),
                    from_status: sea_orm::ActiveValue::Set(decision.from),
                    to_status: sea_orm::ActiveValue::Set(decision.to),
                    feedback: sea_orm::ActiveValue::Set(audit.feedback.clone()),
                    created_at: sea_orm::ActiveValue::Set(audit.at),
                    ..Default::default()
                }
                .insert(&txn)
                .await?,
            ),
            None => None,
        };
        txn.commit().await?;

        tracing::info!(
            application_id = id,
            by = user.user_id,
            from = %decision.from,
            to = %decision.to,
            "Application status changed"
        );

        let updated = self.find(id).await?;
        if let Some(review) = &review {
            self.notify_applicant(&updated, review, email_service).await;
        }
        Ok((updated, review))
    }

    /// Reviewer queue, oldest first.
    pub async fn list(
        &self,
        status: Option<ApplicationStatus>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<(AuthorApplicationModel, Option<UserModel>)>, u64)> {
        let mut query = AuthorApplication::find();
        if let Some(status) = status {
            query = query.filter(author_application::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_asc(author_application::Column::CreatedAt)
            .order_by_asc(author_application::Column::Id)
            .find_also_related(User)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }

    async fn ensure_no_other_open(
        &self,
        application: &AuthorApplicationModel,
        now: chrono::NaiveDateTime,
    ) -> AppResult<()> {
        let others = AuthorApplication::find()
            .filter(author_application::Column::UserId.eq(application.user_id))
            .filter(author_application::Column::Id.ne(application.id))
            .filter(still_open(now))
            .count(&self.db)
            .await?;
        if others > 0 {
            return Err(AppError::Conflict(
                "Another application of yours is still open".to_string(),
            ));
        }
        Ok(())
    }

    async fn notify_applicant(
        &self,
        application: &AuthorApplicationModel,
        review: &ApplicationReviewModel,
        email_service: &EmailService,
    ) {
        let applicant = match User::find_by_id(application.user_id).one(&self.db).await {
            Ok(Some(applicant)) => applicant,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to load applicant for notification: {e}");
                return;
            }
        };
        if let Err(e) = email_service
            .send_application_decision_email(
                &applicant.email,
                review.to_status,
                review.feedback.as_deref(),
            )
            .await
        {
            tracing::warn!("Failed to send application decision email: {e}");
        }
    }
}

/// The applicant sending a draft or a rejected application to the queue.
fn is_applicant_submission(decision: &Decision<ApplicationStatus>) -> bool {
    decision.to == ApplicationStatus::Submitted && decision.audit.is_none()
}

/// The partial unique index allows a single submitted application per user.
fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(
            "Another application of yours is already submitted".to_string(),
        ),
        _ => AppError::Database(err),
    }
}

/// Applications that still count against the one-open-application rule.
/// A draft past `expires_at` can never be submitted, so it no longer counts.
fn still_open(now: chrono::NaiveDateTime) -> Condition {
    use author_application::Column;

    let in_review = ApplicationStatus::OPEN
        .iter()
        .copied()
        .filter(|status| *status != ApplicationStatus::Draft);
    Condition::any().add(Column::Status.is_in(in_review)).add(
        Condition::all()
            .add(Column::Status.eq(ApplicationStatus::Draft))
            .add(Column::ExpiresAt.gt(now)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(statement: &str) -> ApplicationContent {
        ApplicationContent {
            statement: statement.to_string(),
            portfolio: vec![],
            attachments: vec![],
        }
    }

    #[test]
    fn statement_length_counts_characters() {
        // ten CJK characters satisfy the minimum
        assert!(content("我愿以诗歌记录生活").normalized().is_err());
        assert!(content("我愿以诗歌记录生活。").normalized().is_ok());
        assert!(content(&"a".repeat(201)).normalized().is_err());
    }

    #[test]
    fn statement_is_trimmed_before_checking() {
        let normalized = content("   I write sonnets daily.   ").normalized().unwrap();
        assert_eq!(normalized.statement, "I write sonnets daily.");
        assert!(content("   short    ").normalized().is_err());
    }

    #[test]
    fn attachments_must_be_web_urls() {
        let mut c = content("I write sonnets daily.");
        c.attachments = vec!["ftp://example.com/a.pdf".to_string()];
        assert!(c.clone().normalized().is_err());
        c.attachments = vec![" https://example.com/a.pdf ".to_string()];
        assert_eq!(
            c.normalized().unwrap().attachments,
            vec!["https://example.com/a.pdf"]
        );
    }

    #[test]
    fn portfolio_limits() {
        let item = PortfolioItem {
            title: "Spring".to_string(),
            content: "Blossoms fall".to_string(),
        };
        let mut c = content("I write sonnets daily.");
        c.portfolio = vec![item.clone(); MAX_PORTFOLIO_ITEMS + 1];
        assert!(c.clone().normalized().is_err());
        c.portfolio = vec![PortfolioItem {
            title: " ".to_string(),
            content: "x".to_string(),
        }];
        assert!(c.normalized().is_err());
    }

    #[test]
    fn only_unaudited_submissions_are_applicant_submissions() {
        let now = chrono::Utc::now().naive_utc();
        let submit = Decision {
            from: ApplicationStatus::Rejected,
            to: ApplicationStatus::Submitted,
            at: now,
            audit: None,
        };
        assert!(is_applicant_submission(&submit));

        let request_changes = Decision {
            from: ApplicationStatus::UnderReview,
            to: ApplicationStatus::Submitted,
            at: now,
            audit: Some(crate::workflow::AuditEntry {
                reviewer_id: 9,
                action: crate::workflow::ReviewAction::RequestChanges,
                feedback: None,
                at: now,
            }),
        };
        assert!(!is_applicant_submission(&request_changes));
    }
}

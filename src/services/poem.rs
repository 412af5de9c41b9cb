use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{poem, poem::Tags, user, Poem, PoemModel, User, UserModel},
    permission::Permission,
    services::cache::{poem_key, CacheService, POEM_CACHE_TTL_SECS},
    utils::{detect_language, Language},
    workflow::{evaluate_transition, Actor, PoemStatus},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use std::collections::HashMap;

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 30;

#[derive(Debug, Default, Clone)]
pub struct PoemFilter {
    pub language: Option<Language>,
    pub tag: Option<String>,
    pub author_id: Option<i32>,
}

#[derive(Debug)]
pub struct NewPoem {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub language: Option<Language>,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PoemEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoemStats {
    pub likes: u64,
    pub comments: u64,
}

pub struct PoemService {
    db: DatabaseConnection,
    cache: Option<CacheService>,
}

impl PoemService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, cache: None }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Published poems, newest first.
    pub async fn list_published(
        &self,
        filter: &PoemFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PoemModel>, u64)> {
        let mut query = Poem::find().filter(poem::Column::Status.eq(PoemStatus::Published));
        if let Some(language) = filter.language {
            query = query.filter(poem::Column::Language.eq(language));
        }
        if let Some(author_id) = filter.author_id {
            query = query.filter(poem::Column::AuthorId.eq(author_id));
        }
        if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(Expr::cust_with_values(
                "tags @> jsonb_build_array(CAST($1 AS TEXT))",
                [tag.to_string()],
            ));
        }

        let paginator = query
            .order_by_desc(poem::Column::CreatedAt)
            .order_by_desc(poem::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let poems = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((poems, total))
    }

    /// The caller's own poems, most recently touched first.
    pub async fn list_by_author(
        &self,
        author_id: i32,
        status: Option<PoemStatus>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PoemModel>, u64)> {
        let mut query = Poem::find().filter(poem::Column::AuthorId.eq(author_id));
        if let Some(status) = status {
            query = query.filter(poem::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(poem::Column::UpdatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let poems = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((poems, total))
    }

    /// Review queue: oldest first so nothing waits forever.
    pub async fn list_by_status(
        &self,
        status: PoemStatus,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PoemModel>, u64)> {
        let paginator = Poem::find()
            .filter(poem::Column::Status.eq(status))
            .order_by_asc(poem::Column::UpdatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let poems = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((poems, total))
    }

    async fn find(&self, id: i32) -> AppResult<PoemModel> {
        Poem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// A poem as seen by `viewer`. Poems the viewer may not see are reported
    /// as missing.
    pub async fn get_visible(&self, id: i32, viewer: Option<&AuthUser>) -> AppResult<PoemModel> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<PoemModel>(&poem_key(id)).await {
                // a reader can re-cache a copy that a concurrent write already replaced
                let live: Option<(PoemStatus, chrono::NaiveDateTime)> = Poem::find_by_id(id)
                    .select_only()
                    .column(poem::Column::Status)
                    .column(poem::Column::UpdatedAt)
                    .into_tuple()
                    .one(&self.db)
                    .await?;
                match live {
                    Some((status, updated_at))
                        if cached_copy_is_current(&cached, status, updated_at) =>
                    {
                        return Ok(cached);
                    }
                    Some(_) => cache.invalidate(&poem_key(id)).await,
                    None => {
                        cache.invalidate(&poem_key(id)).await;
                        return Err(AppError::NotFound);
                    }
                }
            }
        }

        let poem = self.find(id).await?;
        if !can_view(&poem, viewer) {
            return Err(AppError::NotFound);
        }

        if poem.status == PoemStatus::Published {
            if let Some(cache) = &self.cache {
                cache.set(&poem_key(id), &poem, POEM_CACHE_TTL_SECS).await;
            }
        }
        Ok(poem)
    }

    /// A published poem that `user` may like or comment on.
    pub async fn get_interactable(&self, id: i32, user: &AuthUser) -> AppResult<PoemModel> {
        let poem = self.get_visible(id, Some(user)).await?;
        if poem.status != PoemStatus::Published {
            return Err(AppError::Validation(
                "Only published poems accept likes and comments".to_string(),
            ));
        }
        Ok(poem)
    }

    /// Create a draft. Language falls back to detection on the content.
    pub async fn create(&self, author_id: i32, input: NewPoem) -> AppResult<PoemModel> {
        let title = required_text(&input.title, "Title")?;
        let content = required_text(&input.content, "Content")?;
        let tags = normalize_tags(input.tags)?;
        let language = input.language.unwrap_or_else(|| detect_language(&content));
        let now = chrono::Utc::now().naive_utc();

        let poem = poem::ActiveModel {
            author_id: sea_orm::ActiveValue::Set(author_id),
            title: sea_orm::ActiveValue::Set(title),
            content: sea_orm::ActiveValue::Set(content),
            status: sea_orm::ActiveValue::Set(PoemStatus::Draft),
            language: sea_orm::ActiveValue::Set(language),
            tags: sea_orm::ActiveValue::Set(Tags(tags)),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::debug!(poem_id = poem.id, author_id, %language, "Poem created");
        Ok(poem)
    }

    /// Authors edit drafts only; a submitted or published poem has to be
    /// moved back to draft first.
    pub async fn update(&self, id: i32, user: &AuthUser, edit: PoemEdit) -> AppResult<PoemModel> {
        let existing = self.get_visible(id, Some(user)).await?;
        if existing.author_id != user.user_id {
            return Err(AppError::Forbidden);
        }
        if existing.status != PoemStatus::Draft {
            return Err(AppError::Conflict(format!(
                "Poem is '{}'; only drafts can be edited",
                existing.status
            )));
        }

        let mut active: poem::ActiveModel = existing.into();
        if let Some(title) = edit.title {
            active.title = sea_orm::ActiveValue::Set(required_text(&title, "Title")?);
        }
        if let Some(content) = edit.content {
            let content = required_text(&content, "Content")?;
            if edit.language.is_none() {
                active.language = sea_orm::ActiveValue::Set(detect_language(&content));
            }
            active.content = sea_orm::ActiveValue::Set(content);
        }
        if let Some(language) = edit.language {
            active.language = sea_orm::ActiveValue::Set(language);
        }
        if let Some(tags) = edit.tags {
            active.tags = sea_orm::ActiveValue::Set(Tags(normalize_tags(tags)?));
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&self.db).await?;
        self.invalidate(id).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i32, user: &AuthUser) -> AppResult<()> {
        let existing = self.get_visible(id, Some(user)).await?;
        if existing.author_id != user.user_id && !user.can(Permission::DeleteAnyPoem) {
            return Err(AppError::Forbidden);
        }

        Poem::delete_by_id(id).exec(&self.db).await?;
        self.invalidate(id).await;
        tracing::info!(poem_id = id, by = user.user_id, "Poem deleted");
        Ok(())
    }

    /// Move a poem along its lifecycle on behalf of `user`.
    pub async fn change_status(
        &self,
        id: i32,
        user: &AuthUser,
        requested: PoemStatus,
    ) -> AppResult<PoemModel> {
        let existing = self.get_visible(id, Some(user)).await?;
        let actor = Actor {
            user_id: user.user_id,
            role: user.role,
            is_owner: existing.author_id == user.user_id,
        };
        let now = chrono::Utc::now().naive_utc();
        let decision = evaluate_transition(existing.status, requested, &actor, None, now)?;

        let result = Poem::update_many()
            .col_expr(poem::Column::Status, Expr::value(decision.to))
            .col_expr(poem::Column::UpdatedAt, Expr::value(decision.at))
            .filter(poem::Column::Id.eq(id))
            .filter(poem::Column::Status.eq(decision.from))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Conflict(
                "Poem status changed concurrently, reload and retry".to_string(),
            ));
        }
        self.invalidate(id).await;

        tracing::info!(
            poem_id = id,
            by = user.user_id,
            from = %decision.from,
            to = %decision.to,
            "Poem status changed"
        );
        self.find(id).await
    }

    /// Flip the caller's like. Returns whether the poem is now liked and the
    /// new like count.
    pub async fn toggle_like(&self, id: i32, user: &AuthUser) -> AppResult<(bool, u64)> {
        self.get_interactable(id, user).await?;

        let removed = self
            .db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "DELETE FROM poem_likes WHERE poem_id = $1 AND user_id = $2",
                vec![id.into(), user.user_id.into()],
            ))
            .await?;

        let liked = if removed.rows_affected() > 0 {
            false
        } else {
            self.db
                .execute(Statement::from_sql_and_values(
                    sea_orm::DatabaseBackend::Postgres,
                    "INSERT INTO poem_likes (poem_id, user_id, created_at)
                     VALUES ($1, $2, NOW())
                     ON CONFLICT (poem_id, user_id) DO NOTHING",
                    vec![id.into(), user.user_id.into()],
                ))
                .await?;
            true
        };

        let likes = self
            .stats_for(&[id])
            .await?
            .get(&id)
            .map(|s| s.likes)
            .unwrap_or(0);
        Ok((liked, likes))
    }

    pub async fn has_liked(&self, id: i32, user_id: i32) -> AppResult<bool> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT 1 FROM poem_likes WHERE poem_id = $1 AND user_id = $2",
                vec![id.into(), user_id.into()],
            ))
            .await?;
        Ok(row.is_some())
    }

    /// Like and comment counts for a batch of poems.
    pub async fn stats_for(&self, poem_ids: &[i32]) -> AppResult<HashMap<i32, PoemStats>> {
        let mut stats: HashMap<i32, PoemStats> = HashMap::new();
        if poem_ids.is_empty() {
            return Ok(stats);
        }

        let placeholders: Vec<String> = (1..=poem_ids.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "SELECT poem_id, 'like' AS kind, COUNT(*) FROM poem_likes \
                WHERE poem_id IN ({list}) GROUP BY poem_id \
             UNION ALL \
             SELECT poem_id, 'comment' AS kind, COUNT(*) FROM poem_comments \
                WHERE poem_id IN ({list}) GROUP BY poem_id",
            list = placeholders.join(", ")
        );
        let values: Vec<sea_orm::Value> = poem_ids.iter().map(|&id| id.into()).collect();

        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                &sql,
                values,
            ))
            .await?;

        for row in rows {
            let poem_id: i32 = row.try_get_by_index(0)?;
            let kind: String = row.try_get_by_index(1)?;
            let count: i64 = row.try_get_by_index(2)?;
            let entry = stats.entry(poem_id).or_default();
            match kind.as_str() {
                "like" => entry.likes = count as u64,
                _ => entry.comments = count as u64,
            }
        }
        Ok(stats)
    }

    pub async fn authors_for(&self, poems: &[PoemModel]) -> AppResult<HashMap<i32, UserModel>> {
        let mut ids: Vec<i32> = poems.iter().map(|p| p.author_id).collect();
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

    async fn invalidate(&self, id: i32) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&poem_key(id)).await;
        }
    }
}

/// A cached poem may be served only while the stored row is still published
/// and unchanged since it was cached.
fn cached_copy_is_current(
    cached: &PoemModel,
    status: PoemStatus,
    updated_at: chrono::NaiveDateTime,
) -> bool {
    status == PoemStatus::Published
        && cached.status == PoemStatus::Published
        && cached.updated_at == updated_at
}

/// Published poems are public; anything else only to its author and to
/// reviewers.
pub fn can_view(poem: &PoemModel, viewer: Option<&AuthUser>) -> bool {
    if poem.status == PoemStatus::Published {
        return true;
    }
    viewer.is_some_and(|v| v.user_id == poem.author_id || v.can(Permission::ReviewPoems))
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(AppError::Validation(format!(
                "Tag '{tag}' is longer than {MAX_TAG_CHARS} characters"
            )));
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "A poem can have at most {MAX_TAGS} tags"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Role;

    fn poem(status: PoemStatus, author_id: i32) -> PoemModel {
        let now = chrono::Utc::now().naive_utc();
        PoemModel {
            id: 1,
            author_id,
            title: "静夜思".to_string(),
            content: "床前明月光，疑是地上霜。".to_string(),
            status,
            language: Language::Zh,
            tags: Tags(vec!["唐诗".to_string()]),
            created_at: now,
            updated_at: now,
        }
    }

    fn viewer(user_id: i32, role: Role) -> AuthUser {
        AuthUser { user_id, role }
    }

    #[test]
    fn published_is_public() {
        assert!(can_view(&poem(PoemStatus::Published, 1), None));
    }

    #[test]
    fn drafts_are_private_to_author_and_reviewers() {
        let draft = poem(PoemStatus::Draft, 1);
        assert!(!can_view(&draft, None));
        assert!(can_view(&draft, Some(&viewer(1, Role::User))));
        assert!(!can_view(&draft, Some(&viewer(2, Role::User))));
        assert!(can_view(&draft, Some(&viewer(2, Role::Moderator))));
    }

    #[test]
    fn cached_copy_served_only_while_row_is_unchanged() {
        let cached = poem(PoemStatus::Published, 1);
        let stamp = cached.updated_at;
        assert!(cached_copy_is_current(&cached, PoemStatus::Published, stamp));

        // withdrawn for review after the copy was cached
        let later = stamp + chrono::Duration::seconds(1);
        assert!(!cached_copy_is_current(&cached, PoemStatus::UnderReview, later));
        // same status, edited since
        assert!(!cached_copy_is_current(&cached, PoemStatus::Published, later));
        // stale status even with a matching stamp
        assert!(!cached_copy_is_current(&cached, PoemStatus::Draft, stamp));
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags(vec![
            " moon ".to_string(),
            "".to_string(),
            "moon".to_string(),
            "frost".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["moon", "frost"]);
    }

    #[test]
    fn too_many_tags_rejected() {
        let tags = (0..11).map(|i| format!("t{i}")).collect();
        assert!(matches!(normalize_tags(tags), Err(AppError::Validation(_))));
    }

    #[test]
    fn long_tag_rejected_by_char_count() {
        // 30 CJK characters are fine even though they are 90 bytes
        assert!(normalize_tags(vec!["诗".repeat(30)]).is_ok());
        assert!(normalize_tags(vec!["诗".repeat(31)]).is_err());
    }
}

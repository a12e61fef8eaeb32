use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::store::{
        BookFilter, BookQuery, BookSort, CatalogStore, DUPLICATE_EMAIL, DUPLICATE_REVIEW,
    },
    error::{AppError, AppResult},
    models::{
        Activity, ActivityView, Book, BookSummary, Genre, GenreCount, ReadingProgress, Review,
        ReviewScope, ReviewStatus, ReviewView, Role, Shelves, User, UserSummary,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Maps a UNIQUE constraint violation to a 400 carrying `message`
fn unique_violation_as(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::InvalidInput(message.to_string());
            }
        }
        AppError::Database(e)
    }
}

const BOOK_COLUMNS: &str = "id, title, author, genre, description, cover_image, added_by, \
     average_rating, rating_count, shelved_count, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, photo, reading_goal, \
     want_to_read, read, currently_reading, created_at, updated_at";

const REVIEW_COLUMNS: &str =
    "id, user_id, book_id, rating, content, status, created_at, updated_at";

/// Escapes LIKE metacharacters and wraps the keyword for substring matching
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_book_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    builder.push(" WHERE TRUE");
    if let Some(ids) = &filter.ids {
        builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if !filter.exclude_ids.is_empty() {
        builder
            .push(" AND NOT (id = ANY(")
            .push_bind(filter.exclude_ids.clone())
            .push("))");
    }
    if let Some(genres) = &filter.genres {
        builder
            .push(" AND genre = ANY(")
            .push_bind(genres.clone())
            .push(")");
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR author ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filter.min_rating {
        builder.push(" AND average_rating >= ").push_bind(min);
    }
    if let Some(max) = filter.max_rating {
        builder.push(" AND average_rating <= ").push_bind(max);
    }
    if let Some(min) = filter.min_rating_count {
        builder.push(" AND rating_count >= ").push_bind(min);
    }
}

fn order_clause(sort: BookSort) -> &'static str {
    match sort {
        BookSort::Natural => " ORDER BY seq",
        BookSort::Newest => " ORDER BY created_at DESC, seq DESC",
        BookSort::Rating => " ORDER BY average_rating DESC, rating_count DESC, seq",
        BookSort::MostShelved => " ORDER BY shelved_count DESC, created_at DESC, seq DESC",
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    photo: String,
    reading_goal: i32,
    want_to_read: Vec<Uuid>,
    read: Vec<Uuid>,
    currently_reading: Json<Vec<ReadingProgress>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row
                .role
                .parse::<Role>()
                .map_err(|e| AppError::Internal(format!("Corrupt user row: {}", e)))?,
            photo: row.photo,
            reading_goal: row.reading_goal,
            shelves: Shelves {
                want_to_read: row.want_to_read,
                currently_reading: row.currently_reading.0,
                read: row.read,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    rating: i32,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> AppResult<Self> {
        Ok(Review {
            id: row.id,
            user: row.user_id,
            book: row.book_id,
            rating: row.rating,
            content: row.content,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewViewRow {
    id: Uuid,
    rating: i32,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    user_name: String,
    user_photo: String,
    book_id: Uuid,
    book_title: String,
    book_cover_image: String,
}

impl TryFrom<ReviewViewRow> for ReviewView {
    type Error = AppError;

    fn try_from(row: ReviewViewRow) -> AppResult<Self> {
        Ok(ReviewView {
            id: row.id,
            user: UserSummary {
                id: row.user_id,
                name: row.user_name,
                photo: Some(row.user_photo),
            },
            book: BookSummary {
                id: row.book_id,
                title: row.book_title,
                cover_image: Some(row.book_cover_image),
            },
            rating: row.rating,
            content: row.content,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActivityViewRow {
    id: Uuid,
    kind: String,
    details: String,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    user_name: String,
    user_photo: String,
    book_id: Uuid,
    book_title: String,
    book_cover_image: String,
}

impl TryFrom<ActivityViewRow> for ActivityView {
    type Error = AppError;

    fn try_from(row: ActivityViewRow) -> AppResult<Self> {
        Ok(ActivityView {
            id: row.id,
            user: UserSummary {
                id: row.user_id,
                name: row.user_name,
                photo: Some(row.user_photo),
            },
            book: BookSummary {
                id: row.book_id,
                title: row.book_title,
                cover_image: Some(row.book_cover_image),
            },
            kind: row.kind.parse()?,
            details: row.details,
            timestamp: row.created_at,
        })
    }
}

/// Catalog store backed by PostgreSQL
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_book_filter(&mut builder, &query.filter);
        builder.push(order_clause(query.sort));
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }
        if query.offset > 0 {
            builder.push(" OFFSET ").push_bind(query.offset);
        }

        let books = builder
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn count_books(&self, filter: &BookFilter) -> AppResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_book_filter(&mut builder, filter);
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn get_book(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn insert_book(&self, book: &Book) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO books (id, title, author, genre, description, cover_image, added_by, \
             average_rating, rating_count, shelved_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(book.added_by)
        .bind(book.average_rating)
        .bind(book.rating_count)
        .bind(book.shelved_count)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_book(&self, book: &Book) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET title = $2, author = $3, genre = $4, description = $5, \
             cover_image = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_book(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_shelved_count(&self, id: Uuid, delta: i64) -> AppResult<()> {
        sqlx::query("UPDATE books SET shelved_count = GREATEST(shelved_count + $2, 0) WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_book_rating(
        &self,
        id: Uuid,
        average_rating: f64,
        rating_count: i64,
    ) -> AppResult<()> {
        sqlx::query("UPDATE books SET average_rating = $2, rating_count = $3 WHERE id = $1")
            .bind(id)
            .bind(average_rating)
            .bind(rating_count)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn genre_distribution(&self) -> AppResult<Vec<GenreCount>> {
        let counts = sqlx::query_as::<_, GenreCount>(
            "SELECT genre AS name, COUNT(*) AS value FROM books \
             GROUP BY genre ORDER BY value DESC, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn count_users(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, photo, reading_goal, \
             want_to_read, read, currently_reading, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.photo)
        .bind(user.reading_goal)
        .bind(&user.shelves.want_to_read)
        .bind(&user.shelves.read)
        .bind(Json(&user.shelves.currently_reading))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation_as(DUPLICATE_EMAIL))?;
        Ok(())
    }

    async fn save_shelves(&self, user_id: Uuid, shelves: &Shelves) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET want_to_read = $2, read = $3, currently_reading = $4, \
             updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(&shelves.want_to_read)
        .bind(&shelves.read)
        .bind(Json(&shelves.currently_reading))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reading_goal(&self, id: Uuid, goal: i32) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE users SET reading_goal = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(goal)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Review::try_from)
        .transpose()
    }

    async fn find_review(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE user_id = $1 AND book_id = $2",
            REVIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Review::try_from)
        .transpose()
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO reviews (id, user_id, book_id, rating, content, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(review.id)
        .bind(review.user)
        .bind(review.book)
        .bind(review.rating)
        .bind(&review.content)
        .bind(review.status.as_str())
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation_as(DUPLICATE_REVIEW))?;
        Ok(())
    }

    async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE reviews SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn approved_ratings(&self, book_id: Uuid) -> AppResult<Vec<i32>> {
        let ratings = sqlx::query_scalar(
            "SELECT rating FROM reviews WHERE book_id = $1 AND status = 'approved'",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    async fn approved_books_reviewed_by(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let books = sqlx::query_scalar(
            "SELECT book_id FROM reviews WHERE user_id = $1 AND status = 'approved'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn approved_review_counts(&self, book_ids: &[Uuid]) -> AppResult<HashMap<Uuid, u64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT book_id, COUNT(*) FROM reviews \
             WHERE status = 'approved' AND book_id = ANY($1) GROUP BY book_id",
        )
        .bind(book_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(book_id, count)| (book_id, count as u64))
            .collect())
    }

    async fn count_reviews(&self, status: Option<ReviewStatus>) -> AppResult<u64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE status = $1")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count as u64)
    }

    async fn review_views(&self, scope: ReviewScope) -> AppResult<Vec<ReviewView>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT r.id, r.rating, r.content, r.status, r.created_at, \
             u.id AS user_id, u.name AS user_name, u.photo AS user_photo, \
             b.id AS book_id, b.title AS book_title, b.cover_image AS book_cover_image \
             FROM reviews r \
             JOIN users u ON u.id = r.user_id \
             JOIN books b ON b.id = r.book_id",
        );
        match scope {
            ReviewScope::ApprovedForBook(book_id) => {
                builder
                    .push(" WHERE r.status = 'approved' AND r.book_id = ")
                    .push_bind(book_id);
            }
            ReviewScope::Pending => {
                builder.push(" WHERE r.status = 'pending'");
            }
        }
        builder.push(" ORDER BY r.created_at");

        builder
            .build_query_as::<ReviewViewRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ReviewView::try_from)
            .collect()
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, created_at FROM genres ORDER BY created_at, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let genre =
            sqlx::query_as::<_, Genre>("SELECT id, name, created_at FROM genres WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(genre)
    }

    async fn insert_genres(&self, genres: &[Genre]) -> AppResult<()> {
        if genres.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO genres (id, name, created_at) ");
        builder.push_values(genres, |mut row, genre| {
            row.push_bind(genre.id)
                .push_bind(genre.name.clone())
                .push_bind(genre.created_at);
        });
        builder.push(" ON CONFLICT (name) DO NOTHING");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_genre(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_activity(&self, activity: &Activity) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activities (id, user_id, book_id, kind, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(activity.id)
        .bind(activity.user)
        .bind(activity.book)
        .bind(activity.kind.as_str())
        .bind(&activity.details)
        .bind(activity.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_activities(&self, limit: i64) -> AppResult<Vec<ActivityView>> {
        sqlx::query_as::<_, ActivityViewRow>(
            "SELECT a.id, a.kind, a.details, a.created_at, \
             u.id AS user_id, u.name AS user_name, u.photo AS user_photo, \
             b.id AS book_id, b.title AS book_title, b.cover_image AS book_cover_image \
             FROM activities a \
             JOIN users u ON u.id = a.user_id \
             JOIN books b ON b.id = a.book_id \
             ORDER BY a.created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ActivityView::try_from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("dune"), "%dune%");
        assert_eq!(like_pattern("100%_real"), "%100\\%\\_real%");
    }

    #[test]
    fn test_filter_sql_binds_every_constraint() {
        let filter = BookFilter::default()
            .excluding([Uuid::nil()])
            .in_genres(["Mystery".to_string()])
            .min_rating(3.5)
            .min_rating_count(1);
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM books");
        push_book_filter(&mut builder, &filter);
        builder.push(order_clause(BookSort::Rating));

        assert_eq!(
            builder.sql(),
            "SELECT id FROM books WHERE TRUE AND NOT (id = ANY($1)) AND genre = ANY($2) \
             AND average_rating >= $3 AND rating_count >= $4 \
             ORDER BY average_rating DESC, rating_count DESC, seq"
        );
    }
}

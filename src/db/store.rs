//! Catalog store abstraction
//!
//! Every service reaches persistence through this trait, so the same business
//! logic runs against PostgreSQL in deployment and the in-memory store in
//! development and tests. Each method is a single store call; callers get no
//! transactional guarantees across calls.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Activity, ActivityView, Book, Genre, GenreCount, Review, ReviewScope, ReviewStatus,
        ReviewView, Role, Shelves, User,
    },
};

/// Predicate over books. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    /// Only books with one of these ids
    pub ids: Option<Vec<Uuid>>,
    /// Never books with one of these ids
    pub exclude_ids: Vec<Uuid>,
    /// Only books whose genre is one of these
    pub genres: Option<Vec<String>>,
    /// Case-insensitive substring of title or author
    pub keyword: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub min_rating_count: Option<i64>,
}

impl BookFilter {
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn in_genres(mut self, genres: impl IntoIterator<Item = String>) -> Self {
        self.genres = Some(genres.into_iter().collect());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn max_rating(mut self, rating: f64) -> Self {
        self.max_rating = Some(rating);
        self
    }

    pub fn min_rating_count(mut self, count: i64) -> Self {
        self.min_rating_count = Some(count);
        self
    }

    /// Evaluates the filter against one book
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&book.id) {
                return false;
            }
        }
        if self.exclude_ids.contains(&book.id) {
            return false;
        }
        if let Some(genres) = &self.genres {
            if !genres.iter().any(|g| *g == book.genre) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let keyword = keyword.to_lowercase();
            if !book.title.to_lowercase().contains(&keyword)
                && !book.author.to_lowercase().contains(&keyword)
            {
                return false;
            }
        }
        if self.min_rating.is_some_and(|min| book.average_rating < min) {
            return false;
        }
        if self.max_rating.is_some_and(|max| book.average_rating > max) {
            return false;
        }
        if self
            .min_rating_count
            .is_some_and(|min| book.rating_count < min)
        {
            return false;
        }
        true
    }
}

/// Result ordering for book queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookSort {
    /// Insertion order
    #[default]
    Natural,
    /// Most recently added first
    Newest,
    /// Highest average rating first, ties broken by rating count
    Rating,
    /// Most shelved first, ties broken by recency
    MostShelved,
}

/// A filtered, ordered, optionally paginated book query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookQuery {
    pub filter: BookFilter,
    pub sort: BookSort,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl BookQuery {
    pub fn new(filter: BookFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, sort: BookSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for catalog persistence backends
/// `InvalidInput` message for a second account on one email
pub const DUPLICATE_EMAIL: &str = "User already exists";

/// `InvalidInput` message for a second review of one book by one user
pub const DUPLICATE_REVIEW: &str = "Book already reviewed";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- books ----

    /// Books matching the query, in the requested order
    async fn find_books(&self, query: &BookQuery) -> AppResult<Vec<Book>>;

    async fn count_books(&self, filter: &BookFilter) -> AppResult<u64>;

    async fn get_book(&self, id: Uuid) -> AppResult<Option<Book>>;

    async fn insert_book(&self, book: &Book) -> AppResult<()>;

    /// Overwrites the editable fields. Returns false when the book is absent.
    async fn update_book(&self, book: &Book) -> AppResult<bool>;

    /// Deletes the book together with its reviews and activities
    async fn delete_book(&self, id: Uuid) -> AppResult<bool>;

    /// Atomically adds `delta` to the shelved count, never going below zero
    async fn increment_shelved_count(&self, id: Uuid, delta: i64) -> AppResult<()>;

    async fn set_book_rating(
        &self,
        id: Uuid,
        average_rating: f64,
        rating_count: i64,
    ) -> AppResult<()>;

    /// Book count per genre
    async fn genre_distribution(&self) -> AppResult<Vec<GenreCount>>;

    // ---- users ----

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn count_users(&self) -> AppResult<u64>;

    /// Fails with [`DUPLICATE_EMAIL`] when the email is already registered
    async fn insert_user(&self, user: &User) -> AppResult<()>;

    /// Replaces all three shelves. Returns false when the user is absent.
    async fn save_shelves(&self, user_id: Uuid, shelves: &Shelves) -> AppResult<bool>;

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<bool>;

    async fn set_reading_goal(&self, id: Uuid, goal: i32) -> AppResult<bool>;

    /// Deletes the user together with their reviews and activities
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

    // ---- reviews ----

    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>>;

    /// The review `user_id` wrote for `book_id`, if any
    async fn find_review(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Review>>;

    /// Fails with [`DUPLICATE_REVIEW`] when the user already reviewed the book
    async fn insert_review(&self, review: &Review) -> AppResult<()>;

    async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> AppResult<bool>;

    async fn delete_review(&self, id: Uuid) -> AppResult<bool>;

    /// Ratings of every approved review of a book
    async fn approved_ratings(&self, book_id: Uuid) -> AppResult<Vec<i32>>;

    /// Books that `user_id` has an approved review of
    async fn approved_books_reviewed_by(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Approved review count per book. Books without approved reviews are absent.
    async fn approved_review_counts(&self, book_ids: &[Uuid]) -> AppResult<HashMap<Uuid, u64>>;

    /// Number of reviews, optionally restricted to one status
    async fn count_reviews(&self, status: Option<ReviewStatus>) -> AppResult<u64>;

    /// Reviews in scope joined with author and book, oldest first
    async fn review_views(&self, scope: ReviewScope) -> AppResult<Vec<ReviewView>>;

    // ---- genres ----

    async fn list_genres(&self) -> AppResult<Vec<Genre>>;

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>>;

    async fn insert_genres(&self, genres: &[Genre]) -> AppResult<()>;

    async fn delete_genre(&self, id: Uuid) -> AppResult<bool>;

    // ---- activities ----

    async fn insert_activity(&self, activity: &Activity) -> AppResult<()>;

    /// Newest activities first, joined with user and book
    async fn recent_activities(&self, limit: i64) -> AppResult<Vec<ActivityView>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(title: &str, author: &str, genre: &str, rating: f64, count: i64) -> Book {
        let now = Utc::now();
        Book {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            description: String::new(),
            cover_image: String::new(),
            added_by: None,
            average_rating: rating,
            rating_count: count,
            shelved_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let b = book("Emma", "Jane Austen", "Romance", 0.0, 0);
        assert!(BookFilter::default().matches(&b));
    }

    #[test]
    fn test_exclusion_wins() {
        let b = book("Emma", "Jane Austen", "Romance", 4.0, 2);
        let filter = BookFilter::default().with_ids([b.id]).excluding([b.id]);
        assert!(!filter.matches(&b));
    }

    #[test]
    fn test_empty_genre_list_matches_nothing() {
        let b = book("Emma", "Jane Austen", "Romance", 4.0, 2);
        assert!(!BookFilter::default().in_genres(Vec::new()).matches(&b));
        assert!(BookFilter::default()
            .in_genres(["Romance".to_string()])
            .matches(&b));
    }

    #[test]
    fn test_keyword_matches_title_or_author_case_insensitive() {
        let b = book("Emma", "Jane Austen", "Romance", 4.0, 2);
        assert!(BookFilter::default().keyword("EMM").matches(&b));
        assert!(BookFilter::default().keyword("austen").matches(&b));
        assert!(!BookFilter::default().keyword("bronte").matches(&b));
    }

    #[test]
    fn test_rating_thresholds_are_inclusive() {
        let b = book("Emma", "Jane Austen", "Romance", 3.5, 1);
        assert!(BookFilter::default()
            .min_rating(3.5)
            .min_rating_count(1)
            .matches(&b));
        assert!(BookFilter::default().max_rating(3.5).matches(&b));
        assert!(!BookFilter::default().min_rating_count(2).matches(&b));
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::store::{
        BookFilter, BookQuery, BookSort, CatalogStore, DUPLICATE_EMAIL, DUPLICATE_REVIEW,
    },
    error::{AppError, AppResult},
    models::{
        Activity, ActivityView, Book, Genre, GenreCount, Review, ReviewScope, ReviewStatus,
        ReviewView, Role, Shelves, User,
    },
};

/// Catalog store kept in process memory
///
/// Collections are vectors so that natural order is insertion order, matching
/// the PostgreSQL store's sequence ordering.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Collections>>,
}

#[derive(Default)]
struct Collections {
    books: Vec<Book>,
    users: Vec<User>,
    reviews: Vec<Review>,
    genres: Vec<Genre>,
    activities: Vec<Activity>,
}

impl Collections {
    fn book_mut(&mut self, id: Uuid) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

impl InMemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_books(books: &mut [Book], sort: BookSort) {
    match sort {
        BookSort::Natural => {}
        BookSort::Newest => books.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        BookSort::Rating => books.sort_by(|a, b| {
            b.average_rating
                .total_cmp(&a.average_rating)
                .then(b.rating_count.cmp(&a.rating_count))
        }),
        BookSort::MostShelved => books.sort_by(|a, b| {
            b.shelved_count
                .cmp(&a.shelved_count)
                .then(b.created_at.cmp(&a.created_at))
        }),
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let inner = self.inner.read().await;
        let mut books: Vec<Book> = inner
            .books
            .iter()
            .filter(|b| query.filter.matches(b))
            .cloned()
            .collect();
        sort_books(&mut books, query.sort);

        let offset = query.offset.max(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(books.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_books(&self, filter: &BookFilter) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.books.iter().filter(|b| filter.matches(b)).count() as u64)
    }

    async fn get_book(&self, id: Uuid) -> AppResult<Option<Book>> {
        let inner = self.inner.read().await;
        Ok(inner.books.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_book(&self, book: &Book) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.books.push(book.clone());
        Ok(())
    }

    async fn update_book(&self, book: &Book) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.book_mut(book.id) {
            Some(existing) => {
                existing.title = book.title.clone();
                existing.author = book.author.clone();
                existing.genre = book.genre.clone();
                existing.description = book.description.clone();
                existing.cover_image = book.cover_image.clone();
                existing.updated_at = book.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_book(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.books.len();
        inner.books.retain(|b| b.id != id);
        if inner.books.len() == before {
            return Ok(false);
        }
        inner.reviews.retain(|r| r.book != id);
        inner.activities.retain(|a| a.book != id);
        Ok(true)
    }

    async fn increment_shelved_count(&self, id: Uuid, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(book) = inner.book_mut(id) {
            book.shelved_count = (book.shelved_count + delta).max(0);
        }
        Ok(())
    }

    async fn set_book_rating(
        &self,
        id: Uuid,
        average_rating: f64,
        rating_count: i64,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(book) = inner.book_mut(id) {
            book.average_rating = average_rating;
            book.rating_count = rating_count;
        }
        Ok(())
    }

    async fn genre_distribution(&self) -> AppResult<Vec<GenreCount>> {
        let inner = self.inner.read().await;
        let mut counts: Vec<GenreCount> = Vec::new();
        for book in &inner.books {
            match counts.iter_mut().find(|c| c.name == book.genre) {
                Some(entry) => entry.value += 1,
                None => counts.push(GenreCount {
                    name: book.genre.clone(),
                    value: 1,
                }),
            }
        }
        counts.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        Ok(counts)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.clone())
    }

    async fn count_users(&self) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.users.len() as u64)
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::InvalidInput(DUPLICATE_EMAIL.to_string()));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn save_shelves(&self, user_id: Uuid, shelves: &Shelves) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.user_mut(user_id) {
            Some(user) => {
                user.shelves = shelves.clone();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.user_mut(id) {
            Some(user) => {
                user.role = role;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_reading_goal(&self, id: Uuid, goal: i32) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.user_mut(id) {
            Some(user) => {
                user.reading_goal = goal;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Ok(false);
        }
        inner.reviews.retain(|r| r.user != id);
        inner.activities.retain(|a| a.user != id);
        for book in inner.books.iter_mut().filter(|b| b.added_by == Some(id)) {
            book.added_by = None;
        }
        Ok(true)
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let inner = self.inner.read().await;
        Ok(inner.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn find_review(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .find(|r| r.user == user_id && r.book == book_id)
            .cloned())
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .reviews
            .iter()
            .any(|r| r.user == review.user && r.book == review.book)
        {
            return Err(AppError::InvalidInput(DUPLICATE_REVIEW.to_string()));
        }
        inner.reviews.push(review.clone());
        Ok(())
    }

    async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.reviews.iter_mut().find(|r| r.id == id) {
            Some(review) => {
                review.status = status;
                review.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.reviews.len();
        inner.reviews.retain(|r| r.id != id);
        Ok(inner.reviews.len() != before)
    }

    async fn approved_ratings(&self, book_id: Uuid) -> AppResult<Vec<i32>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .filter(|r| r.book == book_id && r.status == ReviewStatus::Approved)
            .map(|r| r.rating)
            .collect())
    }

    async fn approved_books_reviewed_by(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .filter(|r| r.user == user_id && r.status == ReviewStatus::Approved)
            .map(|r| r.book)
            .collect())
    }

    async fn approved_review_counts(&self, book_ids: &[Uuid]) -> AppResult<HashMap<Uuid, u64>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for review in inner
            .reviews
            .iter()
            .filter(|r| r.status == ReviewStatus::Approved && book_ids.contains(&r.book))
        {
            *counts.entry(review.book).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_reviews(&self, status: Option<ReviewStatus>) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .count() as u64)
    }

    async fn review_views(&self, scope: ReviewScope) -> AppResult<Vec<ReviewView>> {
        let inner = self.inner.read().await;
        let in_scope = |r: &&Review| match scope {
            ReviewScope::ApprovedForBook(book_id) => {
                r.book == book_id && r.status == ReviewStatus::Approved
            }
            ReviewScope::Pending => r.status == ReviewStatus::Pending,
        };

        let views = inner
            .reviews
            .iter()
            .filter(in_scope)
            .filter_map(|review| {
                let user = inner.users.iter().find(|u| u.id == review.user)?;
                let book = inner.books.iter().find(|b| b.id == review.book)?;
                Some(ReviewView {
                    id: review.id,
                    user: user.summary(),
                    book: book.summary(),
                    rating: review.rating,
                    content: review.content.clone(),
                    status: review.status,
                    created_at: review.created_at,
                })
            })
            .collect();
        Ok(views)
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let inner = self.inner.read().await;
        Ok(inner.genres.clone())
    }

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let inner = self.inner.read().await;
        Ok(inner.genres.iter().find(|g| g.name == name).cloned())
    }

    async fn insert_genres(&self, genres: &[Genre]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.genres.extend_from_slice(genres);
        Ok(())
    }

    async fn delete_genre(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.genres.len();
        inner.genres.retain(|g| g.id != id);
        Ok(inner.genres.len() != before)
    }

    async fn insert_activity(&self, activity: &Activity) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.activities.push(activity.clone());
        Ok(())
    }

    async fn recent_activities(&self, limit: i64) -> AppResult<Vec<ActivityView>> {
        let inner = self.inner.read().await;
        let views = inner
            .activities
            .iter()
            .rev()
            .filter_map(|activity| {
                let user = inner.users.iter().find(|u| u.id == activity.user)?;
                let book = inner.books.iter().find(|b| b.id == activity.book)?;
                Some(ActivityView {
                    id: activity.id,
                    user: user.summary(),
                    book: book.summary(),
                    kind: activity.kind,
                    details: activity.details.clone(),
                    timestamp: activity.timestamp,
                })
            })
            .take(limit.max(0) as usize)
            .collect();
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBook;

    fn book(title: &str, rating: f64, count: i64, shelved: i64) -> Book {
        let mut book = Book::new(
            NewBook {
                title: title.to_string(),
                author: "Author".to_string(),
                genre: "Fiction".to_string(),
                description: "About".to_string(),
                cover_image: "cover.jpg".to_string(),
            },
            None,
        );
        book.average_rating = rating;
        book.rating_count = count;
        book.shelved_count = shelved;
        book
    }

    #[tokio::test]
    async fn test_rating_sort_breaks_ties_by_count() {
        let store = InMemoryStore::new();
        for b in [
            book("a", 4.0, 1, 0),
            book("b", 4.5, 1, 0),
            book("c", 4.0, 9, 0),
        ] {
            store.insert_book(&b).await.unwrap();
        }

        let books = store
            .find_books(&BookQuery::default().sort(BookSort::Rating))
            .await
            .unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_natural_order_with_limit_and_offset() {
        let store = InMemoryStore::new();
        for title in ["a", "b", "c", "d"] {
            store.insert_book(&book(title, 0.0, 0, 0)).await.unwrap();
        }

        let books = store
            .find_books(&BookQuery::default().offset(1).limit(2))
            .await
            .unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_shelved_count_never_negative() {
        let store = InMemoryStore::new();
        let b = book("a", 0.0, 0, 0);
        store.insert_book(&b).await.unwrap();

        store.increment_shelved_count(b.id, -1).await.unwrap();
        store.increment_shelved_count(b.id, 1).await.unwrap();
        let stored = store.get_book(b.id).await.unwrap().unwrap();
        assert_eq!(stored.shelved_count, 1);
    }

    #[tokio::test]
    async fn test_delete_book_cascades_reviews() {
        let store = InMemoryStore::new();
        let b = book("a", 0.0, 0, 0);
        store.insert_book(&b).await.unwrap();
        let review = Review::new(
            Uuid::new_v4(),
            crate::models::NewReview {
                book_id: b.id,
                rating: 4,
                content: "ok".to_string(),
            },
        );
        store.insert_review(&review).await.unwrap();

        assert!(store.delete_book(b.id).await.unwrap());
        assert!(store.get_review(review.id).await.unwrap().is_none());
        assert!(!store.delete_book(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_review_are_rejected() {
        let store = InMemoryStore::new();
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
            None,
        );
        store.insert_user(&user).await.unwrap();
        let twin = User::new(
            "Ada Again".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
            None,
        );
        let err = store.insert_user(&twin).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg == DUPLICATE_EMAIL));
        assert_eq!(store.count_users().await.unwrap(), 1);

        let b = book("a", 0.0, 0, 0);
        store.insert_book(&b).await.unwrap();
        let input = crate::models::NewReview {
            book_id: b.id,
            rating: 4,
            content: "ok".to_string(),
        };
        store
            .insert_review(&Review::new(user.id, input.clone()))
            .await
            .unwrap();
        let err = store
            .insert_review(&Review::new(user.id, input))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg == DUPLICATE_REVIEW));
    }
}

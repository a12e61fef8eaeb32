use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Number of books per page in catalog listings
pub const PAGE_SIZE: i64 = 12;

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub cover_image: String,
    pub added_by: Option<Uuid>,
    /// Mean of approved review ratings, one decimal place. 0 when unrated.
    pub average_rating: f64,
    /// Number of approved reviews
    pub rating_count: i64,
    /// Number of users holding this book on any shelf
    pub shelved_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Creates an unrated, unshelved book from validated input
    pub fn new(input: NewBook, added_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            author: input.author,
            genre: input.genre,
            description: input.description,
            cover_image: input.cover_image,
            added_by,
            average_rating: 0.0,
            rating_count: 0,
            shelved_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update. Blank fields keep their current value.
    pub fn apply(&mut self, update: BookUpdate) {
        fn merge(target: &mut String, value: Option<String>) {
            if let Some(value) = value.map(|v| v.trim().to_string()) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }

        merge(&mut self.title, update.title);
        merge(&mut self.author, update.author);
        merge(&mut self.genre, update.genre);
        merge(&mut self.description, update.description);
        merge(&mut self.cover_image, update.cover_image);
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id,
            title: self.title.clone(),
            cover_image: Some(self.cover_image.clone()),
        }
    }
}

/// Request body for creating a book
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub cover_image: String,
}

impl NewBook {
    /// Trims every field and rejects blank ones
    pub fn validate(self) -> AppResult<Self> {
        fn required(field: &str, value: String) -> AppResult<String> {
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(AppError::InvalidInput(format!("Please add a {}", field)));
            }
            Ok(value)
        }

        Ok(Self {
            title: required("title", self.title)?,
            author: required("author", self.author)?,
            genre: required("genre", self.genre)?,
            description: required("description", self.description)?,
            cover_image: required("cover image URL", self.cover_image)?,
        })
    }
}

/// Request body for updating a book
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

/// Minimal book reference embedded in reviews and activities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

/// One page of catalog results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub page: i64,
    pub pages: i64,
    pub count: u64,
}

impl BookPage {
    pub fn new(books: Vec<Book>, page: i64, count: u64) -> Self {
        let pages = (count as i64 + PAGE_SIZE - 1) / PAGE_SIZE;
        Self {
            books,
            page,
            pages,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book() -> NewBook {
        NewBook {
            title: "  Dune ".to_string(),
            author: "Frank Herbert".to_string(),
            genre: "Sci-Fi".to_string(),
            description: "Spice and sand".to_string(),
            cover_image: "https://covers.example/dune.jpg".to_string(),
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let input = new_book().validate().unwrap();
        assert_eq!(input.title, "Dune");
    }

    #[test]
    fn test_validate_rejects_blank_genre() {
        let mut input = new_book();
        input.genre = "   ".to_string();
        let err = input.validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg.contains("genre")));
    }

    #[test]
    fn test_new_book_starts_unrated() {
        let book = Book::new(new_book().validate().unwrap(), None);
        assert_eq!(book.average_rating, 0.0);
        assert_eq!(book.rating_count, 0);
        assert_eq!(book.shelved_count, 0);
    }

    #[test]
    fn test_apply_keeps_blank_fields() {
        let mut book = Book::new(new_book().validate().unwrap(), None);
        book.apply(BookUpdate {
            title: Some("Dune Messiah".to_string()),
            author: Some("".to_string()),
            ..Default::default()
        });
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.author, "Frank Herbert");
    }

    #[test]
    fn test_book_serializes_camel_case() {
        let book = Book::new(new_book().validate().unwrap(), None);
        let json = serde_json::to_value(&book).unwrap();
        assert!(json.get("averageRating").is_some());
        assert!(json.get("shelvedCount").is_some());
        assert!(json.get("coverImage").is_some());
    }

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(BookPage::new(vec![], 1, 0).pages, 0);
        assert_eq!(BookPage::new(vec![], 1, 12).pages, 1);
        assert_eq!(BookPage::new(vec![], 1, 13).pages, 2);
    }
}

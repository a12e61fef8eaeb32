use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod activity;
pub mod book;
pub mod genre;
pub mod review;
pub mod user;

pub use activity::{Activity, ActivityKind, ActivityView};
pub use book::{Book, BookPage, BookSummary, BookUpdate, NewBook};
pub use genre::{Genre, GenreCount, NewGenre};
pub use review::{NewReview, RatingSummary, Review, ReviewScope, ReviewStatus, ReviewView};
pub use user::{ReadingProgress, Role, Shelf, Shelves, User, UserProfile, UserSummary};

// ============================================================================
// Recommendations
// ============================================================================

/// A recommended book and why it was picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub book: Book,
    pub reason: String,
}

impl Recommendation {
    pub fn new(book: Book, reason: impl Into<String>) -> Self {
        Self {
            book,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Shelves
// ============================================================================

/// Request body for moving a book between shelves
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfRequest {
    pub book_id: Uuid,
    /// Target shelf. Absent or null removes the book from every shelf.
    #[serde(default)]
    pub shelf: Option<Shelf>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub total_length: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingGoalRequest {
    pub goal: i32,
}

/// A currently-reading entry with its book resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryProgress {
    pub book: Book,
    pub progress: i32,
    pub total_length: i32,
}

/// A user's shelves with book details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub want_to_read: Vec<Book>,
    pub currently_reading: Vec<LibraryProgress>,
    pub read: Vec<Book>,
}

// ============================================================================
// Auth
// ============================================================================

/// Missing fields deserialize empty and are rejected by registration itself
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile plus the bearer token for clients that do not keep cookies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub token: String,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_books: u64,
    pub total_users: u64,
    pub total_reviews: u64,
    pub pending_reviews: u64,
    pub genre_distribution: Vec<GenreCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

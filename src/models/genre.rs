use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Genres seeded into an empty catalog
pub const DEFAULT_GENRES: [&str; 8] = [
    "Fiction",
    "Non-Fiction",
    "Mystery",
    "Sci-Fi",
    "Fantasy",
    "Romance",
    "History",
    "Technology",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Genre {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        DEFAULT_GENRES.iter().map(|name| Genre::new(*name)).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGenre {
    pub name: String,
}

/// Number of catalog books in one genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenreCount {
    pub name: String,
    pub value: i64,
}

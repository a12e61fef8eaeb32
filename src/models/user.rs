use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use crate::error::AppError;

/// Photo assigned to users who register without one
pub const DEFAULT_PHOTO: &str = "https://via.placeholder.com/150";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::InvalidInput(format!("Invalid role: {}", other))),
        }
    }
}

/// The three reading shelves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shelf {
    WantToRead,
    CurrentlyReading,
    Read,
}

impl Shelf {
    /// Activity feed wording for a book placed on this shelf
    pub fn activity_details(&self) -> &'static str {
        match self {
            Shelf::WantToRead => "added to wishlist",
            Shelf::CurrentlyReading => "started reading",
            Shelf::Read => "finished reading",
        }
    }
}

/// Progress through a book on the currently-reading shelf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub book: Uuid,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub total_length: i32,
}

/// A user's shelves. A book id lives on at most one shelf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shelves {
    pub want_to_read: Vec<Uuid>,
    pub currently_reading: Vec<ReadingProgress>,
    pub read: Vec<Uuid>,
}

impl Shelves {
    pub fn contains(&self, book_id: Uuid) -> bool {
        self.want_to_read.contains(&book_id)
            || self.read.contains(&book_id)
            || self.currently_reading.iter().any(|item| item.book == book_id)
    }

    /// Removes the book from every shelf
    pub fn remove(&mut self, book_id: Uuid) {
        self.want_to_read.retain(|id| *id != book_id);
        self.read.retain(|id| *id != book_id);
        self.currently_reading.retain(|item| item.book != book_id);
    }

    /// Moves the book onto `shelf`, or off every shelf when `shelf` is `None`.
    ///
    /// Returns the change in the number of shelves holding the book (-1, 0 or 1),
    /// which is what the book's `shelved_count` moves by.
    pub fn place(
        &mut self,
        book_id: Uuid,
        shelf: Option<Shelf>,
        progress: i32,
        total_length: i32,
    ) -> i64 {
        let was_shelved = self.contains(book_id);
        self.remove(book_id);

        match shelf {
            Some(Shelf::WantToRead) => self.want_to_read.push(book_id),
            Some(Shelf::Read) => self.read.push(book_id),
            Some(Shelf::CurrentlyReading) => self.currently_reading.push(ReadingProgress {
                book: book_id,
                progress,
                total_length,
            }),
            None => {}
        }

        match (was_shelved, shelf.is_some()) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub photo: String,
    pub reading_goal: i32,
    #[serde(flatten)]
    pub shelves: Shelves,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, photo: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role: Role::User,
            photo: photo
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            reading_goal: 0,
            shelves: Shelves::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            photo: Some(self.photo.clone()),
        }
    }
}

/// Public profile returned by auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: String,
    pub read: Vec<Uuid>,
    pub reading_goal: i32,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            photo: user.photo.clone(),
            read: user.shelves.read.clone(),
            reading_goal: user.reading_goal,
        }
    }
}

/// Minimal user reference embedded in reviews and activities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_moves_between_shelves() {
        let mut shelves = Shelves::default();
        let book = Uuid::new_v4();

        assert_eq!(shelves.place(book, Some(Shelf::WantToRead), 0, 0), 1);
        assert_eq!(shelves.place(book, Some(Shelf::CurrentlyReading), 40, 300), 0);
        assert!(shelves.want_to_read.is_empty());
        assert_eq!(shelves.currently_reading[0].progress, 40);

        assert_eq!(shelves.place(book, Some(Shelf::Read), 0, 0), 0);
        assert!(shelves.currently_reading.is_empty());
        assert_eq!(shelves.read, vec![book]);
    }

    #[test]
    fn test_place_none_removes() {
        let mut shelves = Shelves::default();
        let book = Uuid::new_v4();
        shelves.place(book, Some(Shelf::Read), 0, 0);

        assert_eq!(shelves.place(book, None, 0, 0), -1);
        assert!(!shelves.contains(book));
        assert_eq!(shelves.place(book, None, 0, 0), 0);
    }

    #[test]
    fn test_placing_same_shelf_twice_keeps_single_entry() {
        let mut shelves = Shelves::default();
        let book = Uuid::new_v4();
        shelves.place(book, Some(Shelf::Read), 0, 0);
        assert_eq!(shelves.place(book, Some(Shelf::Read), 0, 0), 0);
        assert_eq!(shelves.read.len(), 1);
    }

    #[test]
    fn test_shelf_deserializes_camel_case() {
        let shelf: Shelf = serde_json::from_str("\"wantToRead\"").unwrap();
        assert_eq!(shelf, Shelf::WantToRead);
        let shelf: Shelf = serde_json::from_str("\"currentlyReading\"").unwrap();
        assert_eq!(shelf, Shelf::CurrentlyReading);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_serialization_hides_password() {
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "$2b$hash".to_string(),
            None,
        );
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["photo"], DEFAULT_PHOTO);
        assert!(json["wantToRead"].as_array().unwrap().is_empty());
    }
}

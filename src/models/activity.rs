use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{BookSummary, UserSummary};
use crate::error::AppError;

/// Number of entries in the activity feed
pub const FEED_LENGTH: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ShelfUpdate,
    NewReview,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::ShelfUpdate => "shelf_update",
            ActivityKind::NewReview => "new_review",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shelf_update" => Ok(ActivityKind::ShelfUpdate),
            "new_review" => Ok(ActivityKind::NewReview),
            other => Err(AppError::Internal(format!("Unknown activity type: {}", other))),
        }
    }
}

/// Something a user did to a book
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: Uuid,
    pub user: Uuid,
    pub book: Uuid,
    pub kind: ActivityKind,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    pub fn new(user: Uuid, book: Uuid, kind: ActivityKind, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            book,
            kind,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Feed entry with user and book details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub id: Uuid,
    pub user: UserSummary,
    pub book: BookSummary,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

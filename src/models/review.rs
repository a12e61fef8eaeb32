use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use super::{BookSummary, UserSummary};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
        }
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            other => Err(AppError::Internal(format!("Unknown review status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user: Uuid,
    pub book: Uuid,
    pub rating: i32,
    pub content: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Creates a pending review awaiting moderation
    pub fn new(user: Uuid, input: NewReview) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user,
            book: input.book_id,
            rating: input.rating,
            content: input.content,
            status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request body for submitting a review
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub book_id: Uuid,
    pub rating: i32,
    pub content: String,
}

impl NewReview {
    pub fn validate(self) -> AppResult<Self> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::InvalidInput(
                "Please add a rating between 1 and 5".to_string(),
            ));
        }
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::InvalidInput(
                "Please add some text for the review".to_string(),
            ));
        }
        Ok(Self { content, ..self })
    }
}

/// Which reviews to list with their author and book details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewScope {
    /// Approved reviews of one book
    ApprovedForBook(Uuid),
    /// Every review awaiting moderation
    Pending,
}

/// A review joined with its author and book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub user: UserSummary,
    pub book: BookSummary,
    pub rating: i32,
    pub content: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Book rating fields derived from approved review ratings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub rating_count: i64,
}

impl RatingSummary {
    /// Mean rounded to one decimal place; 0 when there are no ratings
    pub fn from_ratings(ratings: &[i32]) -> Self {
        let rating_count = ratings.len() as i64;
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
            let mean = sum as f64 / rating_count as f64;
            (mean * 10.0).round() / 10.0
        };

        Self {
            average_rating,
            rating_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_rounds_to_one_decimal() {
        let summary = RatingSummary::from_ratings(&[4, 5, 3]);
        assert_eq!(summary.rating_count, 3);
        assert_eq!(summary.average_rating, 4.0);

        let summary = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(summary.average_rating, 4.3);
    }

    #[test]
    fn test_rating_summary_empty_is_zero() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.rating_count, 0);
        assert_eq!(summary.average_rating, 0.0);
    }

    #[test]
    fn test_new_review_rejects_out_of_range_rating() {
        for rating in [0, 6] {
            let input = NewReview {
                book_id: Uuid::new_v4(),
                rating,
                content: "Fine".to_string(),
            };
            assert!(matches!(input.validate(), Err(AppError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_new_review_starts_pending() {
        let input = NewReview {
            book_id: Uuid::new_v4(),
            rating: 4,
            content: " Loved it ".to_string(),
        }
        .validate()
        .unwrap();
        let review = Review::new(Uuid::new_v4(), input);
        assert_eq!(review.status, ReviewStatus::Pending);
        assert_eq!(review.content, "Loved it");
    }
}

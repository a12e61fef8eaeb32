use uuid::Uuid;

use crate::{
    db::{CatalogStore, DUPLICATE_REVIEW},
    error::{AppError, AppResult},
    models::{
        ActivityKind, NewReview, RatingSummary, Review, ReviewScope, ReviewStatus, ReviewView,
    },
    services::activities,
};

/// Submits a review for moderation and logs it to the activity feed
#[tracing::instrument(skip(store, input), fields(book_id = %input.book_id))]
pub async fn create_review(
    store: &dyn CatalogStore,
    user_id: Uuid,
    input: NewReview,
) -> AppResult<Review> {
    let input = input.validate()?;

    if store.get_book(input.book_id).await?.is_none() {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    if store.find_review(user_id, input.book_id).await?.is_some() {
        return Err(AppError::InvalidInput(DUPLICATE_REVIEW.to_string()));
    }

    let review = Review::new(user_id, input);
    store.insert_review(&review).await?;
    activities::record(
        store,
        user_id,
        review.book,
        ActivityKind::NewReview,
        format!("rated it {}/5", review.rating),
    )
    .await?;

    tracing::info!(review_id = %review.id, "Review submitted");
    Ok(review)
}

/// Approved reviews of a book with their authors
pub async fn book_reviews(store: &dyn CatalogStore, book_id: Uuid) -> AppResult<Vec<ReviewView>> {
    store.review_views(ReviewScope::ApprovedForBook(book_id)).await
}

/// Reviews awaiting moderation
pub async fn pending_reviews(store: &dyn CatalogStore) -> AppResult<Vec<ReviewView>> {
    store.review_views(ReviewScope::Pending).await
}

/// Approves a review and refreshes the book's rating
#[tracing::instrument(skip(store))]
pub async fn approve_review(store: &dyn CatalogStore, id: Uuid) -> AppResult<()> {
    let review = store
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    store.set_review_status(id, ReviewStatus::Approved).await?;
    let summary = recompute_rating(store, review.book).await?;

    tracing::info!(
        book_id = %review.book,
        average_rating = summary.average_rating,
        rating_count = summary.rating_count,
        "Review approved"
    );
    Ok(())
}

/// Deletes a review and refreshes the book's rating
#[tracing::instrument(skip(store))]
pub async fn delete_review(store: &dyn CatalogStore, id: Uuid) -> AppResult<()> {
    let review = store
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if !store.delete_review(id).await? {
        return Err(AppError::NotFound("Review not found".to_string()));
    }
    if review.status == ReviewStatus::Approved {
        recompute_rating(store, review.book).await?;
    }
    Ok(())
}

/// Rewrites the book's rating fields from its approved reviews
pub(crate) async fn recompute_rating(
    store: &dyn CatalogStore,
    book_id: Uuid,
) -> AppResult<RatingSummary> {
    let ratings = store.approved_ratings(book_id).await?;
    let summary = RatingSummary::from_ratings(&ratings);
    store
        .set_book_rating(book_id, summary.average_rating, summary.rating_count)
        .await?;
    Ok(summary)
}

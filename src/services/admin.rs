use uuid::Uuid;

use crate::{
    cached,
    db::{BookFilter, Cache, CacheKey, CatalogStore},
    error::{AppError, AppResult},
    models::{AdminStats, ReviewStatus, Role, User},
    services::reviews::recompute_rating,
};

const STATS_TTL_SECS: u64 = 60;

/// Dashboard counters, served from the cache when one is configured
pub async fn stats(store: &dyn CatalogStore, cache: Option<&Cache>) -> AppResult<AdminStats> {
    match cache {
        Some(cache) => cached!(
            cache,
            CacheKey::AdminStats,
            STATS_TTL_SECS,
            compute_stats(store)
        ),
        None => compute_stats(store).await,
    }
}

async fn compute_stats(store: &dyn CatalogStore) -> AppResult<AdminStats> {
    Ok(AdminStats {
        total_books: store.count_books(&BookFilter::default()).await?,
        total_users: store.count_users().await?,
        total_reviews: store.count_reviews(None).await?,
        pending_reviews: store.count_reviews(Some(ReviewStatus::Pending)).await?,
        genre_distribution: store.genre_distribution().await?,
    })
}

pub async fn list_users(store: &dyn CatalogStore) -> AppResult<Vec<User>> {
    store.list_users().await
}

#[tracing::instrument(skip(store))]
pub async fn set_role(store: &dyn CatalogStore, id: Uuid, role: &str) -> AppResult<()> {
    let role: Role = role
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid role".to_string()))?;

    if !store.set_user_role(id, role).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %id, role = %role, "User role updated");
    Ok(())
}

/// Deletes another user's account along with their reviews and activity
///
/// Books the user had shelved or reviewed get their counters refreshed.
#[tracing::instrument(skip(store))]
pub async fn delete_user(
    store: &dyn CatalogStore,
    acting_admin: Uuid,
    id: Uuid,
) -> AppResult<()> {
    if acting_admin == id {
        return Err(AppError::InvalidInput("Cannot delete yourself".to_string()));
    }

    let user = store
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let reviewed = store.approved_books_reviewed_by(id).await?;

    if !store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let shelves = &user.shelves;
    let shelved = shelves
        .want_to_read
        .iter()
        .chain(shelves.read.iter())
        .copied()
        .chain(shelves.currently_reading.iter().map(|entry| entry.book));
    for book_id in shelved {
        store.increment_shelved_count(book_id, -1).await?;
    }
    for book_id in reviewed {
        recompute_rating(store, book_id).await?;
    }

    tracing::info!(user_id = %id, "User deleted");
    Ok(())
}

use uuid::Uuid;

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{activity::FEED_LENGTH, Activity, ActivityKind, ActivityView},
};

/// Appends an entry to the activity log
pub async fn record(
    store: &dyn CatalogStore,
    user: Uuid,
    book: Uuid,
    kind: ActivityKind,
    details: impl Into<String>,
) -> AppResult<()> {
    let activity = Activity::new(user, book, kind, details);
    tracing::debug!(kind = kind.as_str(), details = %activity.details, "Recording activity");
    store.insert_activity(&activity).await
}

/// The most recent activity across all users, newest first
pub async fn feed(store: &dyn CatalogStore) -> AppResult<Vec<ActivityView>> {
    store.recent_activities(FEED_LENGTH).await
}

use uuid::Uuid;

use crate::{
    cached,
    db::{Cache, CacheKey, CatalogStore},
    error::{AppError, AppResult},
    models::{Genre, NewGenre},
};

const GENRES_TTL_SECS: u64 = 300;

/// Every genre, seeding the defaults into an empty store first
pub async fn list_genres(
    store: &dyn CatalogStore,
    cache: Option<&Cache>,
) -> AppResult<Vec<Genre>> {
    match cache {
        Some(cache) => cached!(cache, CacheKey::Genres, GENRES_TTL_SECS, load_genres(store)),
        None => load_genres(store).await,
    }
}

async fn load_genres(store: &dyn CatalogStore) -> AppResult<Vec<Genre>> {
    let genres = store.list_genres().await?;
    if !genres.is_empty() {
        return Ok(genres);
    }

    tracing::info!("Seeding default genres");
    store.insert_genres(&Genre::defaults()).await?;
    store.list_genres().await
}

/// Drops the cached list before the change is reported to the caller
async fn evict_genres(cache: Option<&Cache>) {
    if let Some(cache) = cache {
        if let Err(e) = cache.invalidate(&CacheKey::Genres).await {
            tracing::warn!(error = %e, "Failed to evict cached genres");
        }
    }
}

#[tracing::instrument(skip(store, cache, input), fields(name = %input.name))]
pub async fn create_genre(
    store: &dyn CatalogStore,
    cache: Option<&Cache>,
    input: NewGenre,
) -> AppResult<Genre> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Please add a genre name".to_string()));
    }
    if store.find_genre_by_name(name).await?.is_some() {
        return Err(AppError::InvalidInput("Genre already exists".to_string()));
    }

    let genre = Genre::new(name);
    store.insert_genres(std::slice::from_ref(&genre)).await?;
    evict_genres(cache).await;
    Ok(genre)
}

#[tracing::instrument(skip(store, cache))]
pub async fn delete_genre(
    store: &dyn CatalogStore,
    cache: Option<&Cache>,
    id: Uuid,
) -> AppResult<()> {
    if !store.delete_genre(id).await? {
        return Err(AppError::NotFound("Genre not found".to_string()));
    }
    evict_genres(cache).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::genre::DEFAULT_GENRES;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_empty_store_is_seeded_once() {
        let store = InMemoryStore::new();

        let first = list_genres(&store, None).await.unwrap();
        let second = list_genres(&store, None).await.unwrap();

        assert_eq!(first.len(), DEFAULT_GENRES.len());
        assert_eq!(first, second);
        assert_eq!(first[0].name, "Fiction");
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let store = InMemoryStore::new();
        let genre = assert_ok!(
            create_genre(
                &store,
                None,
                NewGenre {
                    name: " Poetry ".to_string(),
                },
            )
            .await
        );
        assert_eq!(genre.name, "Poetry");

        let duplicate = create_genre(
            &store,
            None,
            NewGenre {
                name: "Poetry".to_string(),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(AppError::InvalidInput(_))));

        assert_ok!(delete_genre(&store, None, genre.id).await);
        let err = assert_err!(delete_genre(&store, None, genre.id).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_new_genre_is_listed_right_after_creation() {
        use crate::db::create_redis_client;

        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let (cache, handle) = Cache::connect(create_redis_client(&url).unwrap())
            .await
            .unwrap();
        cache.invalidate(&CacheKey::Genres).await.unwrap();
        let store = InMemoryStore::new();

        list_genres(&store, Some(&cache)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let poetry = create_genre(
            &store,
            Some(&cache),
            NewGenre {
                name: "Poetry".to_string(),
            },
        )
        .await
        .unwrap();
        let listed = list_genres(&store, Some(&cache)).await.unwrap();
        assert!(listed.iter().any(|g| g.id == poetry.id));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        delete_genre(&store, Some(&cache), poetry.id).await.unwrap();
        let listed = list_genres(&store, Some(&cache)).await.unwrap();
        assert!(listed.iter().all(|g| g.id != poetry.id));

        cache.invalidate(&CacheKey::Genres).await.unwrap();
        handle.shutdown().await;
    }
}

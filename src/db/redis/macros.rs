/// Serves `$load` through the cache under `$key`.
///
/// A Redis failure on the read path is logged and treated as a miss, so a
/// flaky cache never fails the request. Fresh values are written back with a
/// `$ttl` second expiry off the request path, unless the key is invalidated
/// while the value is loading.
///
/// ```rust,ignore
/// let genres: Vec<Genre> = cached!(cache, CacheKey::Genres, 300, load_genres(store))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $load:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(hit)) => Ok(hit),
            lookup => {
                if let Err(e) = lookup {
                    ::tracing::warn!(key = %$key, error = %e, "Cache read failed");
                }
                let loaded_at = $cache.generation();
                let fresh = $load.await?;
                $cache.set_in_background(&$key, &fresh, $ttl, loaded_at);
                Ok(fresh)
            }
        }
    }};
}

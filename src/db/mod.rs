pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use self::memory::InMemoryStore;
pub use self::postgres::{create_pool, run_migrations, PgCatalogStore};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use self::store::{
    BookFilter, BookQuery, BookSort, CatalogStore, DUPLICATE_EMAIL, DUPLICATE_REVIEW,
};

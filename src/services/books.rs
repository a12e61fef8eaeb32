use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{BookFilter, BookQuery, BookSort, CatalogStore},
    error::{AppError, AppResult},
    models::{book::PAGE_SIZE, Book, BookPage, BookUpdate, NewBook},
};

/// Catalog listing query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub keyword: Option<String>,
    /// Comma-separated genre names
    pub genre: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub sort_by: Option<String>,
    pub page_number: Option<i64>,
}

impl ListParams {
    fn filter(&self) -> BookFilter {
        let mut filter = BookFilter::default();

        if let Some(keyword) = self.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                filter = filter.keyword(keyword);
            }
        }

        if let Some(genre) = &self.genre {
            let genres: Vec<String> = genre
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
            if !genres.is_empty() {
                filter = filter.in_genres(genres);
            }
        }

        filter.min_rating = self.min_rating;
        filter.max_rating = self.max_rating;
        filter
    }

    fn sort(&self) -> BookSort {
        match self.sort_by.as_deref() {
            Some("rating") => BookSort::Rating,
            Some("mostShelved") => BookSort::MostShelved,
            _ => BookSort::Newest,
        }
    }

    fn page(&self) -> i64 {
        self.page_number.filter(|p| *p >= 1).unwrap_or(1)
    }
}

/// One page of the filtered, sorted catalog
#[tracing::instrument(skip(store))]
pub async fn list_books(store: &dyn CatalogStore, params: ListParams) -> AppResult<BookPage> {
    let filter = params.filter();
    let page = params.page();

    let count = store.count_books(&filter).await?;
    let books = store
        .find_books(
            &BookQuery::new(filter)
                .sort(params.sort())
                .limit(PAGE_SIZE)
                .offset(PAGE_SIZE * (page - 1)),
        )
        .await?;

    Ok(BookPage::new(books, page, count))
}

pub async fn get_book(store: &dyn CatalogStore, id: Uuid) -> AppResult<Book> {
    store
        .get_book(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

#[tracing::instrument(skip(store, input), fields(title = %input.title))]
pub async fn create_book(
    store: &dyn CatalogStore,
    input: NewBook,
    added_by: Uuid,
) -> AppResult<Book> {
    let book = Book::new(input.validate()?, Some(added_by));
    store.insert_book(&book).await?;

    tracing::info!(book_id = %book.id, "Book created");
    Ok(book)
}

#[tracing::instrument(skip(store, update))]
pub async fn update_book(
    store: &dyn CatalogStore,
    id: Uuid,
    update: BookUpdate,
) -> AppResult<Book> {
    let mut book = get_book(store, id).await?;
    book.apply(update);

    if !store.update_book(&book).await? {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    Ok(book)
}

/// Removes the book along with its reviews and activity entries
#[tracing::instrument(skip(store))]
pub async fn delete_book(store: &dyn CatalogStore, id: Uuid) -> AppResult<()> {
    if !store.delete_book(id).await? {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    tracing::info!(book_id = %id, "Book deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn new_book(title: &str, genre: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Author".to_string(),
            genre: genre.to_string(),
            description: "Description".to_string(),
            cover_image: "cover.jpg".to_string(),
        }
    }

    #[test]
    fn test_params_build_filter() {
        let params = ListParams {
            keyword: Some("  dune ".to_string()),
            genre: Some("Sci-Fi,,Fantasy".to_string()),
            min_rating: Some(3.0),
            ..Default::default()
        };
        let filter = params.filter();

        assert_eq!(filter.keyword.as_deref(), Some("dune"));
        assert_eq!(
            filter.genres,
            Some(vec!["Sci-Fi".to_string(), "Fantasy".to_string()])
        );
        assert_eq!(filter.min_rating, Some(3.0));
        assert_eq!(filter.max_rating, None);
    }

    #[test]
    fn test_params_defaults() {
        let params = ListParams {
            genre: Some(",".to_string()),
            page_number: Some(0),
            sort_by: Some("unknown".to_string()),
            ..Default::default()
        };
        assert_eq!(params.filter().genres, None);
        assert_eq!(params.page(), 1);
        assert_eq!(params.sort(), BookSort::Newest);
    }

    #[tokio::test]
    async fn test_list_books_paginates() {
        let store = InMemoryStore::new();
        let admin = Uuid::new_v4();
        for i in 0..14 {
            create_book(&store, new_book(&format!("Book {}", i), "Fiction"), admin)
                .await
                .unwrap();
        }

        let second = list_books(
            &store,
            ListParams {
                page_number: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(second.count, 14);
        assert_eq!(second.pages, 2);
        assert_eq!(second.page, 2);
        assert_eq!(second.books.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let store = InMemoryStore::new();
        let err = create_book(&store, new_book("  ", "Fiction"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_book() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            update_book(&store, id, BookUpdate::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_book(&store, id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_blank_fields() {
        let store = InMemoryStore::new();
        let book = create_book(&store, new_book("Dune", "Sci-Fi"), Uuid::new_v4())
            .await
            .unwrap();

        let updated = update_book(
            &store,
            book.id,
            BookUpdate {
                title: Some("Dune Messiah".to_string()),
                genre: Some("".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Dune Messiah");
        assert_eq!(updated.genre, "Sci-Fi");
        assert_eq!(get_book(&store, book.id).await.unwrap().title, "Dune Messiah");
    }
}

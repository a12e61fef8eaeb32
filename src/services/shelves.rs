use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    db::{BookFilter, BookQuery, CatalogStore},
    error::{AppError, AppResult},
    models::{ActivityKind, Book, Library, LibraryProgress, ShelfRequest, User},
    services::{activities, auth::current_user},
};

/// Moves a book onto one shelf, or off all of them when no shelf is given
///
/// A book is on at most one shelf at a time. The book's shelved count follows
/// the move and placing a book on a shelf is logged to the activity feed.
#[tracing::instrument(
    skip(store, request),
    fields(book_id = %request.book_id, shelf = ?request.shelf)
)]
pub async fn update_shelf(
    store: &dyn CatalogStore,
    user_id: Uuid,
    request: ShelfRequest,
) -> AppResult<User> {
    let mut user = current_user(store, user_id).await?;

    if request.shelf.is_some() && store.get_book(request.book_id).await?.is_none() {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    let delta = user.shelves.place(
        request.book_id,
        request.shelf,
        request.progress.unwrap_or(0),
        request.total_length.unwrap_or(0),
    );

    if !store.save_shelves(user_id, &user.shelves).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    if delta != 0 {
        store.increment_shelved_count(request.book_id, delta).await?;
    }

    if let Some(shelf) = request.shelf {
        activities::record(
            store,
            user_id,
            request.book_id,
            ActivityKind::ShelfUpdate,
            shelf.activity_details(),
        )
        .await?;
    }

    Ok(user)
}

/// The user's shelves with full book details, in shelf order
///
/// Entries whose book has since left the catalog are skipped.
pub async fn library(store: &dyn CatalogStore, user_id: Uuid) -> AppResult<Library> {
    let user = current_user(store, user_id).await?;
    let shelves = &user.shelves;

    let ids = shelves
        .want_to_read
        .iter()
        .chain(shelves.read.iter())
        .copied()
        .chain(shelves.currently_reading.iter().map(|entry| entry.book));
    let books: HashMap<Uuid, Book> = store
        .find_books(&BookQuery::new(BookFilter::default().with_ids(ids)))
        .await?
        .into_iter()
        .map(|book| (book.id, book))
        .collect();

    let resolve = |ids: &[Uuid]| -> Vec<Book> {
        ids.iter().filter_map(|id| books.get(id).cloned()).collect()
    };

    Ok(Library {
        want_to_read: resolve(&shelves.want_to_read),
        currently_reading: shelves
            .currently_reading
            .iter()
            .filter_map(|entry| {
                books.get(&entry.book).map(|book| LibraryProgress {
                    book: book.clone(),
                    progress: entry.progress,
                    total_length: entry.total_length,
                })
            })
            .collect(),
        read: resolve(&shelves.read),
    })
}

/// Sets the yearly reading goal
#[tracing::instrument(skip(store))]
pub async fn set_reading_goal(
    store: &dyn CatalogStore,
    user_id: Uuid,
    goal: i32,
) -> AppResult<User> {
    if goal < 0 {
        return Err(AppError::InvalidInput("Reading goal cannot be negative".to_string()));
    }
    if !store.set_reading_goal(user_id, goal).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    current_user(store, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::{NewBook, Shelf};
    use tokio_test::assert_err;

    async fn seed(store: &InMemoryStore) -> (User, Book) {
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
            None,
        );
        store.insert_user(&user).await.unwrap();
        let book = Book::new(
            NewBook {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                genre: "Sci-Fi".to_string(),
                description: "Spice".to_string(),
                cover_image: "dune.jpg".to_string(),
            },
            None,
        );
        store.insert_book(&book).await.unwrap();
        (user, book)
    }

    fn request(book: &Book, shelf: Option<Shelf>) -> ShelfRequest {
        ShelfRequest {
            book_id: book.id,
            shelf,
            progress: Some(40),
            total_length: Some(400),
        }
    }

    async fn shelved_count(store: &InMemoryStore, book: &Book) -> i64 {
        store.get_book(book.id).await.unwrap().unwrap().shelved_count
    }

    #[tokio::test]
    async fn test_moves_keep_shelves_disjoint() {
        let store = InMemoryStore::new();
        let (user, book) = seed(&store).await;

        update_shelf(&store, user.id, request(&book, Some(Shelf::WantToRead)))
            .await
            .unwrap();
        update_shelf(&store, user.id, request(&book, Some(Shelf::CurrentlyReading)))
            .await
            .unwrap();
        let user = update_shelf(&store, user.id, request(&book, Some(Shelf::Read)))
            .await
            .unwrap();

        assert!(user.shelves.want_to_read.is_empty());
        assert!(user.shelves.currently_reading.is_empty());
        assert_eq!(user.shelves.read, vec![book.id]);
        assert_eq!(shelved_count(&store, &book).await, 1);
    }

    #[tokio::test]
    async fn test_removal_decrements_shelved_count() {
        let store = InMemoryStore::new();
        let (user, book) = seed(&store).await;

        update_shelf(&store, user.id, request(&book, Some(Shelf::Read)))
            .await
            .unwrap();
        let user = update_shelf(&store, user.id, request(&book, None))
            .await
            .unwrap();

        assert!(!user.shelves.contains(book.id));
        assert_eq!(shelved_count(&store, &book).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_book_is_not_found() {
        let store = InMemoryStore::new();
        let (user, _) = seed(&store).await;
        let missing = Uuid::new_v4();

        let err = assert_err!(
            update_shelf(
                &store,
                user.id,
                ShelfRequest {
                    book_id: missing,
                    shelf: Some(Shelf::Read),
                    progress: None,
                    total_length: None,
                },
            )
            .await
        );
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_library_resolves_books_and_progress() {
        let store = InMemoryStore::new();
        let (user, book) = seed(&store).await;

        update_shelf(&store, user.id, request(&book, Some(Shelf::CurrentlyReading)))
            .await
            .unwrap();
        let library = library(&store, user.id).await.unwrap();

        assert!(library.want_to_read.is_empty());
        assert!(library.read.is_empty());
        assert_eq!(library.currently_reading.len(), 1);
        assert_eq!(library.currently_reading[0].book.title, "Dune");
        assert_eq!(library.currently_reading[0].progress, 40);
        assert_eq!(library.currently_reading[0].total_length, 400);
    }

    #[tokio::test]
    async fn test_reading_goal() {
        let store = InMemoryStore::new();
        let (user, _) = seed(&store).await;

        let updated = set_reading_goal(&store, user.id, 24).await.unwrap();
        assert_eq!(updated.reading_goal, 24);
        assert!(matches!(
            set_reading_goal(&store, user.id, -1).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}

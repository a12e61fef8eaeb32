use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::{
    db::{BookFilter, BookQuery, BookSort, CatalogStore},
    error::{AppError, AppResult},
    models::{Book, Recommendation},
};

/// Upper bound on recommendations per response
pub const MAX_RECOMMENDATIONS: usize = 18;

/// Read-shelf size from which recommendations are personalized
pub const PERSONALIZATION_THRESHOLD: usize = 3;

const COLD_START_POPULAR: i64 = 10;
const COLD_START_DISCOVERY: usize = 8;
const RANKED_TARGET: usize = 12;
const DISCOVERY_TOP_UP: usize = 6;
const TOP_GENRES: usize = 3;

const QUALITY_RATING: f64 = 3.5;
const HIGH_RATING: f64 = 4.0;
const MANY_REVIEWS: u64 = 5;
const SOME_REVIEWS: u64 = 2;
const POPULAR_SHELVED: i64 = 10;

const BACKFILL_SCORE: i32 = 0;
const DISCOVERY_SCORE: i32 = -1;
const DISCOVERY_REASON: &str = "Discover something new";

/// A ranked candidate. The score only orders candidates and is dropped on
/// conversion to [`Recommendation`].
#[derive(Debug, Clone)]
struct ScoredBook {
    book: Book,
    score: i32,
    reason: String,
}

impl From<ScoredBook> for Recommendation {
    fn from(scored: ScoredBook) -> Self {
        Recommendation::new(scored.book, scored.reason)
    }
}

/// How many read books fall in each genre, most read first
#[derive(Debug, Default)]
struct GenreProfile {
    counts: Vec<(String, usize)>,
}

impl GenreProfile {
    /// Builds the histogram. Ties keep the order genres were first seen in.
    fn from_books(books: &[Book]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for book in books.iter().filter(|b| !b.genre.is_empty()) {
            match counts.iter_mut().find(|(genre, _)| *genre == book.genre) {
                Some((_, count)) => *count += 1,
                None => counts.push((book.genre.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Self { counts }
    }

    /// Position among the top genres, if the genre is one of them
    fn top_rank(&self, genre: &str) -> Option<usize> {
        self.counts
            .iter()
            .take(TOP_GENRES)
            .position(|(g, _)| g == genre)
    }

    fn count(&self, genre: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(g, _)| g == genre)
            .map(|(_, count)| *count)
    }

    fn genres(&self) -> Vec<String> {
        self.counts.iter().map(|(g, _)| g.clone()).collect()
    }
}

/// Scores one candidate against the reader's genre profile
fn score_candidate(book: Book, profile: &GenreProfile, approved_reviews: u64) -> ScoredBook {
    let mut score = 0;
    let mut reasons: Vec<String> = Vec::new();

    if let Some(rank) = profile.top_rank(&book.genre) {
        score += (TOP_GENRES - rank) as i32 * 10;
        let read = profile.count(&book.genre).unwrap_or(0);
        reasons.push(format!(
            "Matches your preference for {} ({} book{} read)",
            book.genre,
            read,
            if read > 1 { "s" } else { "" }
        ));
    } else if profile.count(&book.genre).is_some() {
        score += 5;
        reasons.push(format!("Similar to {} books you've read", book.genre));
    }

    if book.average_rating >= HIGH_RATING {
        score += 15;
        reasons.push(format!("Highly rated ({:.1}★)", book.average_rating));
    } else if book.average_rating >= QUALITY_RATING {
        score += 8;
    }

    if approved_reviews >= MANY_REVIEWS {
        score += 10;
        reasons.push(format!("{} community reviews", approved_reviews));
    } else if approved_reviews >= SOME_REVIEWS {
        score += 5;
    }

    if book.shelved_count >= POPULAR_SHELVED {
        score += 5;
    }

    let reason = if reasons.is_empty() {
        format!("Recommended in {}", book.genre)
    } else {
        reasons.truncate(2);
        reasons.join(" • ")
    };

    ScoredBook {
        book,
        score,
        reason,
    }
}

/// Uniform sample without replacement
fn sample_discovery(mut books: Vec<Book>, count: usize) -> Vec<Book> {
    books.shuffle(&mut rand::rng());
    books.truncate(count);
    books
}

/// Generates book recommendations for a reader
///
/// Readers with fewer than three books on their read shelf get popular books
/// followed by random discoveries. Everyone else gets candidates from genres
/// they have read, ranked by genre preference, community rating, approved
/// review volume and shelf popularity, back-filled with popular books up to
/// twelve and topped up with random discoveries.
///
/// Books on the read shelf are never recommended and no book appears twice.
/// Store failures abort the whole computation.
#[tracing::instrument(skip(store))]
pub async fn get_recommendations(
    store: &dyn CatalogStore,
    user_id: Uuid,
) -> AppResult<Vec<Recommendation>> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let read_ids = user.shelves.read;
    let read_books = store
        .find_books(&BookQuery::new(
            BookFilter::default().with_ids(read_ids.iter().copied()),
        ))
        .await?;

    let mut recommendations = if read_books.len() < PERSONALIZATION_THRESHOLD {
        tracing::debug!(read = read_books.len(), "Using cold-start recommendations");
        cold_start(store, &read_ids).await?
    } else {
        tracing::debug!(read = read_books.len(), "Using personalized recommendations");
        personalized(store, &read_ids, &read_books)
            .await?
            .into_iter()
            .map(Recommendation::from)
            .collect()
    };
    recommendations.truncate(MAX_RECOMMENDATIONS);

    tracing::info!(count = recommendations.len(), "Recommendations generated");

    Ok(recommendations)
}

async fn cold_start(
    store: &dyn CatalogStore,
    read_ids: &[Uuid],
) -> AppResult<Vec<Recommendation>> {
    let popular = store
        .find_books(
            &BookQuery::new(
                BookFilter::default()
                    .excluding(read_ids.iter().copied())
                    .min_rating(QUALITY_RATING)
                    .min_rating_count(1),
            )
            .sort(BookSort::Rating)
            .limit(COLD_START_POPULAR),
        )
        .await?;

    let remaining = store
        .find_books(&BookQuery::new(
            BookFilter::default()
                .excluding(read_ids.iter().copied())
                .excluding(popular.iter().map(|b| b.id)),
        ))
        .await?;

    let mut recommendations: Vec<Recommendation> = popular
        .into_iter()
        .map(|book| {
            let reason = format!(
                "Popular choice with {} reviews ({:.1}★)",
                book.rating_count, book.average_rating
            );
            Recommendation::new(book, reason)
        })
        .collect();

    recommendations.extend(
        sample_discovery(remaining, COLD_START_DISCOVERY)
            .into_iter()
            .map(|book| Recommendation::new(book, DISCOVERY_REASON)),
    );

    Ok(recommendations)
}

async fn personalized(
    store: &dyn CatalogStore,
    read_ids: &[Uuid],
    read_books: &[Book],
) -> AppResult<Vec<ScoredBook>> {
    let profile = GenreProfile::from_books(read_books);

    let candidates = store
        .find_books(&BookQuery::new(
            BookFilter::default()
                .excluding(read_ids.iter().copied())
                .in_genres(profile.genres()),
        ))
        .await?;

    let candidate_ids: Vec<Uuid> = candidates.iter().map(|b| b.id).collect();
    let review_counts = store.approved_review_counts(&candidate_ids).await?;

    let mut ranked: Vec<ScoredBook> = candidates
        .into_iter()
        .map(|book| {
            let approved = review_counts.get(&book.id).copied().unwrap_or(0);
            score_candidate(book, &profile, approved)
        })
        .collect();

    // Stable, so equal scores keep store order
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(RANKED_TARGET);

    if ranked.len() < RANKED_TARGET {
        let shortfall = RANKED_TARGET - ranked.len();
        let backfill = store
            .find_books(
                &BookQuery::new(
                    BookFilter::default()
                        .excluding(read_ids.iter().copied())
                        .excluding(ranked.iter().map(|s| s.book.id))
                        .min_rating(QUALITY_RATING),
                )
                .sort(BookSort::Rating)
                .limit(shortfall as i64),
            )
            .await?;

        tracing::debug!(shortfall, added = backfill.len(), "Back-filled with popular books");

        ranked.extend(backfill.into_iter().map(|book| ScoredBook {
            reason: format!("Popular choice ({:.1}★)", book.average_rating),
            book,
            score: BACKFILL_SCORE,
        }));
    }

    let discovery_count = DISCOVERY_TOP_UP.min(MAX_RECOMMENDATIONS.saturating_sub(ranked.len()));
    if discovery_count > 0 {
        let pool = store
            .find_books(&BookQuery::new(
                BookFilter::default()
                    .excluding(read_ids.iter().copied())
                    .excluding(ranked.iter().map(|s| s.book.id)),
            ))
            .await?;

        ranked.extend(
            sample_discovery(pool, discovery_count)
                .into_iter()
                .map(|book| ScoredBook {
                    book,
                    score: DISCOVERY_SCORE,
                    reason: DISCOVERY_REASON.to_string(),
                }),
        );
    }

    Ok(ranked)
}

use chrono::{Datelike, Utc};

use super::types::{
    CreateMovieRequest, CreateReviewRequest, Movie, MovieCreatedResponse, Review,
    ReviewCreatedResponse, MAX_RATING,
};
use crate::accounts::service::require_account;
use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use crate::tasks::tracker::{increment_movie_uploaded, increment_review_posted};
use crate::types::AccountId;

/// Year of the first surviving motion picture.
const EARLIEST_RELEASE_YEAR: i32 = 1888;
/// Announced titles may carry a release year this far ahead.
const MAX_YEARS_AHEAD: i32 = 10;

/// Records a movie and counts the upload against the uploader's tasks.
pub fn create_movie(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    request: CreateMovieRequest,
) -> AppResult<MovieCreatedResponse> {
    require_account(uow, account_id)?;

    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title is required".into()));
    }
    let latest = Utc::now().year() + MAX_YEARS_AHEAD;
    if !(EARLIEST_RELEASE_YEAR..=latest).contains(&request.year) {
        return Err(AppError::InvalidInput(format!(
            "year must be between {EARLIEST_RELEASE_YEAR} and {latest}"
        )));
    }
    if uow
        .iter::<Movie>()
        .any(|m| m.title.eq_ignore_ascii_case(&title))
    {
        return Err(AppError::AlreadyExists(format!("Movie `{title}`")));
    }

    let movie = uow.insert(|id| Movie {
        id,
        account_id,
        title,
        description: request.description.trim().to_string(),
        year: request.year,
        genre: request.genre.trim().to_string(),
        director: request.director.trim().to_string(),
        created_at: Utc::now(),
    });
    log::info!("Account {} uploaded movie {} `{}`", account_id, movie.id, movie.title);

    let tasks = increment_movie_uploaded(uow, account_id)?;
    Ok(MovieCreatedResponse { movie, tasks })
}

/// Records a review and counts it against the reviewer's tasks.
pub fn create_review(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    request: CreateReviewRequest,
) -> AppResult<ReviewCreatedResponse> {
    require_account(uow, account_id)?;
    if uow.get::<Movie>(request.movie_id).is_none() {
        return Err(AppError::MovieNotFound(request.movie_id));
    }
    if !(0.0..=MAX_RATING).contains(&request.rating) {
        return Err(AppError::InvalidInput(format!(
            "rating must be between 0 and {MAX_RATING}"
        )));
    }
    let text = request.review.trim().to_string();
    if text.is_empty() {
        return Err(AppError::InvalidInput("review text is required".into()));
    }

    let review = uow.insert(|id| Review {
        id,
        movie_id: request.movie_id,
        account_id,
        review: text,
        rating: request.rating,
        created_at: Utc::now(),
    });
    log::info!(
        "Account {} reviewed movie {} ({})",
        account_id,
        review.movie_id,
        review.rating
    );

    let tasks = increment_review_posted(uow, account_id)?;
    Ok(ReviewCreatedResponse { review, tasks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::tasks::assignment::assign_task_by_category_id;
    use crate::tasks::types::TaskState;
    use crate::test_utils::{seed_account, seed_category};

    fn movie(title: &str, year: i32) -> CreateMovieRequest {
        CreateMovieRequest {
            title: title.into(),
            description: "A crew plans one last job".into(),
            year,
            genre: "Crime".into(),
            director: "Michael Mann".into(),
        }
    }

    fn review(movie_id: i64, rating: f32) -> CreateReviewRequest {
        CreateReviewRequest {
            movie_id,
            review: "Tense from start to finish".into(),
            rating,
        }
    }

    #[tokio::test]
    async fn test_movie_upload_advances_tasks() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "alice");
        let cat = seed_category(&mut uow, 1, 1, 0, "2");
        assign_task_by_category_id(&mut uow, account_id, cat).unwrap();

        let created = create_movie(&mut uow, account_id, movie("Heat", 1995)).unwrap();
        assert_eq!(created.movie.title, "Heat");
        assert_eq!(created.tasks.len(), 1);
        assert_eq!(created.tasks[0].state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_movie_validation() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "bob");
        create_movie(&mut uow, account_id, movie("Heat", 1995)).unwrap();

        assert!(matches!(
            create_movie(&mut uow, account_id, movie("heat", 1995)),
            Err(AppError::AlreadyExists(_))
        ));
        assert!(matches!(
            create_movie(&mut uow, account_id, movie("Roundhay Garden", 1700)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            create_movie(&mut uow, account_id, movie(" ", 2000)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            create_movie(&mut uow, 77, movie("Thief", 1981)),
            Err(AppError::AccountNotFound(77))
        ));
    }

    #[tokio::test]
    async fn test_review_validation() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "carol");
        let movie_id = create_movie(&mut uow, account_id, movie("Collateral", 2004))
            .unwrap()
            .movie
            .id;

        assert!(matches!(
            create_review(&mut uow, account_id, review(movie_id + 1, 5.0)),
            Err(AppError::MovieNotFound(_))
        ));
        assert!(matches!(
            create_review(&mut uow, account_id, review(movie_id, 10.5)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            create_review(&mut uow, account_id, review(movie_id, -1.0)),
            Err(AppError::InvalidInput(_))
        ));

        for rating in [0.0, MAX_RATING] {
            let created = create_review(&mut uow, account_id, review(movie_id, rating)).unwrap();
            assert_eq!(created.review.rating, rating);
        }
        assert_eq!(uow.iter::<Review>().count(), 2);
    }
}

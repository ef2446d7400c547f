use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::tasks::types::TaskResponse;
use crate::types::{AccountId, MovieId, ReviewId};

pub const MAX_RATING: f32 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Movie {
    pub id: MovieId,
    pub account_id: AccountId,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub genre: String,
    pub director: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: ReviewId,
    pub movie_id: MovieId,
    pub account_id: AccountId,
    pub review: String,
    pub rating: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateMovieRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub year: i32,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub director: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub movie_id: MovieId,
    pub review: String,
    pub rating: f32,
}

/// A recorded movie together with the uploader's task progress after the upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MovieCreatedResponse {
    pub movie: Movie,
    pub tasks: Vec<TaskResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewCreatedResponse {
    pub review: Review,
    pub tasks: Vec<TaskResponse>,
}

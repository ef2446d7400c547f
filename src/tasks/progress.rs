const MOVIE_WEIGHT: f64 = 0.5;
const REVIEW_WEIGHT: f64 = 0.5;

/// Percentage (0-100) of one requirement dimension, or `None` when the
/// dimension has no requirement and must be left out of the weighting.
fn dimension_progress(done: u32, threshold: u32) -> Option<f64> {
    if threshold == 0 {
        return None;
    }
    Some((done as f64 / threshold as f64 * 100.0).min(100.0))
}

/// Weighted completion percentage of a task.
///
/// Movies and reviews weigh 0.5 each. A dimension whose threshold is zero is
/// excluded and the remaining weight is renormalized, so a movies-only task is
/// measured purely on movies. With no requirement at all the task counts as
/// fully done.
pub fn weighted_progress(
    movies_done: u32,
    reviews_done: u32,
    movie_threshold: u32,
    review_threshold: u32,
) -> f64 {
    let dimensions = [
        (dimension_progress(movies_done, movie_threshold), MOVIE_WEIGHT),
        (dimension_progress(reviews_done, review_threshold), REVIEW_WEIGHT),
    ];

    let total_weight: f64 = dimensions
        .iter()
        .filter(|(progress, _)| progress.is_some())
        .map(|(_, weight)| weight)
        .sum();

    if total_weight == 0.0 {
        return 100.0;
    }

    dimensions
        .iter()
        .filter_map(|(progress, weight)| progress.map(|p| p * weight / total_weight))
        .sum::<f64>()
        .clamp(0.0, 100.0)
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use super::progress::weighted_progress;
use crate::error::{AppError, AppResult};
use crate::types::{AccountId, CategoryId, TaskId, WalletId};

/// Access level whose categories every new account starts with.
pub const DEFAULT_TASK_LEVEL: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub access_level: i32,
    pub movies_uploaded_count: u32,
    pub reviews_posted_count: u32,
    pub total_movies_uploaded: u32,
    pub total_reviews_posted: u32,
    pub task_reward: Decimal,
}

/// Lifecycle of a task. Transitions only move forward:
/// `Active -> Completed` once both thresholds are met, `Completed -> Claimed`
/// once the reward is paid out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskState {
    Active,
    Completed,
    Claimed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub account_id: AccountId,
    pub task_category_id: CategoryId,
    pub movies_uploaded_since_task_start: u32,
    pub reviews_posted_since_task_start: u32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        account_id: AccountId,
        task_category_id: CategoryId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            task_category_id,
            movies_uploaded_since_task_start: 0,
            reviews_posted_since_task_start: 0,
            state: TaskState::Active,
            created_at: now,
            updated_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, TaskState::Completed | TaskState::Claimed)
    }

    pub fn is_claimed(&self) -> bool {
        self.state == TaskState::Claimed
    }

    /// Counts one uploaded movie. Returns false when the task is no longer
    /// active or the movie requirement is already met.
    pub fn record_movie_upload(&mut self, category: &TaskCategory) -> bool {
        if self.state != TaskState::Active
            || self.movies_uploaded_since_task_start >= category.movies_uploaded_count
        {
            return false;
        }
        self.movies_uploaded_since_task_start += 1;
        true
    }

    /// Counts one posted review, with the same clamping as movie uploads.
    pub fn record_review(&mut self, category: &TaskCategory) -> bool {
        if self.state != TaskState::Active
            || self.reviews_posted_since_task_start >= category.reviews_posted_count
        {
            return false;
        }
        self.reviews_posted_since_task_start += 1;
        true
    }

    pub fn thresholds_met(&self, category: &TaskCategory) -> bool {
        self.movies_uploaded_since_task_start >= category.movies_uploaded_count
            && self.reviews_posted_since_task_start >= category.reviews_posted_count
    }

    /// The only place a task becomes completed. Returns true if the state changed.
    pub fn refresh_completion(&mut self, category: &TaskCategory) -> bool {
        if self.state == TaskState::Active && self.thresholds_met(category) {
            self.state = TaskState::Completed;
            return true;
        }
        false
    }

    /// Moves a completed task to claimed. Paying the reward is the caller's job.
    pub fn claim(&mut self) -> AppResult<()> {
        match self.state {
            TaskState::Active => Err(AppError::TaskNotComplete(self.id)),
            TaskState::Claimed => Err(AppError::RewardAlreadyClaimed(self.id)),
            TaskState::Completed => {
                self.state = TaskState::Claimed;
                Ok(())
            }
        }
    }

    pub fn progress(&self, category: &TaskCategory) -> f64 {
        weighted_progress(
            self.movies_uploaded_since_task_start,
            self.reviews_posted_since_task_start,
            category.movies_uploaded_count,
            category.reviews_posted_count,
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: TaskId,
    pub task_category: TaskCategory,
    pub state: TaskState,
    pub is_completed: bool,
    pub is_claimed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub movies_uploaded_since_task_start: u32,
    pub reviews_posted_since_task_start: u32,
    pub progress: f64,
}

impl TaskResponse {
    pub fn new(task: &Task, category: &TaskCategory) -> Self {
        Self {
            id: task.id,
            task_category: category.clone(),
            state: task.state,
            is_completed: task.is_completed(),
            is_claimed: task.is_claimed(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            movies_uploaded_since_task_start: task.movies_uploaded_since_task_start,
            reviews_posted_since_task_start: task.reviews_posted_since_task_start,
            progress: task.progress(category),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimResponse {
    pub task: TaskResponse,
    pub wallet_id: WalletId,
    pub wallet_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTaskCategoryRequest {
    pub name: String,
    pub description: String,
    pub access_level: i32,
    pub movies_uploaded_count: u32,
    pub reviews_posted_count: u32,
    #[serde(default)]
    pub total_movies_uploaded: u32,
    #[serde(default)]
    pub total_reviews_posted: u32,
    pub task_reward: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignTaskRequest {
    pub account_id: AccountId,
    pub task_level: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignTaskByCategoryRequest {
    pub account_id: AccountId,
    pub task_category_id: CategoryId,
}

use chrono::Utc;

use super::types::{Task, TaskCategory, TaskResponse};
use crate::accounts::service::require_account;
use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use crate::types::{AccountId, CategoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    MovieUploaded,
    ReviewPosted,
}

pub(crate) fn load_category<'u>(uow: &'u UnitOfWork<'_>, id: CategoryId) -> AppResult<&'u TaskCategory> {
    uow.get::<TaskCategory>(id)
        .ok_or(AppError::CategoryNotFound(id))
}

/// Counts one uploaded movie against every incomplete task of the account.
pub fn increment_movie_uploaded(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
) -> AppResult<Vec<TaskResponse>> {
    record_activity(uow, account_id, Activity::MovieUploaded)
}

/// Counts one posted review against every incomplete task of the account.
pub fn increment_review_posted(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
) -> AppResult<Vec<TaskResponse>> {
    record_activity(uow, account_id, Activity::ReviewPosted)
}

fn record_activity(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    activity: Activity,
) -> AppResult<Vec<TaskResponse>> {
    require_account(uow, account_id)?;

    let now = Utc::now();
    let open = uow.ids_where::<Task>(|t| t.account_id == account_id && !t.is_completed());

    for task_id in open {
        let Some(task) = uow.get::<Task>(task_id) else {
            continue;
        };
        let category = load_category(uow, task.task_category_id)?.clone();

        let Some(task) = uow.get_mut::<Task>(task_id) else {
            continue;
        };
        let counted = match activity {
            Activity::MovieUploaded => task.record_movie_upload(&category),
            Activity::ReviewPosted => task.record_review(&category),
        };
        let completed = task.refresh_completion(&category);

        if counted || completed {
            task.updated_at = Some(now);
        }
        if completed {
            log::info!(
                "Task {} of account {} completed ({})",
                task_id,
                account_id,
                category.name
            );
        }
    }

    list_tasks(uow, account_id)
}

/// Every task of the account, in assignment order, with its category and progress.
pub fn list_tasks(uow: &UnitOfWork<'_>, account_id: AccountId) -> AppResult<Vec<TaskResponse>> {
    require_account(uow, account_id)?;

    uow.iter::<Task>()
        .filter(|t| t.account_id == account_id)
        .map(|task| {
            let category = load_category(uow, task.task_category_id)?;
            Ok(TaskResponse::new(task, category))
        })
        .collect()
}

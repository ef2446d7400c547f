use std::collections::BTreeSet;

use chrono::Utc;
use rust_decimal::Decimal;

use super::tracker::load_category;
use super::types::{CreateTaskCategoryRequest, Task, TaskCategory, TaskResponse, DEFAULT_TASK_LEVEL};
use crate::accounts::service::require_account;
use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use crate::types::{AccountId, CategoryId};

pub fn create_task_category(
    uow: &mut UnitOfWork<'_>,
    request: CreateTaskCategoryRequest,
) -> AppResult<TaskCategory> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("category name must not be empty".into()));
    }
    if request.access_level < DEFAULT_TASK_LEVEL {
        return Err(AppError::InvalidInput(format!(
            "access level must be at least {DEFAULT_TASK_LEVEL}"
        )));
    }
    if request.task_reward < Decimal::ZERO {
        return Err(AppError::InvalidInput("task reward must not be negative".into()));
    }

    let category = uow.insert(|id| TaskCategory {
        id,
        name: name.to_string(),
        description: request.description,
        access_level: request.access_level,
        movies_uploaded_count: request.movies_uploaded_count,
        reviews_posted_count: request.reviews_posted_count,
        total_movies_uploaded: request.total_movies_uploaded,
        total_reviews_posted: request.total_reviews_posted,
        task_reward: request.task_reward,
    });
    log::info!(
        "Created task category {} `{}` at level {}",
        category.id,
        category.name,
        category.access_level
    );
    Ok(category)
}

pub fn list_task_categories(uow: &UnitOfWork<'_>) -> Vec<TaskCategory> {
    uow.iter::<TaskCategory>().cloned().collect()
}

fn held_categories(uow: &UnitOfWork<'_>, account_id: AccountId) -> BTreeSet<CategoryId> {
    uow.iter::<Task>()
        .filter(|t| t.account_id == account_id)
        .map(|t| t.task_category_id)
        .collect()
}

fn create_task(uow: &mut UnitOfWork<'_>, account_id: AccountId, category_id: CategoryId) -> Task {
    let now = Utc::now();
    let task = uow.insert(|id| Task::new(id, account_id, category_id, now));
    log::info!(
        "Assigned task {} (category {}) to account {}",
        task.id,
        category_id,
        account_id
    );
    task
}

/// Assigns the lowest-id category of `level` the account does not hold yet.
pub fn assign_task(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    level: i32,
) -> AppResult<TaskResponse> {
    require_account(uow, account_id)?;

    let at_level = uow.ids_where::<TaskCategory>(|c| c.access_level == level);
    if at_level.is_empty() {
        return Err(AppError::NoCategoriesForLevel(level));
    }

    let held = held_categories(uow, account_id);
    let category_id = at_level
        .into_iter()
        .find(|id| !held.contains(id))
        .ok_or(AppError::NoAvailableTask(level))?;

    let task = create_task(uow, account_id, category_id);
    Ok(TaskResponse::new(&task, load_category(uow, category_id)?))
}

pub fn assign_task_by_category_id(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    category_id: CategoryId,
) -> AppResult<TaskResponse> {
    require_account(uow, account_id)?;
    load_category(uow, category_id)?;

    if held_categories(uow, account_id).contains(&category_id) {
        return Err(AppError::AlreadyExists(format!(
            "Task for category {category_id} on account {account_id}"
        )));
    }

    let task = create_task(uow, account_id, category_id);
    Ok(TaskResponse::new(&task, load_category(uow, category_id)?))
}

/// Gives a new account one task for every entry-level category.
pub fn bootstrap_tasks(uow: &mut UnitOfWork<'_>, account_id: AccountId) -> Vec<Task> {
    uow.ids_where::<TaskCategory>(|c| c.access_level == DEFAULT_TASK_LEVEL)
        .into_iter()
        .map(|category_id| create_task(uow, account_id, category_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_utils::{seed_account, seed_category};

    fn category_request(level: i32, reward: Decimal) -> CreateTaskCategoryRequest {
        CreateTaskCategoryRequest {
            name: "Weekend critic".into(),
            description: "Review three films".into(),
            access_level: level,
            movies_uploaded_count: 0,
            reviews_posted_count: 3,
            total_movies_uploaded: 0,
            total_reviews_posted: 0,
            task_reward: reward,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_categories() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;

        let created = create_task_category(&mut uow, category_request(2, Decimal::new(25, 1))).unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.task_reward, Decimal::new(25, 1));

        let listed = list_task_categories(&uow);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Weekend critic");
    }

    #[tokio::test]
    async fn test_create_category_validation() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;

        let negative = create_task_category(&mut uow, category_request(1, Decimal::new(-1, 0)));
        assert!(matches!(negative, Err(AppError::InvalidInput(_))));

        let level_zero = create_task_category(&mut uow, category_request(0, Decimal::ONE));
        assert!(matches!(level_zero, Err(AppError::InvalidInput(_))));

        let mut blank = category_request(1, Decimal::ONE);
        blank.name = "   ".into();
        assert!(matches!(
            create_task_category(&mut uow, blank),
            Err(AppError::InvalidInput(_))
        ));
        assert!(list_task_categories(&uow).is_empty());
    }

    #[tokio::test]
    async fn test_assign_task_walks_level_in_id_order() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "alice");
        let first = seed_category(&mut uow, 2, 1, 1, "1");
        seed_category(&mut uow, 3, 1, 1, "1");
        let second = seed_category(&mut uow, 2, 2, 2, "2");

        let task = assign_task(&mut uow, account_id, 2).unwrap();
        assert_eq!(task.task_category.id, first);
        assert!(!task.is_completed);

        let task = assign_task(&mut uow, account_id, 2).unwrap();
        assert_eq!(task.task_category.id, second);

        assert!(matches!(
            assign_task(&mut uow, account_id, 2),
            Err(AppError::NoAvailableTask(2))
        ));
        assert!(matches!(
            assign_task(&mut uow, account_id, 7),
            Err(AppError::NoCategoriesForLevel(7))
        ));
    }

    #[tokio::test]
    async fn test_assign_by_category_keeps_pairs_unique() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "bob");
        let cat = seed_category(&mut uow, 4, 1, 1, "3");

        let task = assign_task_by_category_id(&mut uow, account_id, cat).unwrap();
        assert_eq!(task.movies_uploaded_since_task_start, 0);

        assert!(matches!(
            assign_task_by_category_id(&mut uow, account_id, cat),
            Err(AppError::AlreadyExists(_))
        ));
        assert!(matches!(
            assign_task_by_category_id(&mut uow, account_id, 99),
            Err(AppError::CategoryNotFound(99))
        ));
        assert!(matches!(
            assign_task_by_category_id(&mut uow, 42, cat),
            Err(AppError::AccountNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_only_takes_level_one() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "carol");
        let a = seed_category(&mut uow, 1, 1, 0, "1");
        seed_category(&mut uow, 2, 1, 0, "1");
        let b = seed_category(&mut uow, 1, 0, 1, "1");

        let tasks = bootstrap_tasks(&mut uow, account_id);
        let categories: Vec<_> = tasks.iter().map(|t| t.task_category_id).collect();
        assert_eq!(categories, vec![a, b]);
    }
}

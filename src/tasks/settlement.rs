use chrono::Utc;

use super::tracker::load_category;
use super::types::{ClaimResponse, Task, TaskResponse};
use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use crate::types::{AccountId, TaskId};
use crate::wallet::ledger::wallet_id_for_account;
use crate::wallet::types::Wallet;

/// Marks a completed task as claimed and credits its reward to the owner's
/// wallet. Both changes live in the caller's unit of work, so they are
/// committed or dropped together.
pub fn claim_reward(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    task_id: TaskId,
) -> AppResult<ClaimResponse> {
    let task = uow
        .get::<Task>(task_id)
        .filter(|t| t.account_id == account_id)
        .ok_or(AppError::TaskNotFound(task_id))?;
    let category = load_category(uow, task.task_category_id)?.clone();
    let wallet_id = wallet_id_for_account(uow, account_id)?;

    let now = Utc::now();
    let task = uow
        .get_mut::<Task>(task_id)
        .ok_or(AppError::TaskNotFound(task_id))?;
    task.claim()?;
    task.updated_at = Some(now);
    let task = task.clone();

    let wallet = uow
        .get_mut::<Wallet>(wallet_id)
        .ok_or(AppError::WalletNotFound(wallet_id))?;
    wallet.credit(category.task_reward, now);

    log::info!(
        "Account {} claimed {} for task {}, balance now {}",
        account_id,
        category.task_reward,
        task_id,
        wallet.balance
    );

    Ok(ClaimResponse {
        wallet_id,
        wallet_balance: wallet.balance,
        task: TaskResponse::new(&task, &category),
    })
}

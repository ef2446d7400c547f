use chrono::Utc;

use super::types::{Account, AccountResponse, CreateAccountRequest};
use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use crate::tasks::assignment::bootstrap_tasks;
use crate::tasks::types::Task;
use crate::types::AccountId;
use crate::wallet::ledger::wallet_id_for_account;
use crate::wallet::types::Wallet;

pub fn require_account<'u>(uow: &'u UnitOfWork<'_>, account_id: AccountId) -> AppResult<&'u Account> {
    uow.get::<Account>(account_id)
        .ok_or(AppError::AccountNotFound(account_id))
}

/// Creates the account, its empty wallet and one task per entry-level
/// category, all in the caller's unit of work.
pub fn create_account(
    uow: &mut UnitOfWork<'_>,
    request: CreateAccountRequest,
) -> AppResult<AccountResponse> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();
    if username.is_empty() {
        return Err(AppError::InvalidInput("username is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::InvalidInput(format!("`{email}` is not an email address")));
    }
    if uow.iter::<Account>().any(|a| a.username == username) {
        return Err(AppError::AlreadyExists(format!("Account `{username}`")));
    }

    let now = Utc::now();
    let account = uow.insert(|id| Account {
        id,
        username,
        email,
        created_at: now,
    });
    let wallet = uow.insert(|id| Wallet::new(id, account.id, now));
    let tasks = bootstrap_tasks(uow, account.id);

    log::info!(
        "Created account {} with wallet {} and {} starter tasks",
        account.id,
        wallet.id,
        tasks.len()
    );

    Ok(AccountResponse {
        account,
        wallet_id: wallet.id,
        balance: wallet.balance,
        task_count: tasks.len(),
    })
}

pub fn read_account(uow: &UnitOfWork<'_>, account_id: AccountId) -> AppResult<AccountResponse> {
    let account = require_account(uow, account_id)?.clone();
    let wallet_id = wallet_id_for_account(uow, account_id)?;
    let balance = uow
        .get::<Wallet>(wallet_id)
        .map(|w| w.balance)
        .ok_or(AppError::WalletNotFound(wallet_id))?;
    let task_count = uow.iter::<Task>().filter(|t| t.account_id == account_id).count();

    Ok(AccountResponse {
        account,
        wallet_id,
        balance,
        task_count,
    })
}

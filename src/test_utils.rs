//! Fixtures shared by the unit tests.

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::accounts::types::Account;
use crate::store::UnitOfWork;
use crate::tasks::types::TaskCategory;
use crate::types::{AccountId, CategoryId};
use crate::wallet::ledger::wallet_id_for_account;
use crate::wallet::types::Wallet;

/// Account with an empty wallet and no tasks.
pub fn seed_account(uow: &mut UnitOfWork<'_>, username: &str) -> AccountId {
    let now = Utc::now();
    let account = uow.insert(|id| Account {
        id,
        username: username.to_string(),
        email: format!("{username}@reel.test"),
        created_at: now,
    });
    uow.insert(|id| Wallet::new(id, account.id, now));
    account.id
}

pub fn seed_category(
    uow: &mut UnitOfWork<'_>,
    access_level: i32,
    movies: u32,
    reviews: u32,
    reward: &str,
) -> CategoryId {
    uow.insert(|id| TaskCategory {
        id,
        name: format!("Level {access_level} #{id}"),
        description: format!("Upload {movies} movies and post {reviews} reviews"),
        access_level,
        movies_uploaded_count: movies,
        reviews_posted_count: reviews,
        total_movies_uploaded: 0,
        total_reviews_posted: 0,
        task_reward: Decimal::from_str(reward).unwrap(),
    })
    .id
}

pub fn wallet_balance(uow: &UnitOfWork<'_>, account_id: AccountId) -> Decimal {
    let wallet_id = wallet_id_for_account(uow, account_id).unwrap();
    uow.get::<Wallet>(wallet_id).unwrap().balance
}

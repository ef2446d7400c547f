//! Table storage behind an explicit unit of work.
//!
//! Every request opens one [`UnitOfWork`], which holds the store lock for its
//! whole lifetime, so units of work never interleave. Changes become durable on
//! [`UnitOfWork::commit`]; dropping an uncommitted unit of work restores every
//! record it touched.

pub mod redis_mirror;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, MutexGuard};

pub use redis_mirror::RedisMirror;

use crate::accounts::types::Account;
use crate::error::{AppError, AppResult};
use crate::movies::types::{Movie, Review};
use crate::tasks::types::{Task, TaskCategory};
use crate::wallet::types::{Transaction, Wallet};

#[derive(Debug, Default, Clone)]
pub struct Tables {
    accounts: BTreeMap<i64, Account>,
    wallets: BTreeMap<i64, Wallet>,
    task_categories: BTreeMap<i64, TaskCategory>,
    tasks: BTreeMap<i64, Task>,
    transactions: BTreeMap<i64, Transaction>,
    movies: BTreeMap<i64, Movie>,
    reviews: BTreeMap<i64, Review>,
}

/// A row type stored in [`Tables`], keyed by an auto-incremented id.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record kind, used in mirror keys.
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn table(tables: &Tables) -> &BTreeMap<i64, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self>;
}

macro_rules! impl_entity {
    ($ty:ty, $kind:literal, $field:ident) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> i64 {
                self.id
            }

            fn table(tables: &Tables) -> &BTreeMap<i64, Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
                &mut tables.$field
            }
        }
    };
}

impl_entity!(Account, "account", accounts);
impl_entity!(Wallet, "wallet", wallets);
impl_entity!(TaskCategory, "task_category", task_categories);
impl_entity!(Task, "task", tasks);
impl_entity!(Transaction, "transaction", transactions);
impl_entity!(Movie, "movie", movies);
impl_entity!(Review, "review", reviews);

type Encoder = fn(&Tables, i64) -> serde_json::Result<Option<String>>;
type Loader = fn(&mut Tables, &str) -> serde_json::Result<()>;
type Undo = Box<dyn FnOnce(&mut Tables) + Send>;

fn encode<T: Entity>(tables: &Tables, id: i64) -> serde_json::Result<Option<String>> {
    T::table(tables).get(&id).map(serde_json::to_string).transpose()
}

fn load<T: Entity>(tables: &mut Tables, json: &str) -> serde_json::Result<()> {
    let record: T = serde_json::from_str(json)?;
    T::table_mut(tables).insert(record.id(), record);
    Ok(())
}

const LOADERS: &[(&str, Loader)] = &[
    (Account::KIND, load::<Account>),
    (Wallet::KIND, load::<Wallet>),
    (TaskCategory::KIND, load::<TaskCategory>),
    (Task::KIND, load::<Task>),
    (Transaction::KIND, load::<Transaction>),
    (Movie::KIND, load::<Movie>),
    (Review::KIND, load::<Review>),
];

impl Tables {
    /// Inserts a serialized record of the given kind, as written by the mirror.
    pub fn load_record(&mut self, kind: &str, json: &str) -> Result<()> {
        let (_, loader) = LOADERS
            .iter()
            .find(|(k, _)| *k == kind)
            .ok_or_else(|| anyhow::anyhow!("unknown record kind `{kind}`"))?;
        loader(self, json)?;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.accounts.len()
            + self.wallets.len()
            + self.task_categories.len()
            + self.tasks.len()
            + self.transactions.len()
            + self.movies.len()
            + self.reviews.len()
    }
}

#[derive(Clone)]
pub struct Store {
    tables: Arc<Mutex<Tables>>,
    mirror: Option<Arc<RedisMirror>>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            mirror: None,
        }
    }

    /// Loads every mirrored record and keeps writing commits through to Redis.
    pub async fn with_redis_mirror(mirror: RedisMirror) -> Result<Self> {
        let tables = mirror.load_tables().await?;
        log::info!(
            "Loaded {} records from redis mirror",
            tables.record_count()
        );
        Ok(Self {
            tables: Arc::new(Mutex::new(tables)),
            mirror: Some(Arc::new(mirror)),
        })
    }

    pub async fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            tables: self.tables.lock().await,
            mirror: self.mirror.as_deref(),
            touched: BTreeMap::new(),
            undo: Vec::new(),
            committed: false,
        }
    }
}

pub struct UnitOfWork<'a> {
    tables: MutexGuard<'a, Tables>,
    mirror: Option<&'a RedisMirror>,
    touched: BTreeMap<(&'static str, i64), Encoder>,
    undo: Vec<Undo>,
    committed: bool,
}

impl UnitOfWork<'_> {
    pub fn get<T: Entity>(&self, id: i64) -> Option<&T> {
        T::table(&self.tables).get(&id)
    }

    pub fn get_mut<T: Entity>(&mut self, id: i64) -> Option<&mut T> {
        if !T::table(&self.tables).contains_key(&id) {
            return None;
        }
        self.touch::<T>(id);
        T::table_mut(&mut self.tables).get_mut(&id)
    }

    /// Rows in id order.
    pub fn iter<T: Entity>(&self) -> impl Iterator<Item = &T> {
        T::table(&self.tables).values()
    }

    /// Ids of the rows matching `filter`, in id order.
    pub fn ids_where<T: Entity>(&self, filter: impl Fn(&T) -> bool) -> Vec<i64> {
        self.iter::<T>()
            .filter(|row| filter(row))
            .map(Entity::id)
            .collect()
    }

    /// Inserts a row built from the next free id and returns a copy of it.
    pub fn insert<T: Entity>(&mut self, build: impl FnOnce(i64) -> T) -> T {
        let id = T::table(&self.tables)
            .last_key_value()
            .map(|(id, _)| id + 1)
            .unwrap_or(1);
        self.touch::<T>(id);
        let row = build(id);
        T::table_mut(&mut self.tables).insert(id, row.clone());
        row
    }

    fn touch<T: Entity>(&mut self, id: i64) {
        let key = (T::KIND, id);
        if self.touched.contains_key(&key) {
            return;
        }
        self.touched.insert(key, encode::<T>);

        let previous = T::table(&self.tables).get(&id).cloned();
        self.undo.push(Box::new(move |tables: &mut Tables| {
            let table = T::table_mut(tables);
            match previous {
                Some(row) => {
                    table.insert(id, row);
                }
                None => {
                    table.remove(&id);
                }
            }
        }));
    }

    #[cfg(test)]
    pub fn touched_kinds(&self) -> std::collections::BTreeSet<&'static str> {
        self.touched.keys().map(|(kind, _)| *kind).collect()
    }

    /// Makes the changes permanent. When a mirror is configured the touched
    /// records are written to it first; if that fails nothing is kept.
    pub async fn commit(mut self) -> AppResult<()> {
        if let Some(mirror) = self.mirror {
            let mut writes = Vec::with_capacity(self.touched.len());
            for ((kind, id), encoder) in &self.touched {
                let value = encoder(&self.tables, *id)
                    .map_err(|e| AppError::Storage(format!("failed to encode {kind} {id}: {e}")))?;
                writes.push((mirror.key(kind, *id), value));
            }
            mirror
                .write(writes)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }

        self.committed = true;
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }
        log::debug!("Rolling back {} touched records", self.undo.len());
        while let Some(undo) = self.undo.pop() {
            undo(&mut self.tables);
        }
    }
}

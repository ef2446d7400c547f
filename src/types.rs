pub type RedisPool = bb8::Pool<bb8_redis::RedisConnectionManager>;

pub type AccountId = i64;
pub type WalletId = i64;
pub type TaskId = i64;
pub type CategoryId = i64;
pub type TransactionId = i64;
pub type MovieId = i64;
pub type ReviewId = i64;

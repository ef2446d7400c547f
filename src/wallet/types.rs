use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::types::{AccountId, TransactionId, WalletId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Wallet {
    pub id: WalletId,
    pub account_id: AccountId,
    pub balance: Decimal,
    pub bitcoin_address: Option<String>,
    pub usdt_address: Option<String>,
    pub ethereum_address: Option<String>,
    pub tron_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn new(id: WalletId, account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            account_id,
            balance: Decimal::ZERO,
            bitcoin_address: None,
            usdt_address: None,
            ethereum_address: None,
            tron_address: None,
            created_at: now,
            updated_at: None,
        }
    }

    pub fn credit(&mut self, amount: Decimal, now: DateTime<Utc>) {
        self.balance += amount;
        self.updated_at = Some(now);
    }

    /// Fails without touching the balance when it would go negative.
    pub fn debit(&mut self, amount: Decimal, now: DateTime<Utc>) -> AppResult<()> {
        if amount > self.balance {
            return Err(AppError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.updated_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, ToSchema)]
pub enum TransactionType {
    #[strum(serialize = "top-up")]
    #[serde(rename = "top-up")]
    TopUp,
    #[strum(serialize = "withdraw")]
    #[serde(rename = "withdraw")]
    Withdraw,
}

/// Payment state as reported by the provider. `Pending` is our own state for
/// transactions the provider has not reported on yet; anything unknown is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, SerializeDisplay, DeserializeFromStr)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    #[strum(default)]
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Waiting => "waiting",
            PaymentStatus::Confirming => "confirming",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Sending => "sending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Finished => "finished",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Other(status) => status,
        }
    }

    pub fn is_finished(&self) -> bool {
        *self == PaymentStatus::Finished
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    #[schema(value_type = String)]
    pub transaction_status: PaymentStatus,
    pub transaction_currency: String,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletResponse {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TopUpRequest {
    pub amount: Decimal,
    pub transaction_currency: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub withdrawal_method: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateAddressesRequest {
    pub bitcoin_address: Option<String>,
    pub usdt_address: Option<String>,
    pub ethereum_address: Option<String>,
    pub tron_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddBalanceRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
}

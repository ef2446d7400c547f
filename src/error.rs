use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::types::{AccountId, CategoryId, MovieId, TaskId, WalletId};

/// Coarse classification of [`AppError`], used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    InsufficientFunds,
    Validation,
    SignatureInvalid,
    Unauthorized,
    UpstreamGateway,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Account with id `{0}` does not exist")]
    AccountNotFound(AccountId),
    #[error("Wallet `{0}` does not exist")]
    WalletNotFound(WalletId),
    #[error("Task `{0}` not found for this account")]
    TaskNotFound(TaskId),
    #[error("Task category `{0}` does not exist")]
    CategoryNotFound(CategoryId),
    #[error("Movie `{0}` does not exist")]
    MovieNotFound(MovieId),
    #[error("No transaction found for payment `{0}`")]
    TransactionNotFound(String),
    #[error("No task categories found for level {0}")]
    NoCategoriesForLevel(i32),

    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("No available tasks for level {0}")]
    NoAvailableTask(i32),
    #[error("Task `{0}` reward is already claimed")]
    RewardAlreadyClaimed(TaskId),

    #[error("Task `{0}` is not completed yet")]
    TaskNotComplete(TaskId),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Transaction currency `{0}` is not supported")]
    UnsupportedCurrency(String),
    #[error("Invalid {currency} address `{address}`")]
    InvalidAddress { currency: &'static str, address: String },

    #[error("Signature check failed")]
    SignatureInvalid,
    #[error("Missing x-nowpayments-sig header")]
    MissingSignature,
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Payment gateway error: {0}")]
    UpstreamGateway(String),

    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AccountNotFound(_)
            | AppError::WalletNotFound(_)
            | AppError::TaskNotFound(_)
            | AppError::CategoryNotFound(_)
            | AppError::MovieNotFound(_)
            | AppError::TransactionNotFound(_)
            | AppError::NoCategoriesForLevel(_) => ErrorKind::NotFound,
            AppError::AlreadyExists(_)
            | AppError::NoAvailableTask(_)
            | AppError::RewardAlreadyClaimed(_) => ErrorKind::Conflict,
            AppError::TaskNotComplete(_) => ErrorKind::PreconditionFailed,
            AppError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            AppError::InvalidInput(_)
            | AppError::UnsupportedCurrency(_)
            | AppError::InvalidAddress { .. } => ErrorKind::Validation,
            AppError::SignatureInvalid | AppError::MissingSignature => ErrorKind::SignatureInvalid,
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::UpstreamGateway(_) => ErrorKind::UpstreamGateway,
            AppError::Storage(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorKind::InsufficientFunds | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::SignatureInvalid | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamGateway => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::warn!("Request rejected: {self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

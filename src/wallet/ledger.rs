use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::instrument;

use super::address::{validate_address, AddressKind};
use super::types::{
    AddBalanceRequest, PaymentStatus, TopUpRequest, Transaction, TransactionType,
    UpdateAddressesRequest, Wallet, WalletResponse, WithdrawRequest,
};
use crate::accounts::service::require_account;
use crate::consts::{ORDER_ID_NONCE_MAX, SUPPORTED_TOP_UP_CURRENCIES};
use crate::error::{AppError, AppResult};
use crate::payments::{IpnPayload, NowPaymentsClient, PaymentDetails};
use crate::store::{Store, UnitOfWork};
use crate::types::{AccountId, TransactionId, WalletId};

/// What an IPN did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    StatusUpdated(PaymentStatus),
    Credited { wallet_id: WalletId, amount: Decimal },
    AlreadyFinished,
}

pub fn wallet_id_for_account(uow: &UnitOfWork<'_>, account_id: AccountId) -> AppResult<WalletId> {
    require_account(uow, account_id)?;
    uow.iter::<Wallet>()
        .find(|w| w.account_id == account_id)
        .map(|w| w.id)
        .ok_or_else(|| AppError::Storage(format!("account {account_id} has no wallet")))
}

fn wallet_mut<'u>(uow: &'u mut UnitOfWork<'_>, wallet_id: WalletId) -> AppResult<&'u mut Wallet> {
    uow.get_mut::<Wallet>(wallet_id)
        .ok_or(AppError::WalletNotFound(wallet_id))
}

/// Hex sha256 of `{wallet_id}-{unix seconds}-{nonce}`.
pub fn generate_order_id(wallet_id: WalletId) -> String {
    let nonce = rand::rng().random_range(0..=ORDER_ID_NONCE_MAX);
    let seed = format!("{}-{}-{}", wallet_id, Utc::now().timestamp(), nonce);
    hex::encode(Sha256::digest(seed.as_bytes()))
}

fn require_positive(amount: Decimal, what: &str) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!("{what} must be positive")));
    }
    Ok(())
}

fn normalize_currency(currency: &str) -> AppResult<String> {
    let currency = currency.trim().to_ascii_lowercase();
    if !SUPPORTED_TOP_UP_CURRENCIES.contains(&currency.as_str()) {
        return Err(AppError::UnsupportedCurrency(currency));
    }
    Ok(currency)
}

pub fn read_wallet(uow: &UnitOfWork<'_>, account_id: AccountId) -> AppResult<WalletResponse> {
    let wallet_id = wallet_id_for_account(uow, account_id)?;
    let wallet = uow
        .get::<Wallet>(wallet_id)
        .ok_or(AppError::WalletNotFound(wallet_id))?
        .clone();
    let transactions = uow
        .iter::<Transaction>()
        .filter(|t| t.wallet_id == wallet_id)
        .cloned()
        .collect();
    Ok(WalletResponse {
        wallet,
        transactions,
    })
}

/// Requests a payment from the provider and records it as a pending top-up.
///
/// The store lock is not held while the provider is called: the wallet is
/// resolved in one unit of work and the transaction appended in a second.
#[instrument(skip(store, gateway))]
pub async fn top_up(
    store: &Store,
    gateway: &NowPaymentsClient,
    account_id: AccountId,
    request: TopUpRequest,
) -> AppResult<PaymentDetails> {
    require_positive(request.amount, "top-up amount")?;
    let currency = normalize_currency(&request.transaction_currency)?;

    let wallet_id = {
        let uow = store.begin().await;
        wallet_id_for_account(&uow, account_id)?
    };

    let order_id = generate_order_id(wallet_id);
    let mut payment = gateway
        .create_payment(&order_id, request.amount, &currency)
        .await?;

    let transaction_id = record_top_up(
        store,
        wallet_id,
        request.amount,
        &currency,
        &order_id,
        &payment.payment_id,
    )
    .await
    .inspect_err(|e| {
        log::error!(
            "Payment {} (order {}) was created but could not be recorded for wallet {}: {e}",
            payment.payment_id,
            order_id,
            wallet_id
        )
    })?;

    log::info!(
        "Top-up {} of {} {} requested for wallet {} (payment {})",
        transaction_id,
        request.amount,
        currency,
        wallet_id,
        payment.payment_id
    );

    payment.order_id.get_or_insert(order_id);
    Ok(payment)
}

/// Appends the pending top-up for a payment the provider already created.
async fn record_top_up(
    store: &Store,
    wallet_id: WalletId,
    amount: Decimal,
    currency: &str,
    order_id: &str,
    payment_id: &str,
) -> AppResult<TransactionId> {
    let mut uow = store.begin().await;
    if uow.get::<Wallet>(wallet_id).is_none() {
        return Err(AppError::WalletNotFound(wallet_id));
    }
    let transaction = uow.insert(|id| Transaction {
        id,
        wallet_id,
        amount,
        transaction_type: TransactionType::TopUp,
        transaction_status: PaymentStatus::Pending,
        transaction_currency: currency.to_string(),
        order_id: order_id.to_string(),
        payment_id: Some(payment_id.to_string()),
        created_at: Utc::now(),
        updated_at: None,
    });
    uow.commit().await?;
    Ok(transaction.id)
}

/// Debits the wallet straight away and records a pending withdrawal.
pub fn withdraw(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    request: WithdrawRequest,
) -> AppResult<WalletResponse> {
    require_positive(request.amount, "withdrawal amount")?;
    let method = request.withdrawal_method.trim().to_string();
    if method.is_empty() {
        return Err(AppError::InvalidInput("withdrawal method is required".into()));
    }

    let wallet_id = wallet_id_for_account(uow, account_id)?;
    let now = Utc::now();
    wallet_mut(uow, wallet_id)?.debit(request.amount, now)?;

    let transaction = uow.insert(|id| Transaction {
        id,
        wallet_id,
        amount: request.amount,
        transaction_type: TransactionType::Withdraw,
        transaction_status: PaymentStatus::Pending,
        transaction_currency: method,
        order_id: generate_order_id(wallet_id),
        payment_id: None,
        created_at: now,
        updated_at: None,
    });
    log::info!(
        "Withdrawal {} of {} requested from wallet {}",
        transaction.id,
        transaction.amount,
        wallet_id
    );

    read_wallet(uow, account_id)
}

/// Applies a verified IPN. A transaction that already reached `finished` is
/// left alone, so redelivered notifications never credit twice.
pub fn apply_callback(uow: &mut UnitOfWork<'_>, payload: &IpnPayload) -> AppResult<CallbackOutcome> {
    let transaction = uow
        .iter::<Transaction>()
        .find(|t| t.payment_id.as_deref() == Some(payload.payment_id.as_str()))
        .ok_or_else(|| AppError::TransactionNotFound(payload.payment_id.clone()))?;

    if transaction.transaction_status.is_finished() {
        log::info!(
            "Ignoring {} notification for finished payment {}",
            payload.payment_status,
            payload.payment_id
        );
        return Ok(CallbackOutcome::AlreadyFinished);
    }

    let transaction_id = transaction.id;
    let now = Utc::now();
    let transaction = uow
        .get_mut::<Transaction>(transaction_id)
        .ok_or_else(|| AppError::TransactionNotFound(payload.payment_id.clone()))?;
    transaction.transaction_status = payload.payment_status.clone();
    transaction.updated_at = Some(now);

    if !payload.payment_status.is_finished()
        || transaction.transaction_type != TransactionType::TopUp
    {
        log::info!(
            "Payment {} is now {}",
            payload.payment_id,
            payload.payment_status
        );
        return Ok(CallbackOutcome::StatusUpdated(payload.payment_status.clone()));
    }

    let (wallet_id, amount) = (transaction.wallet_id, transaction.amount);
    let wallet = wallet_mut(uow, wallet_id)?;
    wallet.credit(amount, now);
    log::info!(
        "Payment {} finished, credited {} to wallet {} (balance {})",
        payload.payment_id,
        amount,
        wallet_id,
        wallet.balance
    );

    Ok(CallbackOutcome::Credited { wallet_id, amount })
}

/// The account's transaction for a provider payment id.
pub fn check_payment_status(
    uow: &UnitOfWork<'_>,
    account_id: AccountId,
    payment_id: &str,
) -> AppResult<Transaction> {
    let wallet_id = wallet_id_for_account(uow, account_id)?;
    uow.iter::<Transaction>()
        .find(|t| t.wallet_id == wallet_id && t.payment_id.as_deref() == Some(payment_id))
        .cloned()
        .ok_or_else(|| AppError::TransactionNotFound(payment_id.to_string()))
}

fn checked_address(kind: AddressKind, address: Option<String>) -> AppResult<Option<Option<String>>> {
    match address {
        None => Ok(None),
        Some(a) if a.trim().is_empty() => Ok(Some(None)),
        Some(a) => validate_address(kind, &a).map(|a| Some(Some(a))),
    }
}

/// Sets the payout addresses present in the request; an empty string clears
/// one. Nothing is written unless every given address is valid.
pub fn update_addresses(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    request: UpdateAddressesRequest,
) -> AppResult<Wallet> {
    let bitcoin = checked_address(AddressKind::Bitcoin, request.bitcoin_address)?;
    let usdt = checked_address(AddressKind::Usdt, request.usdt_address)?;
    let ethereum = checked_address(AddressKind::Ethereum, request.ethereum_address)?;
    let tron = checked_address(AddressKind::Tron, request.tron_address)?;

    let wallet_id = wallet_id_for_account(uow, account_id)?;
    let wallet = wallet_mut(uow, wallet_id)?;
    if let Some(address) = bitcoin {
        wallet.bitcoin_address = address;
    }
    if let Some(address) = usdt {
        wallet.usdt_address = address;
    }
    if let Some(address) = ethereum {
        wallet.ethereum_address = address;
    }
    if let Some(address) = tron {
        wallet.tron_address = address;
    }
    wallet.updated_at = Some(Utc::now());

    Ok(wallet.clone())
}

/// Administrative credit.
pub fn add_balance(uow: &mut UnitOfWork<'_>, request: AddBalanceRequest) -> AppResult<Wallet> {
    require_positive(request.amount, "amount")?;
    let wallet_id = wallet_id_for_account(uow, request.account_id)?;
    let wallet = wallet_mut(uow, wallet_id)?;
    wallet.credit(request.amount, Utc::now());
    log::info!(
        "Admin credited {} to wallet {} (balance {})",
        request.amount,
        wallet_id,
        wallet.balance
    );
    Ok(wallet.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_account, wallet_balance};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(payment_id: &str, status: PaymentStatus) -> IpnPayload {
        IpnPayload {
            payment_id: payment_id.into(),
            payment_status: status,
            order_id: None,
            pay_currency: None,
        }
    }

    fn seed_top_up(uow: &mut UnitOfWork<'_>, account_id: AccountId, payment_id: &str, amount: Decimal) {
        let wallet_id = wallet_id_for_account(uow, account_id).unwrap();
        uow.insert(|id| Transaction {
            id,
            wallet_id,
            amount,
            transaction_type: TransactionType::TopUp,
            transaction_status: PaymentStatus::Pending,
            transaction_currency: "btc".into(),
            order_id: generate_order_id(wallet_id),
            payment_id: Some(payment_id.into()),
            created_at: Utc::now(),
            updated_at: None,
        });
    }

    #[test]
    fn test_order_id_is_sha256_hex() {
        let a = generate_order_id(7);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(normalize_currency(" BTC ").unwrap(), "btc");
        assert_eq!(normalize_currency("usdttrc20").unwrap(), "usdttrc20");
        assert_eq!(normalize_currency("TRX").unwrap(), "trx");
        assert!(matches!(
            normalize_currency("doge"),
            Err(AppError::UnsupportedCurrency(c)) if c == "doge"
        ));
    }

    #[tokio::test]
    async fn test_withdraw_overdraft_leaves_balance() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "alice");
        add_balance(
            &mut uow,
            AddBalanceRequest {
                account_id,
                amount: Decimal::new(10, 0),
            },
        )
        .unwrap();

        let err = withdraw(
            &mut uow,
            account_id,
            WithdrawRequest {
                amount: Decimal::new(1001, 2),
                withdrawal_method: "btc".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert_eq!(wallet_balance(&uow, account_id), Decimal::new(10, 0));
        assert!(read_wallet(&uow, account_id).unwrap().transactions.is_empty());

        let wallet = withdraw(
            &mut uow,
            account_id,
            WithdrawRequest {
                amount: Decimal::new(4, 0),
                withdrawal_method: "btc".into(),
            },
        )
        .unwrap();
        assert_eq!(wallet.wallet.balance, Decimal::new(6, 0));
        assert_eq!(wallet.transactions.len(), 1);
        let tx = &wallet.transactions[0];
        assert_eq!(tx.transaction_type, TransactionType::Withdraw);
        assert_eq!(tx.transaction_status, PaymentStatus::Pending);
        assert_eq!(tx.transaction_currency, "btc");
        assert!(tx.payment_id.is_none());
    }

    #[tokio::test]
    async fn test_withdraw_rejects_non_positive_amount() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "bob");
        let err = withdraw(
            &mut uow,
            account_id,
            WithdrawRequest {
                amount: Decimal::ZERO,
                withdrawal_method: "eth".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_finished_callback_credits_once() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "carol");
        seed_top_up(&mut uow, account_id, "5077125051", Decimal::new(2550, 2));

        let outcome = apply_callback(&mut uow, &payload("5077125051", PaymentStatus::Confirming)).unwrap();
        assert_eq!(outcome, CallbackOutcome::StatusUpdated(PaymentStatus::Confirming));
        assert_eq!(wallet_balance(&uow, account_id), Decimal::ZERO);

        let outcome = apply_callback(&mut uow, &payload("5077125051", PaymentStatus::Finished)).unwrap();
        assert!(matches!(outcome, CallbackOutcome::Credited { amount, .. } if amount == Decimal::new(2550, 2)));
        assert_eq!(wallet_balance(&uow, account_id), Decimal::new(2550, 2));

        let outcome = apply_callback(&mut uow, &payload("5077125051", PaymentStatus::Finished)).unwrap();
        assert_eq!(outcome, CallbackOutcome::AlreadyFinished);
        assert_eq!(wallet_balance(&uow, account_id), Decimal::new(2550, 2));

        let tx = check_payment_status(&uow, account_id, "5077125051").unwrap();
        assert_eq!(tx.transaction_status, PaymentStatus::Finished);
        assert!(tx.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_payment_id() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "dave");
        assert!(matches!(
            apply_callback(&mut uow, &payload("missing", PaymentStatus::Finished)),
            Err(AppError::TransactionNotFound(id)) if id == "missing"
        ));
        assert!(matches!(
            check_payment_status(&uow, account_id, "missing"),
            Err(AppError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_status_is_scoped_to_account() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let alice = seed_account(&mut uow, "alice");
        let bob = seed_account(&mut uow, "bob");
        seed_top_up(&mut uow, alice, "1", Decimal::ONE);

        assert!(check_payment_status(&uow, alice, "1").is_ok());
        assert!(matches!(
            check_payment_status(&uow, bob, "1"),
            Err(AppError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_addresses_is_all_or_nothing() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "erin");

        let wallet = update_addresses(
            &mut uow,
            account_id,
            UpdateAddressesRequest {
                bitcoin_address: Some("1BoatSLRHtKNngkdXEeobR76b53LETtpyT".into()),
                tron_address: Some("TNDFkiSmBQorNFacb3735q8MnT29sn8BLn".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            wallet.bitcoin_address.as_deref(),
            Some("1BoatSLRHtKNngkdXEeobR76b53LETtpyT")
        );
        assert!(wallet.ethereum_address.is_none());

        let err = update_addresses(
            &mut uow,
            account_id,
            UpdateAddressesRequest {
                bitcoin_address: Some(String::new()),
                ethereum_address: Some("0xnothex".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress { currency: "ethereum", .. }));
        let wallet = read_wallet(&uow, account_id).unwrap().wallet;
        assert!(wallet.bitcoin_address.is_some());

        let wallet = update_addresses(
            &mut uow,
            account_id,
            UpdateAddressesRequest {
                bitcoin_address: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(wallet.bitcoin_address.is_none());
        assert!(wallet.tron_address.is_some());
    }

    #[tokio::test]
    async fn test_add_balance_adds_the_amount() {
        let store = Store::in_memory();
        let mut uow = store.begin().await;
        let account_id = seed_account(&mut uow, "frank");
        for _ in 0..2 {
            add_balance(
                &mut uow,
                AddBalanceRequest {
                    account_id,
                    amount: Decimal::new(3, 0),
                },
            )
            .unwrap();
        }
        assert_eq!(wallet_balance(&uow, account_id), Decimal::new(6, 0));
        assert!(matches!(
            add_balance(
                &mut uow,
                AddBalanceRequest {
                    account_id,
                    amount: Decimal::new(-1, 0)
                }
            ),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_top_up_records_pending_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "payment_id": 4522625843u64,
                "payment_status": "waiting",
                "pay_address": "TNDFkiSmBQorNFacb3735q8MnT29sn8BLn",
                "price_amount": 15,
                "price_currency": "usd",
                "pay_amount": 15.07,
                "pay_currency": "usdttrc20",
                "created_at": "2024-05-01T10:00:00.000Z",
                "expiration_estimate_date": "2024-05-01T10:20:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let gateway =
            NowPaymentsClient::new(&server.uri(), "key", "https://reel.test/cb".into()).unwrap();

        let store = Store::in_memory();
        let account_id = {
            let mut uow = store.begin().await;
            let id = seed_account(&mut uow, "grace");
            uow.commit().await.unwrap();
            id
        };

        let payment = top_up(
            &store,
            &gateway,
            account_id,
            TopUpRequest {
                amount: Decimal::new(15, 0),
                transaction_currency: "USDTTRC20".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(payment.payment_id, "4522625843");
        assert_eq!(payment.order_id.as_ref().map(String::len), Some(64));

        let uow = store.begin().await;
        let wallet = read_wallet(&uow, account_id).unwrap();
        assert_eq!(wallet.wallet.balance, Decimal::ZERO);
        let tx = &wallet.transactions[0];
        assert_eq!(tx.transaction_type, TransactionType::TopUp);
        assert_eq!(tx.transaction_status, PaymentStatus::Pending);
        assert_eq!(tx.transaction_currency, "usdttrc20");
        assert_eq!(tx.payment_id.as_deref(), Some("4522625843"));
        assert_eq!(Some(&tx.order_id), payment.order_id.as_ref());
    }

    #[tokio::test]
    async fn test_record_top_up_for_missing_wallet_leaves_no_transaction() {
        let store = Store::in_memory();
        let result = record_top_up(&store, 42, Decimal::new(10, 0), "btc", "order", "987").await;
        assert!(matches!(result, Err(AppError::WalletNotFound(42))));

        let uow = store.begin().await;
        assert_eq!(uow.iter::<Transaction>().count(), 0);
    }

    #[tokio::test]
    async fn test_top_up_validates_before_calling_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let gateway =
            NowPaymentsClient::new(&server.uri(), "key", "https://reel.test/cb".into()).unwrap();

        let store = Store::in_memory();
        let account_id = {
            let mut uow = store.begin().await;
            let id = seed_account(&mut uow, "heidi");
            uow.commit().await.unwrap();
            id
        };

        let unsupported = top_up(
            &store,
            &gateway,
            account_id,
            TopUpRequest {
                amount: Decimal::ONE,
                transaction_currency: "doge".into(),
            },
        )
        .await;
        assert!(matches!(unsupported, Err(AppError::UnsupportedCurrency(_))));

        let missing = top_up(
            &store,
            &gateway,
            999,
            TopUpRequest {
                amount: Decimal::ONE,
                transaction_currency: "btc".into(),
            },
        )
        .await;
        assert!(matches!(missing, Err(AppError::AccountNotFound(999))));
    }

    #[tokio::test]
    async fn test_gateway_failure_records_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;
        let gateway =
            NowPaymentsClient::new(&server.uri(), "key", "https://reel.test/cb".into()).unwrap();

        let store = Store::in_memory();
        let account_id = {
            let mut uow = store.begin().await;
            let id = seed_account(&mut uow, "ivan");
            uow.commit().await.unwrap();
            id
        };

        let err = top_up(
            &store,
            &gateway,
            account_id,
            TopUpRequest {
                amount: Decimal::new(5, 0),
                transaction_currency: "eth".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::UpstreamGateway(m) if m == "unavailable"));

        let uow = store.begin().await;
        assert!(read_wallet(&uow, account_id).unwrap().transactions.is_empty());
    }
}

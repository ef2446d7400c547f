use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

static BITCOIN_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("bitcoin address pattern to be valid")
});

static ETHEREUM_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("ethereum address pattern to be valid"));

/// Tron addresses; USDT payouts go over TRC20 and share the format.
static TRON_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T[a-zA-Z0-9]{33}$").expect("tron address pattern to be valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Bitcoin,
    Usdt,
    Ethereum,
    Tron,
}

impl AddressKind {
    pub fn name(self) -> &'static str {
        match self {
            AddressKind::Bitcoin => "bitcoin",
            AddressKind::Usdt => "usdt",
            AddressKind::Ethereum => "ethereum",
            AddressKind::Tron => "tron",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            AddressKind::Bitcoin => &BITCOIN_ADDRESS,
            AddressKind::Ethereum => &ETHEREUM_ADDRESS,
            AddressKind::Usdt | AddressKind::Tron => &TRON_ADDRESS,
        }
    }
}

/// Trims the address and checks it against the format of its currency.
pub fn validate_address(kind: AddressKind, address: &str) -> AppResult<String> {
    let address = address.trim();
    if !kind.pattern().is_match(address) {
        return Err(AppError::InvalidAddress {
            currency: kind.name(),
            address: address.to_string(),
        });
    }
    Ok(address.to_string())
}

//! Transaction domain model
//!
//! A transaction is created when the backend accepts a money-movement
//! request and is identified by a server-issued id. Its status only moves
//! forward: PENDING/PROCESSING may become COMPLETED or FAILED, never back.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::result::{Error, Result};

/// USDT (TRC20) and TRX both use six decimal places on chain.
pub const ASSET_DECIMALS: u32 = 6;

/// Length of a base58check TRON address
const TRON_ADDRESS_LEN: usize = 34;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Server-issued opaque transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Trimmed id that can stand as one URL path segment
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        if id.is_empty() || id == "." || id == ".." || id.chars().any(char::is_control) {
            return Err(Error::validation(format!("Invalid transaction id: {:?}", raw)));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    /// Transfer to another user
    Payment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Payment => "payment",
        }
    }

    /// Endpoint that creates a transaction of this kind
    pub fn create_path(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "/transaction/deposit",
            TransactionKind::Withdraw => "/transaction/withdraw",
            TransactionKind::Payment => "/history/transfer",
        }
    }

    /// Endpoint reporting the status of a transaction of this kind.
    ///
    /// Transfers have no status route; their create response is final.
    /// The id is percent-encoded so it stays a single path segment.
    pub fn status_path(&self, id: &TransactionId) -> Option<String> {
        let segment = urlencoding::encode(id.as_str());
        match self {
            TransactionKind::Deposit => Some(format!("/transaction/deposit/{}", segment)),
            TransactionKind::Withdraw => Some(format!("/transaction/withdraw/{}", segment)),
            TransactionKind::Payment => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdraw" | "withdrawal" => Ok(TransactionKind::Withdraw),
            "payment" | "transfer" | "pay" => Ok(TransactionKind::Payment),
            other => Err(Error::validation(format!("Unknown transaction kind: {}", other))),
        }
    }
}

/// Status reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any value outside the known set, kept verbatim
    Unknown(String),
}

impl TransactionStatus {
    /// Parse a wire value. Matching is exact on the upper-case names.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => TransactionStatus::Pending,
            "PROCESSING" => TransactionStatus::Processing,
            "COMPLETED" => TransactionStatus::Completed,
            "FAILED" => TransactionStatus::Failed,
            other => TransactionStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Unknown(raw) => raw,
        }
    }

    /// Still moving; poll again
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Processing
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Supported assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    #[default]
    Usdt,
    Trx,
}

impl Asset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Asset::Usdt => "USDT",
            Asset::Trx => "TRX",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Asset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USDT" => Ok(Asset::Usdt),
            "TRX" => Ok(Asset::Trx),
            other => Err(Error::validation(format!("Unsupported asset: {}", other))),
        }
    }
}

/// Raw user input for a money movement, before validation
#[derive(Debug, Clone, Default)]
pub struct MovementForm {
    pub amount: String,
    pub asset: Asset,
    /// Destination wallet address (withdrawals)
    pub address: Option<String>,
    /// Recipient account (payments)
    pub recipient: Option<String>,
    pub memo: Option<String>,
    /// Balance known to the screen at submit time. Withdrawals may not exceed it.
    pub known_balance: Option<Decimal>,
}

impl MovementForm {
    pub fn new(amount: impl Into<String>, asset: Asset) -> Self {
        Self {
            amount: amount.into(),
            asset,
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.known_balance = Some(balance);
        self
    }

    /// Validate locally. No network access.
    pub fn validate(&self, kind: TransactionKind) -> Result<MovementRequest> {
        let amount = parse_amount(&self.amount)?;

        if kind == TransactionKind::Withdraw {
            if let Some(balance) = self.known_balance {
                if amount > balance {
                    return Err(Error::validation(format!(
                        "Insufficient balance: {} {} available",
                        balance.normalize(),
                        self.asset
                    )));
                }
            }
        }

        let to_address = match kind {
            TransactionKind::Withdraw => {
                let address = non_blank(self.address.as_deref())
                    .ok_or_else(|| Error::validation("Destination address is required"))?;
                if !is_tron_address(address) {
                    return Err(Error::validation(format!(
                        "Invalid TRON address: {}",
                        address
                    )));
                }
                Some(address.to_string())
            }
            _ => None,
        };

        let recipient = match kind {
            TransactionKind::Payment => Some(
                non_blank(self.recipient.as_deref())
                    .ok_or_else(|| Error::validation("Recipient is required"))?
                    .to_string(),
            ),
            _ => None,
        };

        Ok(MovementRequest {
            amount,
            currency: self.asset,
            to_address,
            recipient,
            memo: non_blank(self.memo.as_deref()).map(str::to_string),
        })
    }
}

/// Validated request body sent to a create endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Parse a user-entered amount: a positive number with at most six decimals
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Amount is required"));
    }

    let amount = Decimal::from_str(trimmed)
        .map_err(|_| Error::validation(format!("Amount must be a number: {}", trimmed)))?;

    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be greater than zero"));
    }

    if amount.normalize().scale() > ASSET_DECIMALS {
        return Err(Error::validation(format!(
            "Amount supports at most {} decimal places",
            ASSET_DECIMALS
        )));
    }

    Ok(amount)
}

/// Cheap shape check for a base58 TRON address (`T...`, 34 chars)
pub fn is_tron_address(address: &str) -> bool {
    address.len() == TRON_ADDRESS_LEN
        && address.starts_with('T')
        && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

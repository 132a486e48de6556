//! Account ledger - cash recharge and deduction
//!
//! Owns the balance invariant: `cash_balance >= BALANCE_FLOOR` (−200) after
//! every successful call, and rejected calls mutate nothing.
//!
//! # Known race
//!
//! The floor check and the write are not atomic across requests: two
//! concurrent deductions can both pass the check before either commits and
//! push the balance below the floor. The store only guarantees per-document
//! atomicity; this matches the original system and is documented rather
//! than fixed (a compare-and-set retry loop would close it).

use crate::receipts::ReceiptService;
use crate::storage::{CanteenStorage, StorageError};
use shared::error::{AppError, ErrorCode};
use shared::models::BALANCE_FLOOR;
use shared::util::now_millis;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Insufficient balance. Available: {balance}")]
    InsufficientBalance { balance: i64 },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount => AppError::new(ErrorCode::InvalidAmount),
            LedgerError::InsufficientBalance { balance } => {
                AppError::with_message(
                    ErrorCode::InsufficientBalance,
                    format!("Insufficient balance. Available: {}", balance),
                )
                .with_detail("balance", balance)
            }
            LedgerError::AccountNotFound(card) => {
                AppError::new(ErrorCode::AccountNotFound).with_detail("card", card)
            }
            LedgerError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// Cash balance operations
#[derive(Clone, Debug)]
pub struct LedgerService {
    storage: CanteenStorage,
    receipts: ReceiptService,
}

impl LedgerService {
    pub fn new(storage: CanteenStorage, receipts: ReceiptService) -> Self {
        Self { storage, receipts }
    }

    /// Add cash to an account. Returns the new balance.
    pub async fn recharge(&self, card: &str, amount: i64) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let txn = self.storage.begin_write()?;
        let id = self
            .storage
            .account_id_by_card_txn(&txn, card)?
            .ok_or_else(|| LedgerError::AccountNotFound(card.to_string()))?;
        let mut account = self
            .storage
            .get_account_txn(&txn, id)?
            .ok_or_else(|| LedgerError::AccountNotFound(card.to_string()))?;

        account.cash_balance += amount;
        account.updated_at = now_millis();
        self.storage.put_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            card = %card,
            amount,
            balance = account.cash_balance,
            "Recharge applied"
        );
        self.receipts
            .emit_recharge(card, &account.name, amount, account.cash_balance);

        Ok(account.cash_balance)
    }

    /// Deduct cash from an account. Returns the new balance.
    pub async fn deduct(&self, card: &str, amount: i64) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let txn = self.storage.begin_write()?;
        let id = self
            .storage
            .account_id_by_card_txn(&txn, card)?
            .ok_or_else(|| LedgerError::AccountNotFound(card.to_string()))?;
        let mut account = self
            .storage
            .get_account_txn(&txn, id)?
            .ok_or_else(|| LedgerError::AccountNotFound(card.to_string()))?;

        if account.cash_balance - amount < BALANCE_FLOOR {
            return Err(LedgerError::InsufficientBalance {
                balance: account.cash_balance,
            });
        }

        account.cash_balance -= amount;
        account.updated_at = now_millis();
        self.storage.put_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            card = %card,
            amount,
            balance = account.cash_balance,
            "Deduction applied"
        );
        self.receipts
            .emit_deduction(card, &account.name, amount, account.cash_balance);

        Ok(account.cash_balance)
    }
}

//! Account intake and lookup
//!
//! Thin service over the account documents: creation with validation and
//! uniqueness, and card-based resolution. Balance mutation lives in
//! [`crate::ledger`]; plan state in [`crate::plans`].

use crate::storage::{CanteenStorage, StorageError};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_email, validate_phone, validate_required_text,
};
use shared::error::{AppError, ErrorCode};
use shared::models::{Account, AccountCreate};
use shared::util::{now_millis, snowflake_id};
use thiserror::Error;

/// Account service errors
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Card is already assigned: {0}")]
    DuplicateCard(String),

    #[error("Email is already registered: {0}")]
    DuplicateEmail(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AccountResult<T> = Result<T, AccountError>;

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(card) => {
                AppError::new(ErrorCode::AccountNotFound).with_detail("card", card)
            }
            AccountError::DuplicateCard(card) => {
                AppError::new(ErrorCode::DuplicateCard).with_detail("card", card)
            }
            AccountError::DuplicateEmail(email) => {
                AppError::new(ErrorCode::DuplicateEmail).with_detail("email", email)
            }
            AccountError::Validation(msg) => AppError::validation(msg),
            AccountError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// Account intake and lookup
#[derive(Clone, Debug)]
pub struct AccountService {
    storage: CanteenStorage,
}

impl AccountService {
    pub fn new(storage: CanteenStorage) -> Self {
        Self { storage }
    }

    /// Create an account with a zero balance and no plan
    pub async fn create_account(&self, data: AccountCreate) -> AccountResult<Account> {
        validate_required_text(&data.student_id, "student_id", MAX_SHORT_TEXT_LEN)
            .map_err(|e| AccountError::Validation(e.message))?;
        validate_required_text(&data.name, "name", MAX_NAME_LEN)
            .map_err(|e| AccountError::Validation(e.message))?;
        validate_required_text(&data.card, "card", MAX_SHORT_TEXT_LEN)
            .map_err(|e| AccountError::Validation(e.message))?;
        validate_email(&data.email).map_err(|e| AccountError::Validation(e.message))?;
        validate_phone(&data.phone).map_err(|e| AccountError::Validation(e.message))?;

        let email = data.email.to_lowercase();
        if self.storage.account_id_by_card(&data.card)?.is_some() {
            return Err(AccountError::DuplicateCard(data.card));
        }
        if self.storage.account_id_by_email(&email)?.is_some() {
            return Err(AccountError::DuplicateEmail(email));
        }

        let now = now_millis();
        let account = Account {
            id: snowflake_id(),
            student_id: data.student_id,
            name: data.name,
            email,
            phone: data.phone,
            card: data.card,
            card_history: vec![],
            cash_balance: 0,
            current_plan: None,
            transaction_history: vec![],
            meal_plan_history: vec![],
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        // The index insert re-checks uniqueness; a race between the
        // pre-checks above and this write surfaces as Duplicate here.
        self.storage.insert_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(account_id = account.id, card = %account.card, "Account created");
        Ok(account)
    }

    /// Resolve an account by its active card
    pub async fn find_by_card(&self, card: &str) -> AccountResult<Account> {
        self.storage
            .get_account_by_card(card)?
            .ok_or_else(|| AccountError::NotFound(card.to_string()))
    }

    /// Get an account by ID
    pub async fn get(&self, id: i64) -> AccountResult<Account> {
        self.storage
            .get_account(id)?
            .ok_or_else(|| AccountError::NotFound(format!("id {}", id)))
    }
}

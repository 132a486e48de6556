//! RFID card reassignment
//!
//! Swaps the card on an account and retroactively relabels its past
//! transactions. The two writes are deliberately independent - there is no
//! multi-document transaction in this store's model - so a failure between
//! them is handled by an explicit compensating rollback of the card swap.
//!
//! The inconsistency window is real and documented: a crash between the
//! swap and the relabel (or between a relabel failure and the compensating
//! write) leaves the account on the new card while transactions still show
//! the old one, or vice versa. The card uniqueness index is the only guard
//! against concurrent claims of the new card; a race there surfaces as a
//! late `Duplicate` from the swap write.

use crate::storage::{CanteenStorage, StorageError};
use shared::error::{AppError, ErrorCode};
use shared::models::Account;
use shared::util::now_millis;
use thiserror::Error;

/// Reassignment errors
#[derive(Debug, Error)]
pub enum ReassignError {
    #[error("Old and new card cannot be the same")]
    SameCard,

    #[error("New card is already assigned: {0}")]
    CardAlreadyAssigned(String),

    #[error("Account not found for card: {0}")]
    AccountNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reassignment failed, card swap rolled back: {0}")]
    Failed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ReassignResult<T> = Result<T, ReassignError>;

impl From<ReassignError> for AppError {
    fn from(err: ReassignError) -> Self {
        match err {
            ReassignError::SameCard => {
                AppError::invalid_request("Old and new card cannot be the same")
            }
            ReassignError::CardAlreadyAssigned(card) => {
                AppError::new(ErrorCode::CardAlreadyAssigned).with_detail("card", card)
            }
            ReassignError::AccountNotFound(card) => {
                AppError::new(ErrorCode::AccountNotFound).with_detail("card", card)
            }
            ReassignError::Validation(msg) => AppError::validation(msg),
            ReassignError::Failed(msg) => {
                AppError::with_message(ErrorCode::ReassignmentFailed, msg)
            }
            // A lost race on the uniqueness index surfaces late, as a
            // duplicate-card conflict rather than the step-2 check
            ReassignError::Storage(StorageError::Duplicate(resource)) => {
                AppError::new(ErrorCode::DuplicateCard).with_detail("resource", resource)
            }
            ReassignError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// Result of a successful reassignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentOutcome {
    pub account_id: i64,
    pub moved_transactions: u64,
}

/// Card reassignment procedure
#[derive(Clone, Debug)]
pub struct ReassignmentService {
    storage: CanteenStorage,
}

impl ReassignmentService {
    pub fn new(storage: CanteenStorage) -> Self {
        Self { storage }
    }

    /// Move an account from `old_card` to `new_card` and relabel its past
    /// transactions.
    pub async fn reassign(&self, old_card: &str, new_card: &str) -> ReassignResult<ReassignmentOutcome> {
        let old_card = old_card.trim();
        let new_card = new_card.trim();

        if old_card.is_empty() || new_card.is_empty() {
            return Err(ReassignError::Validation(
                "old and new card are required".into(),
            ));
        }
        if old_card == new_card {
            return Err(ReassignError::SameCard);
        }

        // 1. New card must not already be taken
        if self.storage.account_id_by_card(new_card)?.is_some() {
            return Err(ReassignError::CardAlreadyAssigned(new_card.to_string()));
        }

        // 2. Resolve the account by the old card
        let mut account = self
            .storage
            .get_account_by_card(old_card)?
            .ok_or_else(|| ReassignError::AccountNotFound(old_card.to_string()))?;

        // 3. Swap the card on the account (+ keep history)
        account.remember_card(old_card);
        account.card = new_card.to_string();
        account.updated_at = now_millis();

        let txn = self.storage.begin_write()?;
        self.storage
            .rebind_card(&txn, old_card, new_card, account.id)?;
        self.storage.put_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        // 4. Transfer past transactions old → new (independent write)
        let moved = match self.storage.relabel_transaction_cards(old_card, new_card) {
            Ok(moved) => moved,
            Err(e) => {
                // 5. Best-effort rollback of the card swap; without a shared
                // transaction this is compensation, not atomicity
                if let Err(rollback_err) = self.rollback_card_swap(&account, old_card, new_card) {
                    tracing::error!(
                        account_id = account.id,
                        error = %rollback_err,
                        "Rollback after failed transaction transfer also failed"
                    );
                }
                tracing::error!(
                    account_id = account.id,
                    old_card = %old_card,
                    new_card = %new_card,
                    error = %e,
                    "Transaction transfer failed, card swap reverted"
                );
                return Err(ReassignError::Failed(e.to_string()));
            }
        };

        tracing::info!(
            account_id = account.id,
            old_card = %old_card,
            new_card = %new_card,
            moved,
            "Card reassigned"
        );
        Ok(ReassignmentOutcome {
            account_id: account.id,
            moved_transactions: moved,
        })
    }

    /// Compensating write: put the account back on `old_card` and drop it
    /// from the history entry added by the failed swap.
    fn rollback_card_swap(
        &self,
        account: &Account,
        old_card: &str,
        new_card: &str,
    ) -> Result<(), StorageError> {
        let mut reverted = account.clone();
        reverted.card = old_card.to_string();
        reverted.card_history.retain(|c| c != old_card);
        reverted.updated_at = now_millis();

        let txn = self.storage.begin_write()?;
        self.storage
            .rebind_card(&txn, new_card, old_card, reverted.id)?;
        self.storage.put_account(&txn, &reverted)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{AccountCreate, TransactionKind};

    async fn setup() -> (CanteenStorage, ReassignmentService) {
        let storage = CanteenStorage::open_in_memory().unwrap();
        let accounts = crate::accounts::AccountService::new(storage.clone());
        accounts
            .create_account(AccountCreate {
                student_id: "S-1".into(),
                name: "Asha".into(),
                email: "asha@example.com".into(),
                phone: "9876543210".into(),
                card: "RF-OLD".into(),
            })
            .await
            .unwrap();
        (storage.clone(), ReassignmentService::new(storage))
    }

    async fn record(storage: &CanteenStorage, card: &str) {
        let config = crate::config::Config::default();
        crate::transactions::TransactionService::new(storage.clone(), config)
            .record(card, TransactionKind::Recharge, Some(100), None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_card_rejected() {
        let (_, service) = setup().await;
        let result = service.reassign("RF-OLD", "RF-OLD").await;
        assert!(matches!(result, Err(ReassignError::SameCard)));
    }

    #[tokio::test]
    async fn test_blank_cards_rejected() {
        let (_, service) = setup().await;
        let result = service.reassign("  ", "RF-NEW").await;
        assert!(matches!(result, Err(ReassignError::Validation(_))));
    }

    #[tokio::test]
    async fn test_taken_card_rejected_without_side_effects() {
        let (storage, service) = setup().await;
        crate::accounts::AccountService::new(storage.clone())
            .create_account(AccountCreate {
                student_id: "S-2".into(),
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                phone: "9876543211".into(),
                card: "RF-TAKEN".into(),
            })
            .await
            .unwrap();

        let result = service.reassign("RF-OLD", "RF-TAKEN").await;
        assert!(matches!(result, Err(ReassignError::CardAlreadyAssigned(_))));

        // Zero side effects: account untouched
        let account = storage.get_account_by_card("RF-OLD").unwrap().unwrap();
        assert_eq!(account.card, "RF-OLD");
        assert!(account.card_history.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_old_card() {
        let (_, service) = setup().await;
        let result = service.reassign("RF-GHOST", "RF-NEW").await;
        assert!(matches!(result, Err(ReassignError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_successful_reassignment_moves_transactions() {
        let (storage, service) = setup().await;
        record(&storage, "RF-OLD").await;
        record(&storage, "RF-OLD").await;

        let outcome = service.reassign("RF-OLD", "RF-NEW").await.unwrap();
        assert_eq!(outcome.moved_transactions, 2);

        let account = storage.get_account_by_card("RF-NEW").unwrap().unwrap();
        assert_eq!(account.id, outcome.account_id);
        assert_eq!(account.card, "RF-NEW");
        assert_eq!(account.card_history, vec!["RF-OLD".to_string()]);
        assert!(storage.get_account_by_card("RF-OLD").unwrap().is_none());

        let all = storage.scan_transactions().unwrap();
        assert!(all.iter().all(|t| t.card == "RF-NEW"));
    }

    #[tokio::test]
    async fn test_repeat_reassignments_keep_history_unique() {
        let (storage, service) = setup().await;

        // RF-OLD → RF-NEW → RF-OLD → RF-NEW: each card lands in history once
        service.reassign("RF-OLD", "RF-NEW").await.unwrap();
        service.reassign("RF-NEW", "RF-OLD").await.unwrap();
        service.reassign("RF-OLD", "RF-NEW").await.unwrap();

        let account = storage.get_account_by_card("RF-NEW").unwrap().unwrap();
        assert_eq!(
            account.card_history,
            vec!["RF-OLD".to_string(), "RF-NEW".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rollback_restores_old_card() {
        let (storage, service) = setup().await;

        // Drive the account into the post-swap state by hand
        let mut account = storage.get_account_by_card("RF-OLD").unwrap().unwrap();
        account.remember_card("RF-OLD");
        account.card = "RF-NEW".into();
        let txn = storage.begin_write().unwrap();
        storage.rebind_card(&txn, "RF-OLD", "RF-NEW", account.id).unwrap();
        storage.put_account(&txn, &account).unwrap();
        txn.commit().unwrap();

        // Compensation undoes both the card and the history entry
        service
            .rollback_card_swap(&account, "RF-OLD", "RF-NEW")
            .unwrap();

        let restored = storage.get_account_by_card("RF-OLD").unwrap().unwrap();
        assert_eq!(restored.card, "RF-OLD");
        assert!(restored.card_history.is_empty());
        assert!(storage.get_account_by_card("RF-NEW").unwrap().is_none());
    }
}

//! redb-based document storage
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `accounts` | account id | `Account` | Student aggregates |
//! | `account_cards` | card | account id | Card uniqueness + lookup |
//! | `account_emails` | email | account id | Email uniqueness |
//! | `plan_templates` | template id | `PlanTemplate` | Plan catalog |
//! | `plans` | plan id | `Plan` | Assigned plan instances |
//! | `transactions` | transaction id | `Transaction` | Append-only event log |
//! | `staff` | staff id | `StaffMember` | Staff aggregates |
//! | `staff_cards` | card | staff id | Staff card uniqueness + lookup |
//! | `staff_phones` | phone | staff id | Staff phone uniqueness |
//!
//! Documents are JSON-serialized; per-document writes are atomic within a
//! `WriteTransaction`. The index tables are the only cross-request
//! synchronization primitive in the system: a duplicate insert surfaces as
//! [`StorageError::Duplicate`] no matter how the race interleaved.
//!
//! Transaction ids are snowflakes, so key order in `transactions` is
//! creation order.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{Account, Plan, PlanTemplate, StaffMember, Transaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ACCOUNTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("accounts");
const ACCOUNT_CARDS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("account_cards");
const ACCOUNT_EMAILS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("account_emails");
const PLAN_TEMPLATES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("plan_templates");
const PLANS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("plans");
const TRANSACTIONS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("transactions");
const STAFF_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("staff");
const STAFF_CARDS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("staff_cards");
const STAFF_PHONES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("staff_phones");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Document storage backed by redb
///
/// redb commits are durable as soon as `commit()` returns (copy-on-write
/// with atomic pointer swap), which matters on canteen counter hardware
/// that loses power without warning.
#[derive(Clone)]
pub struct CanteenStorage {
    db: Arc<Database>,
}

impl CanteenStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNT_CARDS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNT_EMAILS_TABLE)?;
            let _ = write_txn.open_table(PLAN_TEMPLATES_TABLE)?;
            let _ = write_txn.open_table(PLANS_TABLE)?;
            let _ = write_txn.open_table(TRANSACTIONS_TABLE)?;
            let _ = write_txn.open_table(STAFF_TABLE)?;
            let _ = write_txn.open_table(STAFF_CARDS_TABLE)?;
            let _ = write_txn.open_table(STAFF_PHONES_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Accounts ==========

    /// Insert a new account, enforcing card and email uniqueness
    pub fn insert_account(&self, txn: &WriteTransaction, account: &Account) -> StorageResult<()> {
        {
            let mut cards = txn.open_table(ACCOUNT_CARDS_TABLE)?;
            if cards.get(account.card.as_str())?.is_some() {
                return Err(StorageError::Duplicate(format!("card {}", account.card)));
            }
            cards.insert(account.card.as_str(), account.id)?;
        }
        {
            let mut emails = txn.open_table(ACCOUNT_EMAILS_TABLE)?;
            if emails.get(account.email.as_str())?.is_some() {
                return Err(StorageError::Duplicate(format!("email {}", account.email)));
            }
            emails.insert(account.email.as_str(), account.id)?;
        }
        self.put_account(txn, account)
    }

    /// Overwrite an account document (no index maintenance)
    pub fn put_account(&self, txn: &WriteTransaction, account: &Account) -> StorageResult<()> {
        let mut table = txn.open_table(ACCOUNTS_TABLE)?;
        let value = serde_json::to_vec(account)?;
        table.insert(account.id, value.as_slice())?;
        Ok(())
    }

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> StorageResult<Option<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an account by ID (within transaction)
    pub fn get_account_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<Account>> {
        let table = txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve an account ID from its active card
    pub fn account_id_by_card(&self, card: &str) -> StorageResult<Option<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNT_CARDS_TABLE)?;
        Ok(table.get(card)?.map(|guard| guard.value()))
    }

    /// Get an account by its active card
    pub fn get_account_by_card(&self, card: &str) -> StorageResult<Option<Account>> {
        match self.account_id_by_card(card)? {
            Some(id) => self.get_account(id),
            None => Ok(None),
        }
    }

    /// Resolve an account ID from its registered email
    pub fn account_id_by_email(&self, email: &str) -> StorageResult<Option<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNT_EMAILS_TABLE)?;
        Ok(table.get(email)?.map(|guard| guard.value()))
    }

    /// Resolve an account ID from its active card (within transaction)
    pub fn account_id_by_card_txn(
        &self,
        txn: &WriteTransaction,
        card: &str,
    ) -> StorageResult<Option<i64>> {
        let table = txn.open_table(ACCOUNT_CARDS_TABLE)?;
        Ok(table.get(card)?.map(|guard| guard.value()))
    }

    /// Move the card index entry from `old_card` to `new_card`
    ///
    /// The uniqueness check on `new_card` runs inside the same transaction,
    /// so a concurrent claim of the card surfaces as `Duplicate` here even
    /// if the caller's earlier availability check raced.
    pub fn rebind_card(
        &self,
        txn: &WriteTransaction,
        old_card: &str,
        new_card: &str,
        account_id: i64,
    ) -> StorageResult<()> {
        let mut cards = txn.open_table(ACCOUNT_CARDS_TABLE)?;
        if cards.get(new_card)?.is_some() {
            return Err(StorageError::Duplicate(format!("card {}", new_card)));
        }
        cards.remove(old_card)?;
        cards.insert(new_card, account_id)?;
        Ok(())
    }

    /// Get all accounts
    pub fn list_accounts(&self) -> StorageResult<Vec<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        let mut accounts = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            accounts.push(serde_json::from_slice(value.value())?);
        }
        Ok(accounts)
    }

    // ========== Plan Templates ==========

    /// Insert or replace a template
    pub fn put_template(&self, txn: &WriteTransaction, template: &PlanTemplate) -> StorageResult<()> {
        let mut table = txn.open_table(PLAN_TEMPLATES_TABLE)?;
        let value = serde_json::to_vec(template)?;
        table.insert(template.template_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get a template by catalog ID
    pub fn get_template(&self, template_id: &str) -> StorageResult<Option<PlanTemplate>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAN_TEMPLATES_TABLE)?;
        match table.get(template_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get all templates, in catalog ID order
    pub fn list_templates(&self) -> StorageResult<Vec<PlanTemplate>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAN_TEMPLATES_TABLE)?;
        let mut templates = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            templates.push(serde_json::from_slice(value.value())?);
        }
        Ok(templates)
    }

    // ========== Plans ==========

    /// Insert or replace a plan document
    pub fn put_plan(&self, txn: &WriteTransaction, plan: &Plan) -> StorageResult<()> {
        let mut table = txn.open_table(PLANS_TABLE)?;
        let value = serde_json::to_vec(plan)?;
        table.insert(plan.id, value.as_slice())?;
        Ok(())
    }

    /// Get a plan by ID
    pub fn get_plan(&self, id: i64) -> StorageResult<Option<Plan>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLANS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a plan by ID (within transaction)
    pub fn get_plan_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Plan>> {
        let table = txn.open_table(PLANS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a plan document. Returns whether it existed.
    pub fn remove_plan(&self, txn: &WriteTransaction, id: i64) -> StorageResult<bool> {
        let mut table = txn.open_table(PLANS_TABLE)?;
        Ok(table.remove(id)?.is_some())
    }

    /// Get all plans
    pub fn list_plans(&self) -> StorageResult<Vec<Plan>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLANS_TABLE)?;
        let mut plans = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            plans.push(serde_json::from_slice(value.value())?);
        }
        Ok(plans)
    }

    // ========== Transactions ==========

    /// Insert or replace a transaction record
    pub fn put_transaction(
        &self,
        txn: &WriteTransaction,
        transaction: &Transaction,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(TRANSACTIONS_TABLE)?;
        let value = serde_json::to_vec(transaction)?;
        table.insert(transaction.id, value.as_slice())?;
        Ok(())
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> StorageResult<Option<Transaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get all transactions in creation order (snowflake keys sort by time)
    pub fn scan_transactions(&self) -> StorageResult<Vec<Transaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS_TABLE)?;
        let mut transactions = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            transactions.push(serde_json::from_slice(value.value())?);
        }
        Ok(transactions)
    }

    /// Relabel the card field of every transaction recorded under `old_card`
    ///
    /// Runs in its own transaction, deliberately separate from the account
    /// card swap: the two writes model independent documents with no shared
    /// atomicity (see `reassignment`).
    pub fn relabel_transaction_cards(
        &self,
        old_card: &str,
        new_card: &str,
    ) -> StorageResult<u64> {
        let txn = self.begin_write()?;
        let moved = {
            let mut table = txn.open_table(TRANSACTIONS_TABLE)?;

            // Collect first: the iterator borrows the table immutably
            let mut to_update: Vec<Transaction> = Vec::new();
            for result in table.iter()? {
                let (_key, value) = result?;
                let record: Transaction = serde_json::from_slice(value.value())?;
                if record.card == old_card {
                    to_update.push(record);
                }
            }

            for record in &mut to_update {
                record.card = new_card.to_string();
                let value = serde_json::to_vec(record)?;
                table.insert(record.id, value.as_slice())?;
            }
            to_update.len() as u64
        };
        txn.commit()?;
        Ok(moved)
    }

    // ========== Staff ==========

    /// Insert a new staff member, enforcing card and phone uniqueness
    pub fn insert_staff(&self, txn: &WriteTransaction, staff: &StaffMember) -> StorageResult<()> {
        {
            let mut cards = txn.open_table(STAFF_CARDS_TABLE)?;
            if cards.get(staff.card.as_str())?.is_some() {
                return Err(StorageError::Duplicate(format!("staff card {}", staff.card)));
            }
            cards.insert(staff.card.as_str(), staff.id)?;
        }
        {
            let mut phones = txn.open_table(STAFF_PHONES_TABLE)?;
            if phones.get(staff.phone.as_str())?.is_some() {
                return Err(StorageError::Duplicate(format!(
                    "staff phone {}",
                    staff.phone
                )));
            }
            phones.insert(staff.phone.as_str(), staff.id)?;
        }
        self.put_staff(txn, staff)
    }

    /// Overwrite a staff document (no index maintenance)
    pub fn put_staff(&self, txn: &WriteTransaction, staff: &StaffMember) -> StorageResult<()> {
        let mut table = txn.open_table(STAFF_TABLE)?;
        let value = serde_json::to_vec(staff)?;
        table.insert(staff.id, value.as_slice())?;
        Ok(())
    }

    /// Get a staff member by ID
    pub fn get_staff(&self, id: i64) -> StorageResult<Option<StaffMember>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STAFF_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve a staff ID from a phone number
    pub fn staff_id_by_phone(&self, phone: &str) -> StorageResult<Option<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STAFF_PHONES_TABLE)?;
        Ok(table.get(phone)?.map(|guard| guard.value()))
    }

    /// Get a staff member by card (within transaction)
    pub fn get_staff_by_card_txn(
        &self,
        txn: &WriteTransaction,
        card: &str,
    ) -> StorageResult<Option<StaffMember>> {
        let id = {
            let cards = txn.open_table(STAFF_CARDS_TABLE)?;
            cards.get(card)?.map(|guard| guard.value())
        };
        match id {
            Some(id) => {
                let table = txn.open_table(STAFF_TABLE)?;
                match table.get(id)? {
                    Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Get a staff member by card
    pub fn get_staff_by_card(&self, card: &str) -> StorageResult<Option<StaffMember>> {
        let read_txn = self.db.begin_read()?;
        let id = {
            let cards = read_txn.open_table(STAFF_CARDS_TABLE)?;
            cards.get(card)?.map(|guard| guard.value())
        };
        match id {
            Some(id) => {
                let table = read_txn.open_table(STAFF_TABLE)?;
                match table.get(id)? {
                    Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for CanteenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanteenStorage").finish()
    }
}

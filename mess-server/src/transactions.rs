//! Transaction recorder
//!
//! Append-only log of every balance/plan mutation. Recording is post-hoc:
//! the effecting operation has already committed by the time `record` runs,
//! so a crash between the two leaves the mutation applied but unlogged.
//! There is no two-phase commit; that gap is accepted and documented.
//!
//! Every list query treats an empty result set as `NotFound` - callers that
//! want "empty is valid" semantics must pre-check existence.

use crate::config::Config;
use crate::storage::{CanteenStorage, StorageError};
use crate::utils::time::minutes_of_day;
use crate::utils::validation::{MAX_NOTE_LEN, validate_optional_text};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Account, Transaction, TransactionKind, TransactionStatus};
use shared::util::{now_millis, snowflake_id};
use thiserror::Error;

/// Recorder errors
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("No transactions found: {0}")]
    NoneFound(String),

    #[error("Transaction not found: {0}")]
    NotFound(i64),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid status value. Use \"success\" or \"failure\"")]
    InvalidStatus,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::NoneFound(criteria) => {
                AppError::with_message(
                    ErrorCode::TransactionNotFound,
                    format!("No transactions found for {}", criteria),
                )
            }
            TransactionError::NotFound(id) => {
                AppError::new(ErrorCode::TransactionNotFound).with_detail("transaction_id", id)
            }
            TransactionError::AccountNotFound(card) => {
                AppError::new(ErrorCode::AccountNotFound).with_detail("card", card)
            }
            TransactionError::InvalidStatus => AppError::new(ErrorCode::InvalidStatus),
            TransactionError::Validation(msg) => AppError::validation(msg),
            TransactionError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// A named report slot (local-time minute range)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSlot {
    pub name: String,
    pub start_min: u32,
    pub end_min: u32,
}

impl ReportSlot {
    pub fn new(name: impl Into<String>, start_min: u32, end_min: u32) -> Self {
        Self {
            name: name.into(),
            start_min,
            end_min,
        }
    }
}

/// Fallback label for minutes no slot covers
pub const OUTSIDE_SLOTS: &str = "Outside Slots";

/// Default audit slots. The 14:30-16:00 and post-21:00 gaps are
/// intentional: no meal slot covers mid-afternoon or late night, and
/// transactions there report as "Outside Slots".
pub fn default_report_slots() -> Vec<ReportSlot> {
    vec![
        ReportSlot::new("Breakfast", 450, 570), // 07:30-09:30
        ReportSlot::new("Brunch", 570, 690),    // 09:30-11:30
        ReportSlot::new("Lunch", 690, 870),     // 11:30-14:30
        ReportSlot::new("Snacks", 960, 1140),   // 16:00-19:00
        ReportSlot::new("Dinner", 1140, 1260),  // 19:00-21:00
    ]
}

/// Classify minutes-of-day into a slot name
pub fn classify_slot<'a>(minutes: u32, slots: &'a [ReportSlot]) -> &'a str {
    slots
        .iter()
        .find(|s| s.start_min <= minutes && minutes < s.end_min)
        .map(|s| s.name.as_str())
        .unwrap_or(OUTSIDE_SLOTS)
}

/// Filter for the paginated list query
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    /// Inclusive millis range
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// Query for the student logs report
#[derive(Debug, Clone)]
pub struct StudentLogsQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub kind: Option<TransactionKind>,
    pub limit: usize,
    /// Also match transactions against historical cards
    pub include_history: bool,
}

impl Default for StudentLogsQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            kind: None,
            limit: 500,
            include_history: false,
        }
    }
}

/// One row of the student logs report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLogRow {
    pub transaction_id: i64,
    pub at: i64,
    pub kind: TransactionKind,
    pub card: String,
    pub account_id: i64,
    pub name: String,
    /// Time-of-day slot label, or "Outside Slots"
    pub slot: String,
    pub status: TransactionStatus,
    pub reason: Option<String>,
}

/// Append-only transaction recording and queries
#[derive(Clone, Debug)]
pub struct TransactionService {
    storage: CanteenStorage,
    config: Config,
}

impl TransactionService {
    pub fn new(storage: CanteenStorage, config: Config) -> Self {
        Self { storage, config }
    }

    /// Record a completed operation and link it to the account's history
    ///
    /// The record is born with status `success`: recording only happens
    /// after the effecting mutation committed.
    pub async fn record(
        &self,
        card: &str,
        kind: TransactionKind,
        amount: Option<i64>,
        description: Option<String>,
        template_id: Option<String>,
    ) -> TransactionResult<Transaction> {
        if kind.requires_amount() && amount.is_none() {
            return Err(TransactionError::Validation(format!(
                "amount is required for {} transactions",
                kind.as_str()
            )));
        }
        validate_optional_text(&description, "description", MAX_NOTE_LEN)
            .map_err(|e| TransactionError::Validation(e.message))?;

        let record = Transaction {
            id: snowflake_id(),
            card: card.to_string(),
            kind,
            amount,
            description,
            template_id,
            status: TransactionStatus::Success,
            created_at: now_millis(),
        };

        let txn = self.storage.begin_write()?;
        let account_id = self
            .storage
            .account_id_by_card_txn(&txn, card)?
            .ok_or_else(|| TransactionError::AccountNotFound(card.to_string()))?;
        let mut account = self
            .storage
            .get_account_txn(&txn, account_id)?
            .ok_or_else(|| TransactionError::AccountNotFound(card.to_string()))?;

        self.storage.put_transaction(&txn, &record)?;
        account.transaction_history.push(record.id);
        account.updated_at = record.created_at;
        self.storage.put_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            transaction_id = record.id,
            card = %card,
            kind = kind.as_str(),
            "Transaction recorded"
        );
        Ok(record)
    }

    /// Correct a record's status to a terminal value
    pub async fn update_status(
        &self,
        id: i64,
        status: TransactionStatus,
    ) -> TransactionResult<Transaction> {
        if !status.is_terminal() {
            return Err(TransactionError::InvalidStatus);
        }
        let mut record = self
            .storage
            .get_transaction(id)?
            .ok_or(TransactionError::NotFound(id))?;
        record.status = status;

        let txn = self.storage.begin_write()?;
        self.storage.put_transaction(&txn, &record)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(record)
    }

    /// Get a record by ID
    pub async fn get(&self, id: i64) -> TransactionResult<Transaction> {
        self.storage
            .get_transaction(id)?
            .ok_or(TransactionError::NotFound(id))
    }

    // ========== Queries (NotFound on empty) ==========

    /// All transactions recorded under a card, newest first
    pub async fn list_by_card(&self, card: &str) -> TransactionResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .storage
            .scan_transactions()?
            .into_iter()
            .filter(|t| t.card == card)
            .collect();
        if rows.is_empty() {
            return Err(TransactionError::NoneFound(format!("card {}", card)));
        }
        rows.reverse();
        Ok(rows)
    }

    /// All transactions of one kind, newest first
    pub async fn list_by_kind(&self, kind: TransactionKind) -> TransactionResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .storage
            .scan_transactions()?
            .into_iter()
            .filter(|t| t.kind == kind)
            .collect();
        if rows.is_empty() {
            return Err(TransactionError::NoneFound(format!("type {}", kind.as_str())));
        }
        rows.reverse();
        Ok(rows)
    }

    /// All transactions in an inclusive date range, newest first
    pub async fn list_by_date_range(
        &self,
        from: i64,
        to: i64,
    ) -> TransactionResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .storage
            .scan_transactions()?
            .into_iter()
            .filter(|t| from <= t.created_at && t.created_at <= to)
            .collect();
        if rows.is_empty() {
            return Err(TransactionError::NoneFound("the specified date range".into()));
        }
        rows.reverse();
        Ok(rows)
    }

    /// Filtered, paginated listing, newest first
    pub async fn list(
        &self,
        filter: TransactionFilter,
        limit: usize,
        skip: usize,
    ) -> TransactionResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .storage
            .scan_transactions()?
            .into_iter()
            .filter(|t| {
                filter.kind.is_none_or(|k| t.kind == k)
                    && filter.from.is_none_or(|from| t.created_at >= from)
                    && filter.to.is_none_or(|to| t.created_at <= to)
            })
            .collect();
        rows.reverse();
        let rows: Vec<Transaction> = rows.into_iter().skip(skip).take(limit).collect();
        if rows.is_empty() {
            return Err(TransactionError::NoneFound("the given criteria".into()));
        }
        Ok(rows)
    }

    // ========== Reporting ==========

    /// Audit report: join transactions to accounts by card, label each row
    /// with its time-of-day slot, return the newest rows first.
    ///
    /// Rows that match no account are dropped. Unlike the list queries an
    /// empty report is a valid result.
    pub async fn student_logs(
        &self,
        query: StudentLogsQuery,
    ) -> TransactionResult<Vec<StudentLogRow>> {
        let accounts = self.storage.list_accounts()?;

        let mut rows: Vec<StudentLogRow> = self
            .storage
            .scan_transactions()?
            .into_iter()
            .filter(|t| {
                query.kind.is_none_or(|k| t.kind == k)
                    && query.from.is_none_or(|from| t.created_at >= from)
                    && query.to.is_none_or(|to| t.created_at <= to)
            })
            .filter_map(|t| {
                let account = self.match_account(&accounts, &t.card, query.include_history)?;
                let minutes = minutes_of_day(t.created_at, self.config.timezone);
                Some(StudentLogRow {
                    transaction_id: t.id,
                    at: t.created_at,
                    kind: t.kind,
                    card: t.card,
                    account_id: account.id,
                    name: account.name.clone(),
                    slot: classify_slot(minutes, &self.config.report_slots).to_string(),
                    status: t.status,
                    reason: t.description,
                })
            })
            .collect();

        rows.sort_by_key(|r| std::cmp::Reverse(r.at));
        rows.truncate(query.limit.max(1));
        Ok(rows)
    }

    fn match_account<'a>(
        &self,
        accounts: &'a [Account],
        card: &str,
        include_history: bool,
    ) -> Option<&'a Account> {
        accounts.iter().find(|a| {
            a.card == card
                || (include_history && a.card_history.iter().any(|c| c == card))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Kolkata;
    use shared::models::AccountCreate;

    fn ist(h: u32, m: u32) -> i64 {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_local_timezone(Kolkata)
            .unwrap()
            .timestamp_millis()
    }

    async fn setup() -> (CanteenStorage, TransactionService) {
        let storage = CanteenStorage::open_in_memory().unwrap();
        let config = Config::default().with_timezone(Kolkata);
        crate::accounts::AccountService::new(storage.clone())
            .create_account(AccountCreate {
                student_id: "S-1".into(),
                name: "Asha".into(),
                email: "asha@example.com".into(),
                phone: "9876543210".into(),
                card: "RF-1".into(),
            })
            .await
            .unwrap();
        (storage.clone(), TransactionService::new(storage, config))
    }

    #[tokio::test]
    async fn test_record_links_to_account_history() {
        let (storage, service) = setup().await;

        let record = service
            .record("RF-1", TransactionKind::Recharge, Some(500), None, None)
            .await
            .unwrap();
        assert_eq!(record.status, TransactionStatus::Success);

        let account = storage.get_account_by_card("RF-1").unwrap().unwrap();
        assert_eq!(account.transaction_history, vec![record.id]);
    }

    #[tokio::test]
    async fn test_record_requires_amount_except_meal_deduction() {
        let (_, service) = setup().await;

        let result = service
            .record("RF-1", TransactionKind::Recharge, None, None, None)
            .await;
        assert!(matches!(result, Err(TransactionError::Validation(_))));

        // Meal deductions carry no amount
        let record = service
            .record("RF-1", TransactionKind::MealDeduction, None, None, None)
            .await
            .unwrap();
        assert!(record.amount.is_none());
    }

    #[tokio::test]
    async fn test_record_unknown_card() {
        let (_, service) = setup().await;
        let result = service
            .record("RF-NONE", TransactionKind::Recharge, Some(10), None, None)
            .await;
        assert!(matches!(result, Err(TransactionError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status() {
        let (_, service) = setup().await;
        let record = service
            .record("RF-1", TransactionKind::Recharge, Some(100), None, None)
            .await
            .unwrap();

        let updated = service
            .update_status(record.id, TransactionStatus::Failure)
            .await
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Failure);

        // Only terminal statuses are accepted
        let result = service
            .update_status(record.id, TransactionStatus::Processing)
            .await;
        assert!(matches!(result, Err(TransactionError::InvalidStatus)));

        let result = service.update_status(999, TransactionStatus::Success).await;
        assert!(matches!(result, Err(TransactionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_queries_fail_on_empty_results() {
        let (_, service) = setup().await;

        assert!(matches!(
            service.list_by_card("RF-1").await,
            Err(TransactionError::NoneFound(_))
        ));
        assert!(matches!(
            service.list_by_kind(TransactionKind::Deduction).await,
            Err(TransactionError::NoneFound(_))
        ));
        assert!(matches!(
            service.list_by_date_range(0, 1).await,
            Err(TransactionError::NoneFound(_))
        ));
        assert!(matches!(
            service.list(TransactionFilter::default(), 100, 0).await,
            Err(TransactionError::NoneFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_queries_filter_and_order() {
        let (_, service) = setup().await;

        let first = service
            .record("RF-1", TransactionKind::Recharge, Some(100), None, None)
            .await
            .unwrap();
        // Snowflake keys order by millisecond; keep the records apart
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = service
            .record("RF-1", TransactionKind::Deduction, Some(40), None, None)
            .await
            .unwrap();

        let by_card = service.list_by_card("RF-1").await.unwrap();
        assert_eq!(by_card.len(), 2);
        // Newest first
        assert_eq!(by_card[0].id, second.id);
        assert_eq!(by_card[1].id, first.id);

        let recharges = service.list_by_kind(TransactionKind::Recharge).await.unwrap();
        assert_eq!(recharges.len(), 1);
        assert_eq!(recharges[0].id, first.id);

        let paged = service
            .list(
                TransactionFilter::default(),
                1,
                1,
            )
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, first.id);
    }

    #[tokio::test]
    async fn test_classify_slot_table() {
        let slots = default_report_slots();

        assert_eq!(classify_slot(460, &slots), "Breakfast"); // 07:40
        assert_eq!(classify_slot(600, &slots), "Brunch"); // 10:00
        assert_eq!(classify_slot(700, &slots), "Lunch"); // 11:40
        assert_eq!(classify_slot(1000, &slots), "Snacks"); // 16:40
        assert_eq!(classify_slot(1200, &slots), "Dinner"); // 20:00

        // Intentional gaps: mid-afternoon and late night have no slot
        assert_eq!(classify_slot(900, &slots), OUTSIDE_SLOTS); // 15:00
        assert_eq!(classify_slot(1300, &slots), OUTSIDE_SLOTS); // 21:40
        assert_eq!(classify_slot(300, &slots), OUTSIDE_SLOTS); // 05:00
    }

    #[tokio::test]
    async fn test_student_logs_joins_and_labels() {
        let (_, service) = setup().await;

        service
            .record("RF-1", TransactionKind::Recharge, Some(100), Some("counter".into()), None)
            .await
            .unwrap();

        let rows = service.student_logs(StudentLogsQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Asha");
        assert_eq!(rows[0].card, "RF-1");
        assert_eq!(rows[0].reason.as_deref(), Some("counter"));
        assert!(!rows[0].slot.is_empty());
    }

    #[tokio::test]
    async fn test_student_logs_include_history_matches_old_card() {
        let (storage, service) = setup().await;

        service
            .record("RF-1", TransactionKind::Recharge, Some(100), None, None)
            .await
            .unwrap();

        // Simulate a reassignment that left the old card on the record
        let txn = storage.begin_write().unwrap();
        let mut account = storage.get_account_by_card("RF-1").unwrap().unwrap();
        storage.rebind_card(&txn, "RF-1", "RF-2", account.id).unwrap();
        account.remember_card("RF-1");
        account.card = "RF-2".into();
        storage.put_account(&txn, &account).unwrap();
        txn.commit().unwrap();

        // Without history the old-card record no longer matches
        let rows = service.student_logs(StudentLogsQuery::default()).await.unwrap();
        assert!(rows.is_empty());

        let rows = service
            .student_logs(StudentLogsQuery {
                include_history: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].card, "RF-1");
    }

    #[tokio::test]
    async fn test_student_logs_respects_limit_and_order() {
        let (_, service) = setup().await;

        for i in 0..3 {
            service
                .record("RF-1", TransactionKind::Recharge, Some(100 + i), None, None)
                .await
                .unwrap();
        }

        let rows = service
            .student_logs(StudentLogsQuery {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].at >= rows[1].at);
    }

    #[tokio::test]
    async fn test_ist_helper_is_consistent() {
        // Guard against timezone drift in the fixtures themselves
        let config = Config::default().with_timezone(Kolkata);
        assert_eq!(minutes_of_day(ist(7, 40), config.timezone), 460);
    }
}

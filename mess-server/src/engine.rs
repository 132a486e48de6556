//! Transaction engine - request dispatch and post-hoc recording
//!
//! One entry point for the four account-affecting request kinds: resolve
//! the account by card, route to the ledger or the plan engine, then record
//! the outcome in the transaction log and link it to the account.
//!
//! Recording is strictly after the effecting mutation: if the record write
//! fails the mutation stays applied but unlogged. That gap is part of the
//! design (there is no two-phase commit here) and is surfaced to the caller
//! as the recording error.

use crate::accounts::AccountService;
use crate::config::Config;
use crate::ledger::LedgerService;
use crate::plans::{MealOutcome, PlanService};
use crate::receipts::ReceiptService;
use crate::storage::CanteenStorage;
use crate::transactions::TransactionService;
use shared::error::{AppError, AppResult};
use shared::models::{Plan, TransactionKind};
use shared::util::now_millis;

/// One incoming POS request
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub card: String,
    pub kind: TransactionKind,
    /// Required for recharge and deduction
    pub amount: Option<i64>,
    pub description: Option<String>,
    /// Required for plan-update
    pub template_id: Option<String>,
    /// Optional plan start override (plan-update only)
    pub start_date: Option<i64>,
}

/// Typed outcome per request kind
#[derive(Debug, Clone)]
pub enum TransactionOutcome {
    Recharge { balance: i64 },
    Deduction { balance: i64 },
    PlanAssigned { plan: Plan, price: i64 },
    Meal(MealOutcome),
}

/// Request dispatcher over the core services
#[derive(Clone, Debug)]
pub struct TransactionEngine {
    accounts: AccountService,
    ledger: LedgerService,
    plans: PlanService,
    recorder: TransactionService,
}

impl TransactionEngine {
    pub fn new(storage: CanteenStorage, receipts: ReceiptService, config: Config) -> Self {
        Self {
            accounts: AccountService::new(storage.clone()),
            ledger: LedgerService::new(storage.clone(), receipts.clone()),
            plans: PlanService::new(storage.clone(), receipts, config.clone()),
            recorder: TransactionService::new(storage, config),
        }
    }

    /// Process a request against the wall clock
    pub async fn process(&self, request: TransactionRequest) -> AppResult<TransactionOutcome> {
        self.process_at(request, now_millis()).await
    }

    /// Process a request at an explicit instant (tests, replays)
    pub async fn process_at(
        &self,
        request: TransactionRequest,
        now: i64,
    ) -> AppResult<TransactionOutcome> {
        if request.card.trim().is_empty() {
            return Err(AppError::validation("card is required"));
        }

        // Resolve up front so every kind fails the same way on a bad card
        self.accounts.find_by_card(&request.card).await?;

        let (outcome, amount) = match request.kind {
            TransactionKind::Recharge => {
                let amount = request
                    .amount
                    .ok_or_else(|| AppError::validation("amount is required for recharge"))?;
                let balance = self.ledger.recharge(&request.card, amount).await?;
                (TransactionOutcome::Recharge { balance }, Some(amount))
            }
            TransactionKind::Deduction => {
                let amount = request
                    .amount
                    .ok_or_else(|| AppError::validation("amount is required for deduction"))?;
                let balance = self.ledger.deduct(&request.card, amount).await?;
                (TransactionOutcome::Deduction { balance }, Some(amount))
            }
            TransactionKind::PlanUpdate => {
                let template_id = request.template_id.as_deref().ok_or_else(|| {
                    AppError::validation("template_id is required for plan-update")
                })?;
                let assigned = self
                    .plans
                    .assign_plan(&request.card, template_id, request.start_date, now)
                    .await?;
                let price = assigned.price;
                (
                    TransactionOutcome::PlanAssigned {
                        plan: assigned.plan,
                        price,
                    },
                    Some(price),
                )
            }
            TransactionKind::MealDeduction => {
                let outcome = self.plans.deduct_meal(&request.card, now).await?;
                (TransactionOutcome::Meal(outcome), None)
            }
        };

        // Post-hoc: the mutation above is already committed
        self.recorder
            .record(
                &request.card,
                request.kind,
                amount,
                request.description,
                request.template_id,
            )
            .await?;

        Ok(outcome)
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn plans(&self) -> &PlanService {
        &self.plans
    }

    pub fn recorder(&self) -> &TransactionService {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Kolkata;
    use shared::error::ErrorCode;
    use shared::models::{AccountCreate, MealStructure, PlanTemplate, TransactionStatus};

    fn ist(h: u32, m: u32) -> i64 {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_local_timezone(Kolkata)
            .unwrap()
            .timestamp_millis()
    }

    fn request(kind: TransactionKind) -> TransactionRequest {
        TransactionRequest {
            card: "RF-1".into(),
            kind,
            amount: None,
            description: None,
            template_id: None,
            start_date: None,
        }
    }

    async fn setup() -> (CanteenStorage, TransactionEngine) {
        let storage = CanteenStorage::open_in_memory().unwrap();
        let config = Config::default().with_timezone(Kolkata);
        let engine = TransactionEngine::new(storage.clone(), ReceiptService::disabled(), config);

        engine
            .accounts()
            .create_account(AccountCreate {
                student_id: "S-1".into(),
                name: "Asha".into(),
                email: "asha@example.com".into(),
                phone: "9876543210".into(),
                card: "RF-1".into(),
            })
            .await
            .unwrap();
        engine
            .plans()
            .upsert_template(PlanTemplate {
                template_id: "T-FLEX".into(),
                name: "Flexible".into(),
                duration_days: 30,
                price: 2400,
                meal_structure: MealStructure::Flexible { total_meals: 3 },
            })
            .await
            .unwrap();
        (storage, engine)
    }

    #[tokio::test]
    async fn test_recharge_flow_records_transaction() {
        let (storage, engine) = setup().await;

        let mut req = request(TransactionKind::Recharge);
        req.amount = Some(500);
        let outcome = engine.process_at(req, ist(10, 0)).await.unwrap();
        assert!(matches!(outcome, TransactionOutcome::Recharge { balance: 500 }));

        let records = engine.recorder().list_by_card("RF-1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::Recharge);
        assert_eq!(records[0].amount, Some(500));
        assert_eq!(records[0].status, TransactionStatus::Success);

        let account = storage.get_account_by_card("RF-1").unwrap().unwrap();
        assert_eq!(account.transaction_history, vec![records[0].id]);
    }

    #[tokio::test]
    async fn test_deduction_flow() {
        let (_, engine) = setup().await;

        let mut req = request(TransactionKind::Recharge);
        req.amount = Some(100);
        engine.process_at(req, ist(10, 0)).await.unwrap();

        let mut req = request(TransactionKind::Deduction);
        req.amount = Some(40);
        let outcome = engine.process_at(req, ist(10, 5)).await.unwrap();
        assert!(matches!(outcome, TransactionOutcome::Deduction { balance: 60 }));
    }

    #[tokio::test]
    async fn test_plan_update_records_template_price() {
        let (_, engine) = setup().await;

        let mut req = request(TransactionKind::PlanUpdate);
        req.template_id = Some("T-FLEX".into());
        let outcome = engine.process_at(req, ist(9, 0)).await.unwrap();
        let TransactionOutcome::PlanAssigned { plan, price } = outcome else {
            panic!("expected PlanAssigned");
        };
        assert_eq!(price, 2400);
        assert_eq!(plan.template_id, "T-FLEX");

        let records = engine.recorder().list_by_card("RF-1").await.unwrap();
        assert_eq!(records[0].kind, TransactionKind::PlanUpdate);
        // The template price becomes the recorded amount
        assert_eq!(records[0].amount, Some(2400));
        assert_eq!(records[0].template_id.as_deref(), Some("T-FLEX"));
    }

    #[tokio::test]
    async fn test_meal_deduction_records_without_amount() {
        let (_, engine) = setup().await;

        let mut req = request(TransactionKind::PlanUpdate);
        req.template_id = Some("T-FLEX".into());
        engine.process_at(req, ist(9, 0)).await.unwrap();

        // Keep the two records in distinct snowflake milliseconds
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let outcome = engine
            .process_at(request(TransactionKind::MealDeduction), ist(12, 0))
            .await
            .unwrap();
        let TransactionOutcome::Meal(MealOutcome::Deducted { window, remaining }) = outcome else {
            panic!("expected a deducted meal");
        };
        assert_eq!(window, "lunch");
        assert_eq!(remaining, 2);

        let records = engine.recorder().list_by_card("RF-1").await.unwrap();
        assert_eq!(records[0].kind, TransactionKind::MealDeduction);
        assert!(records[0].amount.is_none());
    }

    #[tokio::test]
    async fn test_unknown_card_fails_before_dispatch() {
        let (_, engine) = setup().await;

        let mut req = request(TransactionKind::Recharge);
        req.card = "RF-GHOST".into();
        req.amount = Some(100);
        let err = engine.process_at(req, ist(10, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccountNotFound);
    }

    #[tokio::test]
    async fn test_failed_dispatch_records_nothing() {
        let (_, engine) = setup().await;

        let mut req = request(TransactionKind::PlanUpdate);
        req.template_id = Some("T-MISSING".into());
        let err = engine.process_at(req, ist(9, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateNotFound);

        // No transaction is recorded for a rejected request
        assert!(engine.recorder().list_by_card("RF-1").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_amount_rejected() {
        let (_, engine) = setup().await;
        let err = engine
            .process_at(request(TransactionKind::Recharge), ist(10, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_business_errors_surface_with_codes() {
        let (_, engine) = setup().await;

        // Deduction below the floor
        let mut req = request(TransactionKind::Deduction);
        req.amount = Some(300);
        let err = engine.process_at(req, ist(10, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);

        // Meal swipe without a plan
        let err = engine
            .process_at(request(TransactionKind::MealDeduction), ist(12, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoActivePlan);
    }
}

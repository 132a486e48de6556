//! Meal plan engine
//!
//! Plan assignment (snapshotting the template's meal structure), meal
//! window resolution, fixed/flexible meal deduction, and the lazy
//! `active → expired` transition.
//!
//! Expiry is always recomputed from `(now, end_date)`; the stored status
//! only caches the answer and flips at most once, opportunistically before
//! a deduction or in the bulk sweep.

pub mod windows;

use crate::config::Config;
use crate::receipts::{MealReceipt, ReceiptService};
use crate::storage::{CanteenStorage, StorageError};
use crate::utils::time::{local_date, minutes_of_day};
use crate::utils::validation::{MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_required_text};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Account, MealStructure, MealUsage, Plan, PlanStatus, PlanTemplate,
};
use shared::util::{now_millis, snowflake_id};
use thiserror::Error;
use windows::resolve_window;

/// Plan engine errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan template not found: {0}")]
    TemplateNotFound(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(i64),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No active plan found")]
    NoActivePlan,

    #[error("Plan has expired")]
    PlanExpired,

    #[error("No meal available at this time")]
    NoMealWindow,

    #[error("{0} not included in the plan")]
    WindowNotInPlan(String),

    #[error("No {0} meals remaining")]
    QuotaExhausted(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type PlanResult<T> = Result<T, PlanError>;

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::TemplateNotFound(id) => {
                AppError::new(ErrorCode::TemplateNotFound).with_detail("template_id", id)
            }
            PlanError::PlanNotFound(id) => {
                AppError::new(ErrorCode::PlanNotFound).with_detail("plan_id", id)
            }
            PlanError::AccountNotFound(card) => {
                AppError::new(ErrorCode::AccountNotFound).with_detail("card", card)
            }
            PlanError::NoActivePlan => AppError::new(ErrorCode::NoActivePlan),
            PlanError::PlanExpired => AppError::new(ErrorCode::PlanExpired),
            PlanError::NoMealWindow => AppError::new(ErrorCode::NoMealWindow),
            PlanError::WindowNotInPlan(window) => {
                AppError::new(ErrorCode::WindowNotInPlan).with_detail("window", window)
            }
            PlanError::QuotaExhausted(scope) => {
                AppError::new(ErrorCode::QuotaExhausted).with_detail("scope", scope)
            }
            PlanError::Validation(msg) => AppError::validation(msg),
            PlanError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// Result of a plan assignment: the issued plan and the template price the
/// caller records as the transaction amount.
#[derive(Debug, Clone)]
pub struct AssignedPlan {
    pub plan: Plan,
    pub price: i64,
}

/// Outcome of a meal deduction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MealOutcome {
    /// A meal was taken; `remaining` is the window quota (fixed) or total
    /// budget (flexible) after the decrement.
    Deducted { window: String, remaining: u32 },
    /// Same window already used today (fixed plans); nothing changed.
    AlreadyUsed { window: String },
}

impl MealOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Deducted { window, .. } => format!("{} meal deducted successfully", window),
            Self::AlreadyUsed { window } => format!("{} meal already used today", window),
        }
    }
}

/// Plan status summary for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatusSummary {
    pub state: PlanState,
    pub days_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanState {
    NoPlan,
    Active,
    Expired,
}

/// Meal plan operations
#[derive(Clone, Debug)]
pub struct PlanService {
    storage: CanteenStorage,
    receipts: ReceiptService,
    config: Config,
}

impl PlanService {
    pub fn new(storage: CanteenStorage, receipts: ReceiptService, config: Config) -> Self {
        Self {
            storage,
            receipts,
            config,
        }
    }

    // ========== Template catalog ==========

    /// Insert or replace a catalog template
    pub async fn upsert_template(&self, template: PlanTemplate) -> PlanResult<PlanTemplate> {
        validate_required_text(&template.template_id, "template_id", MAX_SHORT_TEXT_LEN)
            .map_err(|e| PlanError::Validation(e.message))?;
        validate_required_text(&template.name, "name", MAX_NAME_LEN)
            .map_err(|e| PlanError::Validation(e.message))?;
        if template.duration_days == 0 {
            return Err(PlanError::Validation("duration_days must be positive".into()));
        }
        if template.price < 0 {
            return Err(PlanError::Validation("price must not be negative".into()));
        }
        if let MealStructure::Fixed { windows } = &template.meal_structure
            && windows.is_empty()
        {
            return Err(PlanError::Validation(
                "fixed plans need at least one meal window".into(),
            ));
        }

        let txn = self.storage.begin_write()?;
        self.storage.put_template(&txn, &template)?;
        txn.commit().map_err(StorageError::from)?;
        tracing::info!(template_id = %template.template_id, "Template stored");
        Ok(template)
    }

    /// Get a catalog template
    pub async fn get_template(&self, template_id: &str) -> PlanResult<PlanTemplate> {
        self.storage
            .get_template(template_id)?
            .ok_or_else(|| PlanError::TemplateNotFound(template_id.to_string()))
    }

    /// List the catalog
    pub async fn list_templates(&self) -> PlanResult<Vec<PlanTemplate>> {
        Ok(self.storage.list_templates()?)
    }

    // ========== Assignment ==========

    /// Issue a new plan from a template and make it the account's current
    /// plan. The previous current plan (if any) moves to history.
    ///
    /// Returns the plan plus the template price for the caller to record as
    /// the transaction amount.
    pub async fn assign_plan(
        &self,
        card: &str,
        template_id: &str,
        start_date: Option<i64>,
        now: i64,
    ) -> PlanResult<AssignedPlan> {
        let template = self
            .storage
            .get_template(template_id)?
            .ok_or_else(|| PlanError::TemplateNotFound(template_id.to_string()))?;

        let txn = self.storage.begin_write()?;
        let mut account = self.account_by_card_txn(&txn, card)?;

        let start = start_date.unwrap_or(now);
        let plan = Plan {
            id: snowflake_id(),
            account_id: account.id,
            name: template.name.clone(),
            duration_days: template.duration_days,
            start_date: start,
            end_date: start + i64::from(template.duration_days) * 24 * 60 * 60 * 1000,
            status: PlanStatus::Active,
            meal_structure: template.meal_structure.clone(),
            usage: vec![],
            template_id: template.template_id.clone(),
            created_at: now,
            updated_at: now,
        };

        if let Some(current) = account.current_plan.take() {
            account.meal_plan_history.push(current);
        }
        account.current_plan = Some(plan.id);
        account.updated_at = now;

        self.storage.put_plan(&txn, &plan)?;
        self.storage.put_account(&txn, &account)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            card = %card,
            plan_id = plan.id,
            template_id = %template.template_id,
            "Plan assigned"
        );
        Ok(AssignedPlan {
            plan,
            price: template.price,
        })
    }

    // ========== Meal deduction ==========

    /// Take one meal against the account's current plan.
    ///
    /// Fixed plans double-spend-guard per (window, day); flexible plans
    /// spend from a single budget and use the window only as a label.
    pub async fn deduct_meal(&self, card: &str, now: i64) -> PlanResult<MealOutcome> {
        let txn = self.storage.begin_write()?;
        let account = self.account_by_card_txn(&txn, card)?;
        let plan_id = account.current_plan.ok_or(PlanError::NoActivePlan)?;
        let mut plan = self
            .storage
            .get_plan_txn(&txn, plan_id)?
            .ok_or(PlanError::PlanNotFound(plan_id))?;

        // Lazy expiry: flip the cached status once, then reject
        if plan.is_expired(now) {
            if plan.status == PlanStatus::Active {
                plan.status = PlanStatus::Expired;
                plan.updated_at = now;
                self.storage.put_plan(&txn, &plan)?;
                txn.commit().map_err(StorageError::from)?;
                tracing::info!(plan_id = plan.id, "Plan expired");
            }
            return Err(PlanError::PlanExpired);
        }

        let window = resolve_window(
            minutes_of_day(now, self.config.timezone),
            &self.config.meal_windows,
        )
        .map(str::to_string);

        let outcome = match &mut plan.meal_structure {
            MealStructure::Fixed { windows } => {
                let window = window.ok_or(PlanError::NoMealWindow)?;

                let today = local_date(now, self.config.timezone);
                let used_today = plan.usage.iter().any(|u| {
                    u.window == window && local_date(u.at, self.config.timezone) == today
                });
                if used_today {
                    // Idempotent: same window, same day, no mutation
                    return Ok(MealOutcome::AlreadyUsed { window });
                }

                let remaining = windows
                    .get_mut(&window)
                    .ok_or_else(|| PlanError::WindowNotInPlan(window.clone()))?;
                if *remaining == 0 {
                    return Err(PlanError::QuotaExhausted(window));
                }
                *remaining -= 1;
                let left = *remaining;

                plan.usage.push(MealUsage {
                    window: window.clone(),
                    at: now,
                    description: Some(format!("Deducted 1 {} meal", window)),
                });
                MealOutcome::Deducted {
                    window,
                    remaining: left,
                }
            }
            MealStructure::Flexible { total_meals } => {
                // Budget check comes first: an empty plan is reported as
                // exhausted even outside every window
                if *total_meals == 0 {
                    return Err(PlanError::QuotaExhausted("plan".into()));
                }
                let window = window.ok_or(PlanError::NoMealWindow)?;

                *total_meals -= 1;
                let left = *total_meals;

                plan.usage.push(MealUsage {
                    window: window.clone(),
                    at: now,
                    description: Some(format!("Deducted 1 {} meal", window)),
                });
                MealOutcome::Deducted {
                    window,
                    remaining: left,
                }
            }
        };

        plan.updated_at = now;
        self.storage.put_plan(&txn, &plan)?;
        txn.commit().map_err(StorageError::from)?;

        if let MealOutcome::Deducted { window, remaining } = &outcome {
            tracing::info!(
                card = %card,
                plan_id = plan.id,
                window = %window,
                remaining,
                "Meal deducted"
            );
            self.receipts.emit_meal(MealReceipt {
                card: card.to_string(),
                plan_name: plan.name.clone(),
                window: window.clone(),
                meals_left: *remaining,
                expiry: plan.end_date,
                variant: None,
            });
        }
        Ok(outcome)
    }

    // ========== Status / lifecycle ==========

    /// Current plan summary for an account
    pub async fn plan_status(&self, card: &str, now: i64) -> PlanResult<PlanStatusSummary> {
        let account = self
            .storage
            .get_account_by_card(card)?
            .ok_or_else(|| PlanError::AccountNotFound(card.to_string()))?;

        let Some(plan_id) = account.current_plan else {
            return Ok(PlanStatusSummary {
                state: PlanState::NoPlan,
                days_remaining: 0,
            });
        };
        let plan = self
            .storage
            .get_plan(plan_id)?
            .ok_or(PlanError::PlanNotFound(plan_id))?;

        let state = if plan.is_expired(now) {
            PlanState::Expired
        } else {
            PlanState::Active
        };
        let days_remaining = if plan.end_date > now {
            ((plan.end_date - now) as f64 / (24.0 * 60.0 * 60.0 * 1000.0)).ceil() as u32
        } else {
            0
        };
        Ok(PlanStatusSummary {
            state,
            days_remaining,
        })
    }

    /// Flip every overdue plan to expired. Idempotent; used by reporting.
    pub async fn expire_overdue_plans(&self, now: i64) -> PlanResult<usize> {
        let overdue: Vec<Plan> = self
            .storage
            .list_plans()?
            .into_iter()
            .filter(|p| p.status == PlanStatus::Active && p.is_expired(now))
            .collect();

        if overdue.is_empty() {
            return Ok(0);
        }

        let txn = self.storage.begin_write()?;
        let count = overdue.len();
        for mut plan in overdue {
            plan.status = PlanStatus::Expired;
            plan.updated_at = now;
            self.storage.put_plan(&txn, &plan)?;
        }
        txn.commit().map_err(StorageError::from)?;
        tracing::info!(count, "Expired overdue plans");
        Ok(count)
    }

    /// Explicitly delete a plan document. Expiry never deletes; this does.
    pub async fn delete_plan(&self, plan_id: i64) -> PlanResult<()> {
        let txn = self.storage.begin_write()?;
        let existed = self.storage.remove_plan(&txn, plan_id)?;
        if !existed {
            return Err(PlanError::PlanNotFound(plan_id));
        }
        txn.commit().map_err(StorageError::from)?;
        tracing::info!(plan_id, "Plan deleted");
        Ok(())
    }

    fn account_by_card_txn(
        &self,
        txn: &redb::WriteTransaction,
        card: &str,
    ) -> PlanResult<Account> {
        let id = self
            .storage
            .account_id_by_card_txn(txn, card)?
            .ok_or_else(|| PlanError::AccountNotFound(card.to_string()))?;
        self.storage
            .get_account_txn(txn, id)?
            .ok_or_else(|| PlanError::AccountNotFound(card.to_string()))
    }
}

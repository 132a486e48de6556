//! Transaction Model (append-only record of account-affecting events)

use serde::{Deserialize, Serialize};

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "recharge")]
    Recharge,
    #[serde(rename = "deduction")]
    Deduction,
    #[serde(rename = "plan-update")]
    PlanUpdate,
    #[serde(rename = "meal-deduction")]
    MealDeduction,
}

impl TransactionKind {
    /// Every kind except meal-deduction carries a monetary amount
    pub fn requires_amount(&self) -> bool {
        !matches!(self, Self::MealDeduction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recharge => "recharge",
            Self::Deduction => "deduction",
            Self::PlanUpdate => "plan-update",
            Self::MealDeduction => "meal-deduction",
        }
    }
}

/// Transaction status: `processing` → terminal `success` | `failure`.
///
/// The recorder writes records post-hoc with `success`; `processing` exists
/// for rows created before the status-correction operation resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Processing,
    Success,
    Failure,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Immutable record of one account-affecting event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Card identifier at the time of recording (relabelled on card
    /// reassignment)
    pub card: String,
    pub kind: TransactionKind,
    /// Amount in whole rupees; absent for meal deductions
    pub amount: Option<i64>,
    pub description: Option<String>,
    /// Plan template reference for plan-update transactions
    pub template_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&TransactionKind::PlanUpdate).unwrap(),
            "\"plan-update\""
        );
        let kind: TransactionKind = serde_json::from_str("\"meal-deduction\"").unwrap();
        assert_eq!(kind, TransactionKind::MealDeduction);
    }

    #[test]
    fn test_requires_amount() {
        assert!(TransactionKind::Recharge.requires_amount());
        assert!(TransactionKind::Deduction.requires_amount());
        assert!(TransactionKind::PlanUpdate.requires_amount());
        assert!(!TransactionKind::MealDeduction.requires_amount());
    }

    #[test]
    fn test_status_terminal() {
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failure.is_terminal());
    }
}

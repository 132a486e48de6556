//! Account Model (student balance / plan / card aggregate)

use serde::{Deserialize, Serialize};

/// Lowest value the cash balance may reach. Deductions that would go below
/// this floor are rejected before any mutation.
pub const BALANCE_FLOOR: i64 = -200;

/// Student account entity
///
/// The card field is the *current* RFID card; reassigned cards accumulate in
/// `card_history` so past transactions stay attributable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// School roll / admission number
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Active RFID card (unique across accounts)
    pub card: String,
    /// Previously assigned cards, oldest first, no duplicates
    #[serde(default)]
    pub card_history: Vec<String>,
    /// Cash balance in whole rupees, floored at [`BALANCE_FLOOR`]
    #[serde(default)]
    pub cash_balance: i64,
    /// Currently active plan, if any
    pub current_plan: Option<i64>,
    /// Transaction IDs, in recording order
    #[serde(default)]
    pub transaction_history: Vec<i64>,
    /// Superseded plan IDs, in assignment order
    #[serde(default)]
    pub meal_plan_history: Vec<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create account payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCreate {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub card: String,
}

impl Account {
    /// Record a past card exactly once (set semantics on a Vec)
    pub fn remember_card(&mut self, card: &str) {
        if !self.card_history.iter().any(|c| c == card) {
            self.card_history.push(card.to_string());
        }
    }
}

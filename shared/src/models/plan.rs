//! Plan Models (templates, assigned plans, meal structure)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plan kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Fixed,
    Flexible,
}

/// Meal entitlement structure
///
/// Fixed plans carry a per-window quota ("N breakfasts + N lunches") and
/// must not double-spend a window within a day. Flexible plans carry one
/// fungible meal budget; the window only labels the usage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MealStructure {
    Fixed {
        /// Window name → remaining meal count
        windows: BTreeMap<String, u32>,
    },
    Flexible {
        total_meals: u32,
    },
}

impl MealStructure {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Fixed { .. } => PlanKind::Fixed,
            Self::Flexible { .. } => PlanKind::Flexible,
        }
    }

    /// Meals remaining across all windows (fixed) or overall (flexible)
    pub fn meals_remaining(&self) -> u32 {
        match self {
            Self::Fixed { windows } => windows.values().sum(),
            Self::Flexible { total_meals } => *total_meals,
        }
    }
}

/// Immutable catalog entry a plan instance is derived from
///
/// Templates may be edited later without affecting already-issued plans:
/// assignment snapshots the meal structure into the [`Plan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTemplate {
    /// Catalog identifier (unique)
    pub template_id: String,
    pub name: String,
    pub duration_days: u32,
    /// Price in whole rupees, recorded as the plan-update transaction amount
    pub price: i64,
    pub meal_structure: MealStructure,
}

/// Plan lifecycle status. Monotonic: `Active` → `Expired`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Expired,
}

/// One meal taken against a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealUsage {
    /// Window name the meal was taken in
    pub window: String,
    pub at: i64,
    pub description: Option<String>,
}

/// Assigned plan instance, owned by exactly one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub duration_days: u32,
    pub start_date: i64,
    /// `start_date + duration_days` in millis; the single source of truth
    /// for expiry
    pub end_date: i64,
    pub status: PlanStatus,
    /// Snapshot of the template's structure at assignment time
    pub meal_structure: MealStructure,
    /// Append-only usage log
    #[serde(default)]
    pub usage: Vec<MealUsage>,
    pub template_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Plan {
    pub fn kind(&self) -> PlanKind {
        self.meal_structure.kind()
    }

    /// Expiry is a pure function of the clock and the end date; the stored
    /// status only caches the answer.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.end_date
    }
}

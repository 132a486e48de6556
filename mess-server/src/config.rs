//! Server configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | WORK_DIR | /var/lib/mess | Work directory (database, logs) |
//! | TIMEZONE | Asia/Kolkata | Business timezone |
//! | MIN_PUNCH_GAP_MS | 3600000 | Minimum gap between attendance punches |
//! | PRINTER_ADDR | (unset) | Receipt printer address, e.g. 192.168.1.50:9100 |
//! | PAPER_WIDTH | 48 | Receipt paper width in characters |
//! | ENVIRONMENT | development | development \| staging \| production |
//!
//! # Example
//!
//! ```ignore
//! WORK_DIR=/data/mess PRINTER_ADDR=192.168.1.50:9100 TIMEZONE=Asia/Kolkata
//! ```

use crate::plans::windows::{MealWindow, default_meal_windows};
use crate::transactions::{ReportSlot, default_report_slots};
use chrono_tz::Tz;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Work directory for the database and logs
    pub work_dir: String,
    /// Business timezone; all day boundaries and meal windows use it
    pub timezone: Tz,
    /// Minimum gap between two attendance punches (guards double scans)
    pub min_punch_gap_ms: i64,
    /// Receipt printer address; receipts are skipped when unset
    pub printer_addr: Option<String>,
    /// Receipt paper width in characters
    pub paper_width: usize,
    /// Running environment: development | staging | production
    pub environment: String,
    /// Meal windows for plan deduction, non-overlapping
    pub meal_windows: Vec<MealWindow>,
    /// Report slot table for transaction audit views
    pub report_slots: Vec<ReportSlot>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/mess".into()),
            timezone: std::env::var("TIMEZONE")
                .ok()
                .and_then(|tz| tz.parse().ok())
                .unwrap_or(chrono_tz::Asia::Kolkata),
            min_punch_gap_ms: std::env::var("MIN_PUNCH_GAP_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60 * 60 * 1000),
            printer_addr: std::env::var("PRINTER_ADDR").ok(),
            paper_width: std::env::var("PAPER_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(48),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            meal_windows: default_meal_windows(),
            report_slots: default_report_slots(),
        }
    }

    /// Override the work directory (common in tests)
    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Override the business timezone
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    /// Override the minimum punch gap
    pub fn with_min_punch_gap_ms(mut self, gap_ms: i64) -> Self {
        self.min_punch_gap_ms = gap_ms;
        self
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.min_punch_gap_ms, 3_600_000);
        assert_eq!(config.paper_width, 48);
        assert!(!config.meal_windows.is_empty());
        assert!(!config.report_slots.is_empty());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_timezone(chrono_tz::UTC)
            .with_min_punch_gap_ms(1000);
        assert_eq!(config.timezone, chrono_tz::UTC);
        assert_eq!(config.min_punch_gap_ms, 1000);
    }
}

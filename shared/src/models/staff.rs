//! Staff Model (employment record, pay adjustments, attendance log)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kitchen / service department
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Management,
    Indian,
    Chaat,
    Continental,
    Chinese,
    Tandoor,
    South,
    Service,
    Housekeeping,
    Other,
}

/// Staff position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Management,
    Chef,
    Helper,
    Waiter,
    Captain,
    #[serde(rename = "house keeper")]
    HouseKeeper,
    Cashier,
    Inventory,
    Other,
}

/// Derived status for one attendance day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    #[serde(rename = "Half Day")]
    HalfDay,
    Leave,
}

/// A dated salary advance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advance {
    pub date: i64,
    pub amount: i64,
}

/// A dated fine with its reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fine {
    pub date: i64,
    pub reason: String,
    pub amount: i64,
}

/// One calendar day of punches
///
/// Punches are append-only: a timestamp, once set, is never unset. The
/// punch order is entry → break-out → break-return → duty-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceDay {
    /// Calendar day in the business timezone
    pub date: NaiveDate,
    pub entry_time: i64,
    pub break_out_time: Option<i64>,
    pub break_return_time: Option<i64>,
    pub duty_off_time: Option<i64>,
    pub status: AttendanceStatus,
}

impl AttendanceDay {
    /// Most recent punch of the day (duty-off wins over break-return, etc.)
    pub fn last_punch(&self) -> i64 {
        self.duty_off_time
            .or(self.break_return_time)
            .or(self.break_out_time)
            .unwrap_or(self.entry_time)
    }

    /// All four punches recorded
    pub fn is_complete(&self) -> bool {
        self.break_out_time.is_some()
            && self.break_return_time.is_some()
            && self.duty_off_time.is_some()
    }
}

/// Staff member entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: i64,
    pub name: String,
    /// Contact phone (unique)
    pub phone: String,
    /// RFID card (unique)
    pub card: String,
    pub department: Department,
    pub position: Position,
    /// Monthly salary in whole rupees
    pub salary: i64,
    /// Security deposit held
    #[serde(default)]
    pub security_deposit: i64,
    pub joining_date: i64,
    /// Who referred this hire; "Self" when unreferred
    pub referenced_by: String,
    #[serde(default)]
    pub advances: Vec<Advance>,
    #[serde(default)]
    pub fines: Vec<Fine>,
    /// One entry per calendar day, newest last
    #[serde(default)]
    pub attendance: Vec<AttendanceDay>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create staff payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCreate {
    pub name: String,
    pub phone: String,
    pub card: String,
    pub department: Department,
    pub position: Position,
    pub salary: i64,
    #[serde(default)]
    pub security_deposit: i64,
    pub joining_date: i64,
    pub referenced_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(entry: i64) -> AttendanceDay {
        AttendanceDay {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            entry_time: entry,
            break_out_time: None,
            break_return_time: None,
            duty_off_time: None,
            status: AttendanceStatus::Present,
        }
    }

    #[test]
    fn test_last_punch_prefers_latest_stage() {
        let mut record = day(100);
        assert_eq!(record.last_punch(), 100);

        record.break_out_time = Some(200);
        assert_eq!(record.last_punch(), 200);

        record.break_return_time = Some(300);
        record.duty_off_time = Some(400);
        assert_eq!(record.last_punch(), 400);
    }

    #[test]
    fn test_is_complete_requires_all_punches() {
        let mut record = day(100);
        assert!(!record.is_complete());
        record.break_out_time = Some(200);
        record.break_return_time = Some(300);
        assert!(!record.is_complete());
        record.duty_off_time = Some(400);
        assert!(record.is_complete());
    }

    #[test]
    fn test_attendance_status_serde() {
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::HalfDay).unwrap(),
            "\"Half Day\""
        );
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Present).unwrap(),
            "\"Present\""
        );
    }

    #[test]
    fn test_position_serde() {
        assert_eq!(
            serde_json::to_string(&Position::HouseKeeper).unwrap(),
            "\"house keeper\""
        );
        assert_eq!(serde_json::to_string(&Position::Chef).unwrap(), "\"chef\"");
    }
}

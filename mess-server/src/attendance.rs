//! Staff attendance punch clock
//!
//! One record per staff member per calendar day, advancing through
//! entry → break-out → break-return → duty-off. Punches are append-only;
//! a minimum gap between consecutive punches guards against accidental
//! double scans at the reader.

use crate::config::Config;
use crate::storage::{CanteenStorage, StorageError};
use crate::utils::time::local_date;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_phone, validate_required_text,
};
use shared::error::{AppError, ErrorCode};
use shared::models::{AttendanceDay, AttendanceStatus, StaffCreate, StaffMember};
use shared::util::{now_millis, snowflake_id};
use thiserror::Error;

/// Attendance errors
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Staff member not found: {0}")]
    StaffNotFound(String),

    #[error("Staff card is already registered: {0}")]
    DuplicateCard(String),

    #[error("Staff phone is already registered: {0}")]
    DuplicatePhone(String),

    #[error("Punch too soon, wait {wait_ms} ms")]
    TooSoon { wait_ms: i64 },

    #[error("Attendance already completed for today")]
    DayComplete,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;

impl From<AttendanceError> for AppError {
    fn from(err: AttendanceError) -> Self {
        match err {
            AttendanceError::StaffNotFound(card) => {
                AppError::new(ErrorCode::StaffNotFound).with_detail("card", card)
            }
            AttendanceError::DuplicateCard(card) => {
                AppError::new(ErrorCode::DuplicateStaffCard).with_detail("card", card)
            }
            AttendanceError::DuplicatePhone(phone) => {
                AppError::new(ErrorCode::DuplicateStaffPhone).with_detail("phone", phone)
            }
            AttendanceError::TooSoon { wait_ms } => {
                AppError::new(ErrorCode::TooSoon).with_detail("wait_ms", wait_ms)
            }
            AttendanceError::DayComplete => AppError::new(ErrorCode::DayComplete),
            AttendanceError::Validation(msg) => AppError::validation(msg),
            AttendanceError::Storage(e) => AppError::database(e.to_string()),
        }
    }
}

/// Staff intake and the attendance state machine
#[derive(Clone, Debug)]
pub struct StaffService {
    storage: CanteenStorage,
    config: Config,
}

impl StaffService {
    pub fn new(storage: CanteenStorage, config: Config) -> Self {
        Self { storage, config }
    }

    /// Register a staff member (unique card and phone)
    pub async fn create_staff(&self, data: StaffCreate) -> AttendanceResult<StaffMember> {
        validate_required_text(&data.name, "name", MAX_NAME_LEN)
            .map_err(|e| AttendanceError::Validation(e.message))?;
        validate_required_text(&data.card, "card", MAX_SHORT_TEXT_LEN)
            .map_err(|e| AttendanceError::Validation(e.message))?;
        validate_phone(&data.phone).map_err(|e| AttendanceError::Validation(e.message))?;
        if data.salary <= 0 {
            return Err(AttendanceError::Validation("salary must be positive".into()));
        }

        if self.storage.get_staff_by_card(&data.card)?.is_some() {
            return Err(AttendanceError::DuplicateCard(data.card));
        }
        if self.storage.staff_id_by_phone(&data.phone)?.is_some() {
            return Err(AttendanceError::DuplicatePhone(data.phone));
        }

        let now = now_millis();
        let staff = StaffMember {
            id: snowflake_id(),
            name: data.name,
            phone: data.phone,
            card: data.card,
            department: data.department,
            position: data.position,
            salary: data.salary,
            security_deposit: data.security_deposit,
            joining_date: data.joining_date,
            referenced_by: data.referenced_by.unwrap_or_else(|| "Self".to_string()),
            advances: vec![],
            fines: vec![],
            attendance: vec![],
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        self.storage.insert_staff(&txn, &staff)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(staff_id = staff.id, card = %staff.card, "Staff member created");
        Ok(staff)
    }

    /// Process one card scan at `now`. Returns a human-readable action.
    ///
    /// First scan of a day opens the record ("Entry marked"); later scans
    /// advance break-out → break-return → duty-off. A scan closer than the
    /// configured gap to the previous punch is rejected as a double scan,
    /// and a fifth scan after duty-off reports the day complete.
    pub async fn mark_attendance(&self, card: &str, now: i64) -> AttendanceResult<String> {
        let txn = self.storage.begin_write()?;
        let mut staff = self
            .storage
            .get_staff_by_card_txn(&txn, card)?
            .ok_or_else(|| AttendanceError::StaffNotFound(card.to_string()))?;

        let today = local_date(now, self.config.timezone);
        let action = match staff.attendance.iter().position(|a| a.date == today) {
            None => {
                staff.attendance.push(AttendanceDay {
                    date: today,
                    entry_time: now,
                    break_out_time: None,
                    break_return_time: None,
                    duty_off_time: None,
                    status: AttendanceStatus::Present,
                });
                "Entry marked"
            }
            Some(index) => {
                let record = &mut staff.attendance[index];
                let elapsed = now - record.last_punch();
                if elapsed < self.config.min_punch_gap_ms {
                    return Err(AttendanceError::TooSoon {
                        wait_ms: self.config.min_punch_gap_ms - elapsed,
                    });
                }

                if record.break_out_time.is_none() {
                    record.break_out_time = Some(now);
                    "Break-out marked"
                } else if record.break_return_time.is_none() {
                    record.break_return_time = Some(now);
                    "Break-return marked"
                } else if record.duty_off_time.is_none() {
                    record.duty_off_time = Some(now);
                    "Duty-off marked"
                } else {
                    return Err(AttendanceError::DayComplete);
                }
            }
        };

        staff.updated_at = now;
        self.storage.put_staff(&txn, &staff)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(card = %card, action, "Attendance punch");
        Ok(action.to_string())
    }

    /// Record a salary advance
    pub async fn add_advance(&self, card: &str, amount: i64, date: i64) -> AttendanceResult<StaffMember> {
        if amount <= 0 {
            return Err(AttendanceError::Validation("amount must be positive".into()));
        }

        let txn = self.storage.begin_write()?;
        let mut staff = self
            .storage
            .get_staff_by_card_txn(&txn, card)?
            .ok_or_else(|| AttendanceError::StaffNotFound(card.to_string()))?;

        staff.advances.push(shared::models::Advance { date, amount });
        staff.updated_at = now_millis();
        self.storage.put_staff(&txn, &staff)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(staff)
    }

    /// Record a fine with its reason
    pub async fn add_fine(
        &self,
        card: &str,
        amount: i64,
        reason: &str,
        date: i64,
    ) -> AttendanceResult<StaffMember> {
        if amount <= 0 {
            return Err(AttendanceError::Validation("amount must be positive".into()));
        }
        validate_required_text(reason, "reason", MAX_NOTE_LEN)
            .map_err(|e| AttendanceError::Validation(e.message))?;

        let txn = self.storage.begin_write()?;
        let mut staff = self
            .storage
            .get_staff_by_card_txn(&txn, card)?
            .ok_or_else(|| AttendanceError::StaffNotFound(card.to_string()))?;

        staff.fines.push(shared::models::Fine {
            date,
            reason: reason.to_string(),
            amount,
        });
        staff.updated_at = now_millis();
        self.storage.put_staff(&txn, &staff)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(staff)
    }

    /// Get a staff member by card
    pub async fn find_by_card(&self, card: &str) -> AttendanceResult<StaffMember> {
        self.storage
            .get_staff_by_card(card)?
            .ok_or_else(|| AttendanceError::StaffNotFound(card.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Kolkata;
    use shared::models::{Department, Position};

    fn ist(day_offset: u64, h: u32, m: u32) -> i64 {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .checked_add_days(chrono::Days::new(day_offset))
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_local_timezone(Kolkata)
            .unwrap()
            .timestamp_millis()
    }

    fn staff_payload(card: &str, phone: &str) -> StaffCreate {
        StaffCreate {
            name: "Kiran".into(),
            phone: phone.into(),
            card: card.into(),
            department: Department::Indian,
            position: Position::Chef,
            salary: 22000,
            security_deposit: 0,
            joining_date: ist(0, 9, 0),
            referenced_by: None,
        }
    }

    async fn setup() -> (CanteenStorage, StaffService) {
        let storage = CanteenStorage::open_in_memory().unwrap();
        let config = Config::default().with_timezone(Kolkata);
        let service = StaffService::new(storage.clone(), config);
        service
            .create_staff(staff_payload("SC-1", "9000000001"))
            .await
            .unwrap();
        (storage, service)
    }

    #[tokio::test]
    async fn test_create_staff_defaults_referenced_by() {
        let (_, service) = setup().await;
        let staff = service.find_by_card("SC-1").await.unwrap();
        assert_eq!(staff.referenced_by, "Self");
        assert!(staff.attendance.is_empty());
    }

    #[tokio::test]
    async fn test_create_staff_uniqueness() {
        let (_, service) = setup().await;

        let result = service.create_staff(staff_payload("SC-1", "9000000002")).await;
        assert!(matches!(result, Err(AttendanceError::DuplicateCard(_))));

        let result = service.create_staff(staff_payload("SC-2", "9000000001")).await;
        assert!(matches!(result, Err(AttendanceError::DuplicatePhone(_))));
    }

    #[tokio::test]
    async fn test_full_punch_sequence() {
        let (storage, service) = setup().await;

        // Entry, then each later scan advances one stage (default gap 1h)
        assert_eq!(
            service.mark_attendance("SC-1", ist(0, 9, 0)).await.unwrap(),
            "Entry marked"
        );
        assert_eq!(
            service.mark_attendance("SC-1", ist(0, 13, 0)).await.unwrap(),
            "Break-out marked"
        );
        assert_eq!(
            service.mark_attendance("SC-1", ist(0, 14, 30)).await.unwrap(),
            "Break-return marked"
        );
        assert_eq!(
            service.mark_attendance("SC-1", ist(0, 18, 0)).await.unwrap(),
            "Duty-off marked"
        );

        // Fifth scan, well past the gap: the day is closed
        let result = service.mark_attendance("SC-1", ist(0, 20, 0)).await;
        assert!(matches!(result, Err(AttendanceError::DayComplete)));

        let staff = storage.get_staff_by_card("SC-1").unwrap().unwrap();
        assert_eq!(staff.attendance.len(), 1);
        let day = &staff.attendance[0];
        assert!(day.is_complete());
        assert_eq!(day.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_double_scan_within_gap_rejected() {
        let (storage, service) = setup().await;

        service.mark_attendance("SC-1", ist(0, 9, 0)).await.unwrap();

        // 30 minutes later: under the one-hour gap
        let result = service.mark_attendance("SC-1", ist(0, 9, 30)).await;
        assert!(matches!(result, Err(AttendanceError::TooSoon { .. })));
        if let Err(AttendanceError::TooSoon { wait_ms }) = result {
            assert_eq!(wait_ms, 30 * 60 * 1000);
        }

        // Nothing advanced
        let staff = storage.get_staff_by_card("SC-1").unwrap().unwrap();
        assert!(staff.attendance[0].break_out_time.is_none());
    }

    #[tokio::test]
    async fn test_gap_guard_follows_latest_punch() {
        let (_, service) = setup().await;

        service.mark_attendance("SC-1", ist(0, 9, 0)).await.unwrap();
        service.mark_attendance("SC-1", ist(0, 13, 0)).await.unwrap();

        // 13:30 is an hour past entry but only 30 min past break-out
        let result = service.mark_attendance("SC-1", ist(0, 13, 30)).await;
        assert!(matches!(result, Err(AttendanceError::TooSoon { .. })));
    }

    #[tokio::test]
    async fn test_new_day_opens_new_record() {
        let (storage, service) = setup().await;

        service.mark_attendance("SC-1", ist(0, 9, 0)).await.unwrap();
        assert_eq!(
            service.mark_attendance("SC-1", ist(1, 9, 0)).await.unwrap(),
            "Entry marked"
        );

        let staff = storage.get_staff_by_card("SC-1").unwrap().unwrap();
        assert_eq!(staff.attendance.len(), 2);
        // Day one still has only its entry punch
        assert!(staff.attendance[0].break_out_time.is_none());
    }

    #[tokio::test]
    async fn test_unknown_card() {
        let (_, service) = setup().await;
        let result = service.mark_attendance("SC-GHOST", ist(0, 9, 0)).await;
        assert!(matches!(result, Err(AttendanceError::StaffNotFound(_))));
    }

    #[tokio::test]
    async fn test_advances_and_fines() {
        let (_, service) = setup().await;

        let staff = service.add_advance("SC-1", 2000, ist(0, 10, 0)).await.unwrap();
        assert_eq!(staff.advances.len(), 1);
        assert_eq!(staff.advances[0].amount, 2000);

        let staff = service
            .add_fine("SC-1", 500, "Late opening", ist(1, 10, 0))
            .await
            .unwrap();
        assert_eq!(staff.fines.len(), 1);
        assert_eq!(staff.fines[0].reason, "Late opening");

        let result = service.add_advance("SC-1", 0, ist(0, 10, 0)).await;
        assert!(matches!(result, Err(AttendanceError::Validation(_))));

        let result = service.add_fine("SC-1", 500, "  ", ist(0, 10, 0)).await;
        assert!(matches!(result, Err(AttendanceError::Validation(_))));
    }
}

//! Unified error codes for the mess POS core
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Account / ledger errors
//! - 2xxx: Plan errors
//! - 3xxx: Transaction errors
//! - 4xxx: Staff / attendance errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Account / Ledger ====================
    /// Account not found for the given card
    AccountNotFound = 1001,
    /// Recharge/deduction amount is zero or negative
    InvalidAmount = 1002,
    /// Deduction would push the balance below the floor
    InsufficientBalance = 1003,
    /// Card number is already assigned to an account
    DuplicateCard = 1004,
    /// Email is already registered to an account
    DuplicateEmail = 1005,
    /// Reassignment target card is already in use
    CardAlreadyAssigned = 1006,
    /// Card reassignment failed partway and was rolled back
    ReassignmentFailed = 1007,

    // ==================== 2xxx: Plan ====================
    /// Plan not found
    PlanNotFound = 2001,
    /// Plan template not found
    TemplateNotFound = 2002,
    /// Plan end date has passed
    PlanExpired = 2003,
    /// Account has no active plan
    NoActivePlan = 2004,
    /// No meal window matches the current time
    NoMealWindow = 2005,
    /// Resolved meal window is not part of the plan
    WindowNotInPlan = 2006,
    /// No meals remaining for the window (fixed) or overall (flexible)
    QuotaExhausted = 2007,

    // ==================== 3xxx: Transaction ====================
    /// Transaction not found
    TransactionNotFound = 3001,
    /// Status correction target is not a terminal status
    InvalidStatus = 3002,

    // ==================== 4xxx: Staff / Attendance ====================
    /// Staff member not found
    StaffNotFound = 4001,
    /// Staff card is already registered
    DuplicateStaffCard = 4002,
    /// Staff phone is already registered
    DuplicateStaffPhone = 4003,
    /// Punch attempted before the minimum gap elapsed
    TooSoon = 4004,
    /// All punches for the day are already recorded
    DayComplete = 4005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Printer not available
    PrinterNotAvailable = 9201,
    /// Print operation failed
    PrintFailed = 9202,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Account / Ledger
            ErrorCode::AccountNotFound => "Account not found",
            ErrorCode::InvalidAmount => "Amount must be greater than 0",
            ErrorCode::InsufficientBalance => "Insufficient balance",
            ErrorCode::DuplicateCard => "Card is already assigned",
            ErrorCode::DuplicateEmail => "Email is already registered",
            ErrorCode::CardAlreadyAssigned => "New card is already assigned",
            ErrorCode::ReassignmentFailed => "Card reassignment failed",

            // Plan
            ErrorCode::PlanNotFound => "Plan not found",
            ErrorCode::TemplateNotFound => "Plan template not found",
            ErrorCode::PlanExpired => "Plan has expired",
            ErrorCode::NoActivePlan => "No active plan",
            ErrorCode::NoMealWindow => "No meal available at this time",
            ErrorCode::WindowNotInPlan => "Meal window not included in the plan",
            ErrorCode::QuotaExhausted => "No meals remaining",

            // Transaction
            ErrorCode::TransactionNotFound => "Transaction not found",
            ErrorCode::InvalidStatus => "Invalid status value",

            // Staff / Attendance
            ErrorCode::StaffNotFound => "Staff member not found",
            ErrorCode::DuplicateStaffCard => "Staff card is already registered",
            ErrorCode::DuplicateStaffPhone => "Staff phone is already registered",
            ErrorCode::TooSoon => "Punch attempted too soon after the last one",
            ErrorCode::DayComplete => "Attendance already completed for today",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::PrinterNotAvailable => "Printer not available",
            ErrorCode::PrintFailed => "Print operation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            6 => ErrorCode::InvalidFormat,
            7 => ErrorCode::RequiredField,
            8 => ErrorCode::ValueOutOfRange,
            1001 => ErrorCode::AccountNotFound,
            1002 => ErrorCode::InvalidAmount,
            1003 => ErrorCode::InsufficientBalance,
            1004 => ErrorCode::DuplicateCard,
            1005 => ErrorCode::DuplicateEmail,
            1006 => ErrorCode::CardAlreadyAssigned,
            1007 => ErrorCode::ReassignmentFailed,
            2001 => ErrorCode::PlanNotFound,
            2002 => ErrorCode::TemplateNotFound,
            2003 => ErrorCode::PlanExpired,
            2004 => ErrorCode::NoActivePlan,
            2005 => ErrorCode::NoMealWindow,
            2006 => ErrorCode::WindowNotInPlan,
            2007 => ErrorCode::QuotaExhausted,
            3001 => ErrorCode::TransactionNotFound,
            3002 => ErrorCode::InvalidStatus,
            4001 => ErrorCode::StaffNotFound,
            4002 => ErrorCode::DuplicateStaffCard,
            4003 => ErrorCode::DuplicateStaffPhone,
            4004 => ErrorCode::TooSoon,
            4005 => ErrorCode::DayComplete,
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::ConfigError,
            9201 => ErrorCode::PrinterNotAvailable,
            9202 => ErrorCode::PrintFailed,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

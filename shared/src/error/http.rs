//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::AccountNotFound
            | Self::PlanNotFound
            | Self::TemplateNotFound
            | Self::NoActivePlan
            | Self::TransactionNotFound
            | Self::StaffNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::DuplicateCard
            | Self::DuplicateEmail
            | Self::CardAlreadyAssigned
            | Self::DuplicateStaffCard
            | Self::DuplicateStaffPhone => StatusCode::CONFLICT,

            // 422 Unprocessable Entity (business rule violations)
            Self::InsufficientBalance
            | Self::PlanExpired
            | Self::NoMealWindow
            | Self::WindowNotInPlan
            | Self::QuotaExhausted
            | Self::TooSoon
            | Self::DayComplete => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable (transient, client can retry)
            Self::PrinterNotAvailable => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::PrintFailed
            | Self::ReassignmentFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

//! Request and decision models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::enums::{DecisionStatus, RequestStatus};

/// An employee's ask for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: i32,
    pub submission_date: NaiveDate,
    pub needed_by: NaiveDate,
    pub justification: String,
    pub status: RequestStatus,
}

impl Request {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Recorded outcome of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: i32,
    pub status: DecisionStatus,
    pub decision_date: NaiveDate,
    pub comment: String,
    /// Loan paired with the decided request
    pub loan_id: i32,
}

/// Submit request input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Device type is required"))]
    pub device_type: String,
    #[validate(length(min = 1, message = "Operating system is required"))]
    pub os: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "Comment is required"))]
    pub comment: String,
    pub needed_by: NaiveDate,
}

/// Read-only view backing the "process request" screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRequestDisplay {
    pub request_id: i32,
    /// Email of the employee the device would be assigned to
    pub assignee_email: String,
    pub device_type: String,
    pub os: String,
    pub location: String,
    pub comment: String,
    pub needed_by: NaiveDate,
}

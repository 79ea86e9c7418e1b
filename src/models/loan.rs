//! Loan model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{employee::Employee, enums::LoanStatus};

/// Loan: binds one device to one borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i32,
    pub status: LoanStatus,
    /// Set when the loan becomes ACTIVE
    pub start_date: Option<NaiveDate>,
    /// Set on return
    pub end_date: Option<NaiveDate>,
    /// Absent for direct assignments
    pub request_id: Option<i32>,
    pub borrower_id: i32,
    pub approver_id: Option<i32>,
    pub device_id: i32,
}

impl Loan {
    /// Loan that has not been persisted yet; the store assigns the id
    pub fn new_inactive(request_id: Option<i32>, borrower_id: i32, device_id: i32) -> Self {
        Self {
            id: 0,
            status: LoanStatus::Inactive,
            start_date: None,
            end_date: None,
            request_id,
            borrower_id,
            approver_id: None,
            device_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Who currently holds a device, derived from its most recent active loan
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAssignment {
    pub loan: Loan,
    pub owner: Employee,
    /// Needed-by date of the originating request, if the loan came from one
    pub needed_by: Option<NaiveDate>,
}

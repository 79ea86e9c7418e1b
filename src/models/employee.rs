//! Employee model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Employee record. Borrowers and approvers are both employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    /// Unique
    pub email: String,
    pub department_id: i32,
    pub role_id: i32,
    pub termination_date: Option<NaiveDate>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Terminated from the termination date onwards
    pub fn is_terminated(&self, today: NaiveDate) -> bool {
        self.termination_date.map(|d| d <= today).unwrap_or(false)
    }
}

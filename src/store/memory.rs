//! In-process store
//!
//! Keeps every table in one mutex-guarded set of maps. Identifiers come from
//! per-table sequences starting at 1 and are never reused, matching the
//! PostgreSQL `SERIAL` columns.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{DeviceDescriptionStore, EmployeeStore, EntityStore, LoanStore, RequestStore};
use crate::{
    error::{AppError, AppResult},
    models::{Decision, Device, DeviceDescription, Employee, Loan, LoanStatus, Request, RequestStatus},
};

/// Row types the in-memory tables can hold
trait Row: Clone {
    fn id(&self) -> i32;
    fn set_id(&mut self, id: i32);

    /// Unique-constraint check against another row of the same table
    fn conflicts_with(&self, _other: &Self) -> bool {
        false
    }

    /// Frozen rows reject further updates
    fn is_frozen(&self) -> bool {
        false
    }
}

macro_rules! impl_row {
    ($($entity:ty),+) => {
        $(impl Row for $entity {
            fn id(&self) -> i32 {
                self.id
            }
            fn set_id(&mut self, id: i32) {
                self.id = id;
            }
        })+
    };
}

impl_row!(Device, DeviceDescription, Loan);

impl Row for Decision {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
    fn conflicts_with(&self, other: &Self) -> bool {
        self.id != other.id && self.loan_id == other.loan_id
    }
}

impl Row for Request {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
    fn is_frozen(&self) -> bool {
        self.status == RequestStatus::Closed
    }
}

impl Row for Employee {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
    fn conflicts_with(&self, other: &Self) -> bool {
        self.id != other.id && self.email.eq_ignore_ascii_case(&other.email)
    }
}

struct Table<T> {
    last_id: i32,
    rows: BTreeMap<i32, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Row> Table<T> {
    fn check_unique(&self, entity: &T, label: &str) -> AppResult<()> {
        if self.rows.values().any(|row| entity.conflicts_with(row)) {
            return Err(AppError::store(
                format!("writing {}", label),
                anyhow::anyhow!("unique constraint violated"),
            ));
        }
        Ok(())
    }

    fn insert(&mut self, entity: &T, label: &str) -> AppResult<i32> {
        self.check_unique(entity, label)?;
        self.last_id += 1;
        let mut row = entity.clone();
        row.set_id(self.last_id);
        self.rows.insert(self.last_id, row);
        Ok(self.last_id)
    }

    fn replace(&mut self, entity: &T, label: &str) -> AppResult<u64> {
        match self.rows.get(&entity.id()) {
            Some(existing) if !existing.is_frozen() => {}
            _ => return Ok(0),
        }
        self.check_unique(entity, label)?;
        self.rows.insert(entity.id(), entity.clone());
        Ok(1)
    }
}

#[derive(Default)]
struct Tables {
    devices: Table<Device>,
    descriptions: Table<DeviceDescription>,
    loans: Table<Loan>,
    requests: Table<Request>,
    decisions: Table<Decision>,
    employees: Table<Employee>,
}

/// Shared in-memory data set. Clones see the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| AppError::store("locking the in-memory store", anyhow::anyhow!("{}", e)))
    }
}

macro_rules! memory_entity_store {
    ($entity:ty, $table:ident, $label:literal) => {
        #[async_trait]
        impl EntityStore<$entity> for MemoryStore {
            async fn add(&self, entity: &$entity) -> AppResult<i32> {
                self.lock()?.$table.insert(entity, $label)
            }

            async fn update(&self, entity: &$entity) -> AppResult<u64> {
                self.lock()?.$table.replace(entity, $label)
            }

            async fn delete(&self, id: i32) -> AppResult<()> {
                match self.lock()?.$table.rows.remove(&id) {
                    Some(_) => Ok(()),
                    None => Err(AppError::NotFound(format!(concat!($label, " {} not found"), id))),
                }
            }

            async fn get_all(&self) -> AppResult<Vec<$entity>> {
                Ok(self.lock()?.$table.rows.values().cloned().collect())
            }

            async fn get_by_id(&self, id: i32) -> AppResult<Option<$entity>> {
                Ok(self.lock()?.$table.rows.get(&id).cloned())
            }
        }
    };
}

memory_entity_store!(Device, devices, "Device");
memory_entity_store!(Loan, loans, "Loan");
memory_entity_store!(Request, requests, "Request");
memory_entity_store!(Decision, decisions, "Decision");
memory_entity_store!(Employee, employees, "Employee");

#[async_trait]
impl RequestStore for MemoryStore {
    async fn close_if_pending(&self, id: i32) -> AppResult<u64> {
        let mut tables = self.lock()?;
        match tables.requests.rows.get_mut(&id) {
            Some(request) if request.status == RequestStatus::Pending => {
                request.status = RequestStatus::Closed;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn activate_if_unstarted(&self, loan: &Loan) -> AppResult<u64> {
        let mut tables = self.lock()?;
        match tables.loans.rows.get_mut(&loan.id) {
            Some(stored) if stored.status == LoanStatus::Inactive && stored.start_date.is_none() => {
                *stored = loan.clone();
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Employee>> {
        Ok(self
            .lock()?
            .employees
            .rows
            .values()
            .find(|e| e.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl DeviceDescriptionStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<DeviceDescription>> {
        Ok(self.lock()?.descriptions.rows.get(&id).cloned())
    }

    async fn resolve_or_create(
        &self,
        device_type: &str,
        os: &str,
        location: &str,
    ) -> AppResult<DeviceDescription> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables
            .descriptions
            .rows
            .values()
            .find(|d| d.matches(device_type, os, location))
        {
            return Ok(existing.clone());
        }

        let mut description = DeviceDescription {
            id: 0,
            device_type: device_type.to_string(),
            os: os.to_string(),
            location: location.to_string(),
        };
        description.id = tables.descriptions.insert(&description, "DeviceDescription")?;
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DecisionStatus;
    use chrono::NaiveDate;

    fn employee(email: &str) -> Employee {
        Employee {
            id: 0,
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.into(),
            department_id: 1,
            role_id: 1,
            termination_date: None,
        }
    }

    fn request() -> Request {
        Request {
            id: 0,
            submission_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            needed_by: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            justification: "need it".into(),
            status: RequestStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let store = MemoryStore::new();
        let requests: &dyn RequestStore = &store;
        let first = requests.add(&request()).await.unwrap();
        requests.delete(first).await.unwrap();
        let second = requests.add(&request()).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(requests.get_by_id(first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_if_pending_only_once() {
        let store = MemoryStore::new();
        let requests: &dyn RequestStore = &store;
        let id = requests.add(&request()).await.unwrap();
        assert_eq!(requests.close_if_pending(id).await.unwrap(), 1);
        assert_eq!(requests.close_if_pending(id).await.unwrap(), 0);
        assert_eq!(requests.close_if_pending(id + 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_loan_stub_is_activated_once() {
        let store = MemoryStore::new();
        let loans: &dyn LoanStore = &store;
        let stub = Loan::new_inactive(Some(1), 1, 1);
        let id = loans.add(&stub).await.unwrap();

        let activated = Loan {
            id,
            status: LoanStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            approver_id: Some(2),
            ..stub
        };
        assert_eq!(loans.activate_if_unstarted(&activated).await.unwrap(), 1);

        let again = Loan {
            approver_id: Some(3),
            ..activated.clone()
        };
        assert_eq!(loans.activate_if_unstarted(&again).await.unwrap(), 0);
        assert_eq!(loans.get_by_id(id).await.unwrap(), Some(activated));
    }

    #[tokio::test]
    async fn test_employee_email_is_unique() {
        let store = MemoryStore::new();
        let employees: &dyn EmployeeStore = &store;
        employees.add(&employee("a@x.com")).await.unwrap();
        let err = employees.add(&employee("A@x.com")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StoreFailure);
        let found = employees.get_by_email("a@X.com").await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(1));
    }

    #[tokio::test]
    async fn test_one_decision_per_loan() {
        let store = MemoryStore::new();
        let decisions: &dyn EntityStore<Decision> = &store;
        let decision = Decision {
            id: 0,
            status: DecisionStatus::Approved,
            decision_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            comment: "ok".into(),
            loan_id: 1,
        };
        decisions.add(&decision).await.unwrap();

        let second = Decision {
            status: DecisionStatus::Rejected,
            ..decision.clone()
        };
        let err = decisions.add(&second).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StoreFailure);

        let other_loan = Decision {
            loan_id: 2,
            ..decision
        };
        assert_eq!(decisions.add(&other_loan).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_resolve_or_create_reuses_description() {
        let store = MemoryStore::new();
        let descriptions: &dyn DeviceDescriptionStore = &store;
        let a = descriptions.resolve_or_create("Laptop", "Windows 11", "Denmark").await.unwrap();
        let b = descriptions.resolve_or_create("Laptop", "Windows 11", "Denmark").await.unwrap();
        let c = descriptions.resolve_or_create("Laptop", "Ubuntu", "Denmark").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn test_closed_request_is_immutable() {
        let store = MemoryStore::new();
        let requests: &dyn RequestStore = &store;
        let id = requests.add(&request()).await.unwrap();
        requests.close_if_pending(id).await.unwrap();

        let mut edited = requests.get_by_id(id).await.unwrap().unwrap();
        edited.justification = "changed".into();
        assert_eq!(requests.update(&edited).await.unwrap(), 0);
        assert_eq!(requests.get_by_id(id).await.unwrap().unwrap().justification, "need it");
    }

    #[tokio::test]
    async fn test_update_missing_row_affects_nothing() {
        let store = MemoryStore::new();
        let requests: &dyn RequestStore = &store;
        let mut missing = request();
        missing.id = 42;
        assert_eq!(requests.update(&missing).await.unwrap(), 0);
    }
}

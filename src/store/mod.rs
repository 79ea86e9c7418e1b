//! Entity store seam
//!
//! The services never talk to a database directly. They go through the
//! traits below, bundled in a [`Store`] that the process entry point builds
//! once and hands to every service. `repository` implements them on
//! PostgreSQL and [`memory`] implements them in process.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::{
    error::AppResult,
    models::{Decision, Device, DeviceDescription, Employee, Loan, Request},
};

/// Generic CRUD capability for one entity type
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore<T: Send + Sync + 'static>: Send + Sync {
    /// Persist a new entity, returning the identifier the store assigned
    async fn add(&self, entity: &T) -> AppResult<i32>;

    /// Overwrite an existing entity, returning the number of affected rows
    async fn update(&self, entity: &T) -> AppResult<u64>;

    async fn delete(&self, id: i32) -> AppResult<()>;

    async fn get_all(&self) -> AppResult<Vec<T>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Option<T>>;
}

/// Requests additionally support the conditional close used to resolve races
#[async_trait]
pub trait RequestStore: EntityStore<Request> {
    /// Flip a PENDING request to CLOSED. Returns 0 if it was not PENDING.
    async fn close_if_pending(&self, id: i32) -> AppResult<u64>;
}

/// Loans additionally support claiming a stub for activation
#[async_trait]
pub trait LoanStore: EntityStore<Loan> {
    /// Overwrite a loan that has never been started (INACTIVE, no start
    /// date) with its activated form. Returns 0 if it was already started.
    async fn activate_if_unstarted(&self, loan: &Loan) -> AppResult<u64>;
}

#[async_trait]
pub trait EmployeeStore: EntityStore<Employee> {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Employee>>;
}

#[async_trait]
pub trait DeviceDescriptionStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<DeviceDescription>>;

    /// Find the description for the triple, inserting it if missing
    async fn resolve_or_create(
        &self,
        device_type: &str,
        os: &str,
        location: &str,
    ) -> AppResult<DeviceDescription>;
}

/// Source of "today" for every dated write
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Always returns the same date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    date: NaiveDate,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }
}

/// Explicitly constructed store handle shared by all services
#[derive(Clone)]
pub struct Store {
    pub devices: Arc<dyn EntityStore<Device>>,
    pub descriptions: Arc<dyn DeviceDescriptionStore>,
    pub loans: Arc<dyn LoanStore>,
    pub requests: Arc<dyn RequestStore>,
    pub decisions: Arc<dyn EntityStore<Decision>>,
    pub employees: Arc<dyn EmployeeStore>,
    pub clock: Arc<dyn Clock>,
}

impl Store {
    /// Store backed by the in-memory implementation, sharing one data set
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_memory(memory::MemoryStore::new(), clock)
    }

    /// Store over an existing in-memory data set
    pub fn with_memory(memory: memory::MemoryStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            devices: Arc::new(memory.clone()),
            descriptions: Arc::new(memory.clone()),
            loans: Arc::new(memory.clone()),
            requests: Arc::new(memory.clone()),
            decisions: Arc::new(memory.clone()),
            employees: Arc::new(memory),
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

//! PostgreSQL implementation of the entity store
//!
//! Row structs here are the only place status enums meet their text form.

pub mod decisions;
pub mod devices;
pub mod employees;
pub mod loans;
pub mod requests;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::store::{Clock, Store};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub devices: devices::DevicesRepository,
    pub descriptions: devices::DeviceDescriptionsRepository,
    pub loans: loans::LoansRepository,
    pub requests: requests::RequestsRepository,
    pub decisions: decisions::DecisionsRepository,
    pub employees: employees::EmployeesRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            devices: devices::DevicesRepository::new(pool.clone()),
            descriptions: devices::DeviceDescriptionsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            requests: requests::RequestsRepository::new(pool.clone()),
            decisions: decisions::DecisionsRepository::new(pool.clone()),
            employees: employees::EmployeesRepository::new(pool.clone()),
            pool,
        }
    }

    /// Hand the repositories to the services as a store handle
    pub fn into_store(self, clock: Arc<dyn Clock>) -> Store {
        Store {
            devices: Arc::new(self.devices),
            descriptions: Arc::new(self.descriptions),
            loans: Arc::new(self.loans),
            requests: Arc::new(self.requests),
            decisions: Arc::new(self.decisions),
            employees: Arc::new(self.employees),
            clock,
        }
    }
}

//! Business logic services

pub mod devices;
pub mod loans;
pub mod requests;

use crate::{config::LendingConfig, store::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub devices: devices::DevicesService,
    pub loans: loans::LoansService,
    pub requests: requests::RequestsService,
}

impl Services {
    /// Create all services on one store handle
    pub fn new(store: Store, lending_config: &LendingConfig) -> Self {
        let devices = devices::DevicesService::new(store.clone(), lending_config);
        let loans = loans::LoansService::new(store.clone(), devices.clone());
        let requests = requests::RequestsService::new(store, devices.clone(), loans.clone());
        Self {
            devices,
            loans,
            requests,
        }
    }
}

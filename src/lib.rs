//! Itlend - IT equipment lending core
//!
//! Lifecycle and invariant logic for lending devices to employees: requests,
//! decisions, loans and devices, behind a pluggable entity store.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};

/// Application state owned by the process entry point
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, store: store::Store) -> Self {
        let services = services::Services::new(store, &config.lending);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}

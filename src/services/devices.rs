//! Device lifecycle service
//!
//! Every device status write goes through [`DevicesService::update`], which
//! holds the one hard rule of the lifecycle: a device is never put in stock
//! before it has been wiped. Other transitions are deliberately unrestricted.

use chrono::{Months, NaiveDate};

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{Device, DeviceDescription, DeviceStatus, NewDevice, UpdateDevice},
    store::{DeviceDescriptionStore, EntityStore, Store},
};

/// Registration date plus the service life, saturating at the last representable date
pub fn default_expiry(registration_date: NaiveDate, service_life_months: u32) -> NaiveDate {
    registration_date
        .checked_add_months(Months::new(service_life_months))
        .unwrap_or(NaiveDate::MAX)
}

#[derive(Clone)]
pub struct DevicesService {
    store: Store,
    service_life_months: u32,
}

impl DevicesService {
    pub fn new(store: Store, config: &LendingConfig) -> Self {
        Self {
            store,
            service_life_months: config.service_life_months,
        }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Device> {
        if id <= 0 {
            return Err(AppError::InvalidArgument(format!("Invalid device id {}", id)));
        }
        self.store
            .devices
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    pub async fn list(&self) -> AppResult<Vec<Device>> {
        self.store.devices.get_all().await
    }

    /// Look up a description, failing when it does not exist
    pub async fn description(&self, id: i32) -> AppResult<DeviceDescription> {
        self.store
            .descriptions
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device description {} not found", id)))
    }

    /// Register a device. Status defaults to REGISTERED and wiped to false.
    pub async fn create(&self, data: Option<&NewDevice>) -> AppResult<Device> {
        let data = data.ok_or_else(|| AppError::InvalidArgument("Device is required".to_string()))?;
        if data.description_id <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "Invalid device description id {}",
                data.description_id
            )));
        }
        self.description(data.description_id).await?;

        let expected_end_date = data.expected_end_date.or_else(|| {
            data.purchase_date
                .map(|purchased| self.calculate_default_expiry(purchased))
        });

        let mut device = Device {
            id: 0,
            description_id: data.description_id,
            status: data.status.unwrap_or_default(),
            wiped: data.wiped.unwrap_or(false),
            purchase_date: data.purchase_date,
            expected_end_date,
        };
        ensure_restockable(&device)?;

        device.id = self.store.devices.add(&device).await?;
        tracing::info!("Device {} registered with status {}", device.id, device.status);
        Ok(device)
    }

    /// Persist a device as given, enforcing wipe-before-restock
    pub async fn update(&self, device: &Device) -> AppResult<Device> {
        if device.id <= 0 {
            return Err(AppError::InvalidArgument(format!("Invalid device id {}", device.id)));
        }
        ensure_restockable(device)?;

        let affected = self.store.devices.update(device).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", device.id)));
        }
        tracing::info!(
            "Device {} updated: status={} wiped={}",
            device.id,
            device.status,
            device.wiped
        );
        Ok(device.clone())
    }

    /// Apply an edit-form update; goes through [`Self::update`]
    pub async fn apply_update(&self, id: i32, data: &UpdateDevice) -> AppResult<Device> {
        let current = self.get_by_id(id).await?;
        if let Some(description_id) = data.description_id {
            self.description(description_id).await?;
        }
        self.update(&data.apply_to(&current)).await
    }

    /// Register a placeholder device for a (type, OS, country) triple
    pub async fn create_virtual(&self, device_type: &str, os: &str, country: &str) -> AppResult<i32> {
        if device_type.trim().is_empty() || os.trim().is_empty() || country.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Device type, OS and country are required".to_string(),
            ));
        }

        let description = self
            .store
            .descriptions
            .resolve_or_create(device_type, os, country)
            .await?;

        let device = Device {
            id: 0,
            description_id: description.id,
            status: DeviceStatus::Registered,
            wiped: false,
            purchase_date: None,
            expected_end_date: Some(self.calculate_default_expiry(self.store.today())),
        };
        let id = self.store.devices.add(&device).await?;
        tracing::info!(
            "Virtual device {} registered for {} / {} / {}",
            id,
            device_type,
            os,
            country
        );
        Ok(id)
    }

    pub fn calculate_default_expiry(&self, registration_date: NaiveDate) -> NaiveDate {
        default_expiry(registration_date, self.service_life_months)
    }

    pub async fn mark_wiped(&self, id: i32) -> AppResult<Device> {
        let mut device = self.get_by_id(id).await?;
        device.wiped = true;
        self.update(&device).await
    }

    /// Put a device back in stock. Fails unless it has been wiped.
    pub async fn restock(&self, id: i32) -> AppResult<Device> {
        let mut device = self.get_by_id(id).await?;
        device.status = DeviceStatus::InStock;
        self.update(&device).await
    }

    /// Returned devices that still need a wipe before restocking
    pub async fn awaiting_wipe(&self) -> AppResult<Vec<Device>> {
        let devices = self.store.devices.get_all().await?;
        Ok(devices
            .into_iter()
            .filter(|d| d.status == DeviceStatus::Received && !d.wiped)
            .collect())
    }

    /// First wiped in-stock device with the given description
    pub async fn find_in_stock(&self, description_id: i32) -> AppResult<Option<Device>> {
        let devices = self.store.devices.get_all().await?;
        Ok(devices
            .into_iter()
            .filter(|d| d.description_id == description_id)
            .filter(|d| d.status == DeviceStatus::InStock && d.wiped)
            .min_by_key(|d| d.id))
    }
}

fn ensure_restockable(device: &Device) -> AppResult<()> {
    if !device.can_be_in_stock() {
        return Err(AppError::InvalidTransition(format!(
            "Device {} must be wiped before it can be put in stock",
            device.id
        )));
    }
    Ok(())
}

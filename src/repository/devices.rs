//! Devices and device descriptions repositories

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, StoreResultExt},
    models::{Device, DeviceDescription},
    store::{DeviceDescriptionStore, EntityStore},
};

#[derive(Debug, FromRow)]
struct DeviceRow {
    id: i32,
    description_id: i32,
    status: String,
    wiped: bool,
    purchase_date: Option<NaiveDate>,
    expected_end_date: Option<NaiveDate>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = AppError;

    fn try_from(row: DeviceRow) -> AppResult<Self> {
        Ok(Device {
            id: row.id,
            description_id: row.description_id,
            status: row.status.parse()?,
            wiped: row.wiped,
            purchase_date: row.purchase_date,
            expected_end_date: row.expected_end_date,
        })
    }
}

#[derive(Clone)]
pub struct DevicesRepository {
    pool: Pool<Postgres>,
}

impl DevicesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Device> for DevicesRepository {
    async fn add(&self, device: &Device) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO devices (description_id, status, wiped, purchase_date, expected_end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(device.description_id)
        .bind(device.status.as_str())
        .bind(device.wiped)
        .bind(device.purchase_date)
        .bind(device.expected_end_date)
        .fetch_one(&self.pool)
        .await
        .store_context("inserting device")
    }

    async fn update(&self, device: &Device) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET description_id = $1, status = $2, wiped = $3,
                purchase_date = $4, expected_end_date = $5
            WHERE id = $6
            "#,
        )
        .bind(device.description_id)
        .bind(device.status.as_str())
        .bind(device.wiped)
        .bind(device.purchase_date)
        .bind(device.expected_end_date)
        .bind(device.id)
        .execute(&self.pool)
        .await
        .store_context("updating device")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .store_context("deleting device")?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", id)));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Device>> {
        sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .store_context("listing devices")?
            .into_iter()
            .map(Device::try_from)
            .collect()
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Device>> {
        sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .store_context("loading device")?
            .map(Device::try_from)
            .transpose()
    }
}

#[derive(Clone)]
pub struct DeviceDescriptionsRepository {
    pool: Pool<Postgres>,
}

impl DeviceDescriptionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceDescriptionStore for DeviceDescriptionsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<DeviceDescription>> {
        sqlx::query_as::<_, (i32, String, String, String)>(
            "SELECT id, device_type, os, location FROM device_descriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .store_context("loading device description")
        .map(|row| {
            row.map(|(id, device_type, os, location)| DeviceDescription {
                id,
                device_type,
                os,
                location,
            })
        })
    }

    async fn resolve_or_create(
        &self,
        device_type: &str,
        os: &str,
        location: &str,
    ) -> AppResult<DeviceDescription> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO device_descriptions (device_type, os, location)
            VALUES ($1, $2, $3)
            ON CONFLICT (device_type, os, location)
            DO UPDATE SET device_type = EXCLUDED.device_type
            RETURNING id
            "#,
        )
        .bind(device_type)
        .bind(os)
        .bind(location)
        .fetch_one(&self.pool)
        .await
        .store_context("resolving device description")?;

        Ok(DeviceDescription {
            id,
            device_type: device_type.to_string(),
            os: os.to_string(),
            location: location.to_string(),
        })
    }
}

//! Device and device description models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::DeviceStatus;

/// Device record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i32,
    /// Type/OS/location classification
    pub description_id: i32,
    pub status: DeviceStatus,
    /// Set once the device has been wiped for re-issue
    pub wiped: bool,
    /// Absent for devices not yet purchased (planned placeholders)
    pub purchase_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
}

impl Device {
    /// A device may only sit in stock once wiped
    pub fn can_be_in_stock(&self) -> bool {
        self.status != DeviceStatus::InStock || self.wiped
    }
}

/// Create device request. Unset status/wiped fall back to REGISTERED/false.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDevice {
    pub description_id: i32,
    pub status: Option<DeviceStatus>,
    pub wiped: Option<bool>,
    pub purchase_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
}

/// Update device request, as mapped from an edit form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDevice {
    pub description_id: Option<i32>,
    pub status: Option<DeviceStatus>,
    pub wiped: Option<bool>,
    pub purchase_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
}

impl UpdateDevice {
    /// Overlay the set fields on an existing device
    pub fn apply_to(&self, device: &Device) -> Device {
        Device {
            id: device.id,
            description_id: self.description_id.unwrap_or(device.description_id),
            status: self.status.unwrap_or(device.status),
            wiped: self.wiped.unwrap_or(device.wiped),
            purchase_date: self.purchase_date.or(device.purchase_date),
            expected_end_date: self.expected_end_date.or(device.expected_end_date),
        }
    }
}

/// The (type, OS, location) triple a device is issued against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescription {
    pub id: i32,
    pub device_type: String,
    pub os: String,
    pub location: String,
}

impl DeviceDescription {
    pub fn matches(&self, device_type: &str, os: &str, location: &str) -> bool {
        self.device_type == device_type && self.os == os && self.location == location
    }
}

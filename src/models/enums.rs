//! Status enums shared by the lending entities
//!
//! The core always works with these variants. The text forms (`as_str` /
//! `FromStr`) exist for the store adapters and nothing else.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AppError;

macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::store(
                        concat!("decoding ", $label),
                        anyhow::anyhow!("unknown value {:?}", other),
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Request status. Both approval and rejection close the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Closed,
}

text_enum!(RequestStatus, "request status", {
    Pending => "PENDING",
    Closed => "CLOSED",
});

// ---------------------------------------------------------------------------
// DecisionStatus
// ---------------------------------------------------------------------------

/// Decision outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(DecisionStatus, "decision status", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Inactive,
    Active,
}

text_enum!(LoanStatus, "loan status", {
    Inactive => "INACTIVE",
    Active => "ACTIVE",
});

// ---------------------------------------------------------------------------
// DeviceStatus
// ---------------------------------------------------------------------------

/// Device lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    #[default]
    Registered,
    Cancelled,
    Planned,
    Ordered,
    Received,
    InUse,
    InStock,
}

text_enum!(DeviceStatus, "device status", {
    Registered => "REGISTERED",
    Cancelled => "CANCELLED",
    Planned => "PLANNED",
    Ordered => "ORDERED",
    Received => "RECEIVED",
    InUse => "INUSE",
    InStock => "INSTOCK",
});

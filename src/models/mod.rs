//! Data models for the lending core

pub mod device;
pub mod employee;
pub mod enums;
pub mod loan;
pub mod request;

// Re-export commonly used types
pub use device::{Device, DeviceDescription, NewDevice, UpdateDevice};
pub use employee::Employee;
pub use enums::{DecisionStatus, DeviceStatus, LoanStatus, RequestStatus};
pub use loan::{DeviceAssignment, Loan};
pub use request::{Decision, ProcessRequestDisplay, Request, SubmitRequest};

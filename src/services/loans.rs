//! Loan management service
//!
//! The only place that couples a device to a borrower. Current-owner lookups
//! for any projection go through [`LoansService::current_owner`].

use crate::{
    error::{AppError, AppResult},
    models::{DeviceAssignment, DeviceStatus, Employee, Loan, LoanStatus},
    services::devices::DevicesService,
    store::{EntityStore, LoanStore, Store},
};

#[derive(Clone)]
pub struct LoansService {
    store: Store,
    devices: DevicesService,
}

impl LoansService {
    pub fn new(store: Store, devices: DevicesService) -> Self {
        Self { store, devices }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        if id <= 0 {
            return Err(AppError::InvalidArgument(format!("Invalid loan id {}", id)));
        }
        self.store
            .loans
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Inactive loan tying a request to its borrower and device
    pub async fn create_loan(&self, request_id: i32, borrower_id: i32, device_id: i32) -> AppResult<Loan> {
        if request_id <= 0 || borrower_id <= 0 || device_id <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "Invalid loan references (request {}, borrower {}, device {})",
                request_id, borrower_id, device_id
            )));
        }
        self.add_loan(&Loan::new_inactive(Some(request_id), borrower_id, device_id))
            .await
    }

    /// Persist a loan after checking the borrower and device it points at
    pub async fn add_loan(&self, loan: &Loan) -> AppResult<Loan> {
        if loan.borrower_id <= 0 || loan.device_id <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "Invalid loan references (borrower {}, device {})",
                loan.borrower_id, loan.device_id
            )));
        }
        self.check_references(loan.borrower_id, loan.device_id).await?;

        let mut stored = loan.clone();
        stored.id = self.store.loans.add(loan).await?;
        tracing::info!(
            "Loan {} created ({}) for borrower {} on device {}",
            stored.id,
            stored.status,
            stored.borrower_id,
            stored.device_id
        );
        Ok(stored)
    }

    /// Make a loan stub active from today, recording the approver and the
    /// device handed out. Fails with `AlreadyResolved` if the stub was
    /// activated by someone else in the meantime.
    pub async fn activate(&self, loan: &Loan, approver_id: i32, device_id: i32) -> AppResult<Loan> {
        self.check_references(loan.borrower_id, device_id).await?;

        let activated = Loan {
            status: LoanStatus::Active,
            start_date: Some(self.store.today()),
            end_date: None,
            approver_id: Some(approver_id),
            device_id,
            ..loan.clone()
        };
        if self.store.loans.activate_if_unstarted(&activated).await? == 0 {
            return Err(AppError::AlreadyResolved(format!(
                "Loan {} was already activated",
                loan.id
            )));
        }
        tracing::info!("Loan {} activated on device {}", activated.id, device_id);
        Ok(activated)
    }

    /// Write a loan back as-is, used to undo an activation this caller made
    pub(crate) async fn restore(&self, loan: &Loan) -> AppResult<()> {
        self.write(loan).await?;
        tracing::info!("Loan {} restored to {}", loan.id, loan.status);
        Ok(())
    }

    async fn write(&self, loan: &Loan) -> AppResult<()> {
        if self.store.loans.update(loan).await? == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", loan.id)));
        }
        Ok(())
    }

    /// Hand a device straight to an employee, without a request
    ///
    /// The loan is written first. If the device update fails afterwards the
    /// loan stays in place and the error is returned.
    pub async fn assign_device_to_employee(
        &self,
        device_id: i32,
        employee_id: i32,
        approver_id: i32,
    ) -> AppResult<Loan> {
        if device_id <= 0 || employee_id <= 0 || approver_id <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "Invalid assignment (device {}, employee {}, approver {})",
                device_id, employee_id, approver_id
            )));
        }
        self.employee(approver_id).await?;

        let loan = Loan {
            status: LoanStatus::Active,
            start_date: Some(self.store.today()),
            approver_id: Some(approver_id),
            ..Loan::new_inactive(None, employee_id, device_id)
        };
        let loan = self.add_loan(&loan).await?;

        let issued = async {
            let mut device = self.devices.get_by_id(device_id).await?;
            device.wiped = false;
            device.status = DeviceStatus::InUse;
            self.devices.update(&device).await
        };
        if let Err(e) = issued.await {
            tracing::warn!(
                "Loan {} kept after device {} could not be marked in use: {}",
                loan.id,
                device_id,
                e
            );
            return Err(e);
        }

        tracing::info!("Device {} assigned to employee {}", device_id, employee_id);
        Ok(loan)
    }

    /// Close an active loan. The device comes back unwiped and must be wiped
    /// before it can be restocked.
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<Loan> {
        let loan = self.get_by_id(loan_id).await?;
        if !loan.is_active() {
            return Err(AppError::InvalidState(format!("Loan {} is not active", loan_id)));
        }

        let returned = Loan {
            status: LoanStatus::Inactive,
            end_date: Some(self.store.today()),
            ..loan
        };
        self.write(&returned).await?;

        let mut device = self.devices.get_by_id(returned.device_id).await?;
        device.status = DeviceStatus::Received;
        device.wiped = false;
        self.devices.update(&device).await?;

        tracing::info!("Loan {} returned, device {} awaiting wipe", loan_id, device.id);
        Ok(returned)
    }

    pub async fn active_loans(&self) -> AppResult<Vec<Loan>> {
        let loans = self.store.loans.get_all().await?;
        Ok(loans.into_iter().filter(Loan::is_active).collect())
    }

    /// Loan created for a request
    pub async fn loan_for_request(&self, request_id: i32) -> AppResult<Loan> {
        self.store
            .loans
            .get_all()
            .await?
            .into_iter()
            .find(|l| l.request_id == Some(request_id))
            .ok_or_else(|| AppError::NotFound(format!("No loan for request {}", request_id)))
    }

    /// Loan with the latest start date for a device. Unstarted loans rank
    /// lowest; ties go to the newest loan.
    pub async fn most_recent_loan_for_device(&self, device_id: i32) -> AppResult<Option<Loan>> {
        let loans = self.store.loans.get_all().await?;
        Ok(loans
            .into_iter()
            .filter(|l| l.device_id == device_id)
            .max_by_key(|l| (l.start_date, l.id)))
    }

    /// Who currently holds a device, with the needed-by date of the request
    /// the loan came from
    pub async fn current_owner(&self, device_id: i32) -> AppResult<Option<DeviceAssignment>> {
        let loan = match self.most_recent_loan_for_device(device_id).await? {
            Some(loan) if loan.is_active() => loan,
            _ => return Ok(None),
        };
        let owner = self.employee(loan.borrower_id).await?;
        let needed_by = match loan.request_id {
            Some(request_id) => self
                .store
                .requests
                .get_by_id(request_id)
                .await?
                .map(|r| r.needed_by),
            None => None,
        };
        Ok(Some(DeviceAssignment {
            loan,
            owner,
            needed_by,
        }))
    }

    async fn employee(&self, id: i32) -> AppResult<Employee> {
        self.store
            .employees
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))
    }

    async fn check_references(&self, borrower_id: i32, device_id: i32) -> AppResult<()> {
        let borrower = self.employee(borrower_id).await?;
        if borrower.is_terminated(self.store.today()) {
            return Err(AppError::InvalidState(format!(
                "Employee {} is terminated and cannot borrow devices",
                borrower_id
            )));
        }
        let device = self.devices.get_by_id(device_id).await?;
        if device.status == DeviceStatus::Cancelled {
            return Err(AppError::InvalidState(format!(
                "Device {} is cancelled and cannot be lent",
                device_id
            )));
        }
        Ok(())
    }
}

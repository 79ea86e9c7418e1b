//! Request/decision workflow
//!
//! A request moves from PENDING to CLOSED exactly once, with the outcome
//! (APPROVED or REJECTED) kept on the decision. Approval first claims the
//! request's loan stub with a conditional activation, so a concurrent
//! approval is turned away before it writes anything. Device writes and the
//! conditional close follow; if either fails, the loan and the device writes
//! this call made are undone and the request stays PENDING.

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        Decision, DecisionStatus, Device, DeviceStatus, Employee, Loan, ProcessRequestDisplay,
        Request, RequestStatus, SubmitRequest,
    },
    services::{devices::DevicesService, loans::LoansService},
    store::{EmployeeStore, EntityStore, RequestStore, Store},
};

/// Device writes needed to hand out a device for an approved request
struct DevicePlan {
    device_id: i32,
    /// (before, after) pairs, applied in order
    changes: Vec<(Device, Device)>,
}

#[derive(Clone)]
pub struct RequestsService {
    store: Store,
    devices: DevicesService,
    loans: LoansService,
}

impl RequestsService {
    pub fn new(store: Store, devices: DevicesService, loans: LoansService) -> Self {
        Self {
            store,
            devices,
            loans,
        }
    }

    pub async fn get_request(&self, id: i32) -> AppResult<Request> {
        if id <= 0 {
            return Err(AppError::InvalidArgument(format!("Invalid request id {}", id)));
        }
        self.store
            .requests
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))
    }

    pub async fn list_pending(&self) -> AppResult<Vec<Request>> {
        let requests = self.store.requests.get_all().await?;
        Ok(requests.into_iter().filter(Request::is_pending).collect())
    }

    /// File a request for a device
    ///
    /// Alongside the request this registers a placeholder device for the
    /// requested type/OS/country and an inactive loan linking both to the
    /// requester, so the request shows up as awaiting a device. Input is
    /// fully checked before the first write; if a later write fails, the
    /// device and request written so far are removed again.
    pub async fn submit_request(&self, data: &SubmitRequest) -> AppResult<Request> {
        data.validate()?;
        let fields = [
            ("Comment", &data.comment),
            ("Device type", &data.device_type),
            ("OS", &data.os),
            ("Country", &data.country),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::InvalidArgument(format!("{} is required", field)));
            }
        }
        let today = self.store.today();
        if data.needed_by < today {
            return Err(AppError::InvalidArgument(format!(
                "Needed-by date {} is in the past",
                data.needed_by
            )));
        }

        let employee = self.employee_by_email(&data.email).await?;
        if employee.is_terminated(today) {
            return Err(AppError::InvalidState(format!(
                "Employee {} is terminated",
                employee.email
            )));
        }

        let device_id = self
            .devices
            .create_virtual(&data.device_type, &data.os, &data.country)
            .await?;

        let mut request = Request {
            id: 0,
            submission_date: today,
            needed_by: data.needed_by,
            justification: data.comment.clone(),
            status: RequestStatus::Pending,
        };
        request.id = match self.store.requests.add(&request).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_submission(None, device_id).await;
                return Err(e);
            }
        };

        let loan = match self.loans.create_loan(request.id, employee.id, device_id).await {
            Ok(loan) => loan,
            Err(e) => {
                self.discard_submission(Some(request.id), device_id).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Request {} submitted by {} (loan stub {}, needed by {})",
            request.id,
            employee.email,
            loan.id,
            request.needed_by
        );
        Ok(request)
    }

    /// Approve a pending request and hand out a device for it
    pub async fn approve_request(
        &self,
        request_id: i32,
        approver_email: &str,
        comment: &str,
    ) -> AppResult<Decision> {
        let (request, approver) = self.pending_request(request_id, approver_email).await?;
        let loan = self.loans.loan_for_request(request.id).await?;
        let placeholder = self.devices.get_by_id(loan.device_id).await?;
        let plan = self.plan_device(&placeholder).await?;

        let activated = self.loans.activate(&loan, approver.id, plan.device_id).await?;

        let mut written: Vec<(Device, Device)> = Vec::new();
        for (before, after) in plan.changes {
            if let Err(e) = self.devices.update(&after).await {
                self.compensate(&loan, &written).await;
                return Err(e);
            }
            written.push((before, after));
        }

        if let Err(e) = self.close(request.id).await {
            self.compensate(&loan, &written).await;
            return Err(e);
        }

        let decision = self
            .record_decision(DecisionStatus::Approved, comment, activated.id)
            .await?;
        tracing::info!(
            "Request {} approved by {}: device {} on loan {}",
            request.id,
            approver.email,
            plan.device_id,
            activated.id
        );
        Ok(decision)
    }

    /// Reject a pending request. Devices and loans are left as they are.
    pub async fn reject_request(
        &self,
        request_id: i32,
        approver_email: &str,
        comment: &str,
    ) -> AppResult<Decision> {
        let (request, approver) = self.pending_request(request_id, approver_email).await?;
        let loan = self.loans.loan_for_request(request.id).await?;

        self.close(request.id).await?;
        let decision = self
            .record_decision(DecisionStatus::Rejected, comment, loan.id)
            .await?;
        tracing::info!("Request {} rejected by {}", request.id, approver.email);
        Ok(decision)
    }

    /// Decision recorded for a request, if it has been resolved
    pub async fn decision_for_request(&self, request_id: i32) -> AppResult<Option<Decision>> {
        let loan = self.loans.loan_for_request(request_id).await?;
        let decisions = self.store.decisions.get_all().await?;
        Ok(decisions.into_iter().find(|d| d.loan_id == loan.id))
    }

    /// Data for the "process request" screen
    pub async fn get_process_request_display_model(
        &self,
        request_id: i32,
    ) -> AppResult<ProcessRequestDisplay> {
        let request = self.get_request(request_id).await?;
        let loan = self.loans.loan_for_request(request.id).await?;
        let assignee = self
            .store
            .employees
            .get_by_id(loan.borrower_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", loan.borrower_id)))?;
        let device = self.devices.get_by_id(loan.device_id).await?;
        let description = self.devices.description(device.description_id).await?;

        Ok(ProcessRequestDisplay {
            request_id: request.id,
            assignee_email: assignee.email,
            device_type: description.device_type,
            os: description.os,
            location: description.location,
            comment: request.justification,
            needed_by: request.needed_by,
        })
    }

    async fn employee_by_email(&self, email: &str) -> AppResult<Employee> {
        self.store
            .employees
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No employee with email {}", email)))
    }

    /// Load the request and approver, requiring the request to still be pending
    async fn pending_request(&self, request_id: i32, approver_email: &str) -> AppResult<(Request, Employee)> {
        let request = self.get_request(request_id).await?;
        let approver = self.employee_by_email(approver_email).await?;
        if !request.is_pending() {
            return Err(AppError::InvalidState(format!(
                "Request {} has already been resolved",
                request_id
            )));
        }
        Ok((request, approver))
    }

    /// Prefer a wiped device already in stock; otherwise the placeholder
    /// becomes a planned purchase.
    async fn plan_device(&self, placeholder: &Device) -> AppResult<DevicePlan> {
        match self.devices.find_in_stock(placeholder.description_id).await? {
            Some(stock) if stock.id != placeholder.id => {
                let issued = Device {
                    status: DeviceStatus::InUse,
                    wiped: false,
                    ..stock.clone()
                };
                let cancelled = Device {
                    status: DeviceStatus::Cancelled,
                    ..placeholder.clone()
                };
                Ok(DevicePlan {
                    device_id: stock.id,
                    changes: vec![(stock, issued), (placeholder.clone(), cancelled)],
                })
            }
            _ => {
                let planned = Device {
                    status: DeviceStatus::Planned,
                    ..placeholder.clone()
                };
                Ok(DevicePlan {
                    device_id: placeholder.id,
                    changes: vec![(placeholder.clone(), planned)],
                })
            }
        }
    }

    /// Conditional close; losing a race to another approver is `AlreadyResolved`
    async fn close(&self, request_id: i32) -> AppResult<()> {
        match self.store.requests.close_if_pending(request_id).await? {
            0 => Err(AppError::AlreadyResolved(format!(
                "Request {} was resolved concurrently",
                request_id
            ))),
            _ => Ok(()),
        }
    }

    async fn record_decision(&self, status: DecisionStatus, comment: &str, loan_id: i32) -> AppResult<Decision> {
        let mut decision = Decision {
            id: 0,
            status,
            decision_date: self.store.today(),
            comment: comment.to_string(),
            loan_id,
        };
        decision.id = self.store.decisions.add(&decision).await?;
        Ok(decision)
    }

    /// Undo a partial approval: put the loan stub back and revert each
    /// (before, after) device write, newest first. A device that no longer
    /// holds the value written here is left alone. Failures are logged; the
    /// caller reports the error that triggered the rollback.
    async fn compensate(&self, stub: &Loan, written: &[(Device, Device)]) {
        if let Err(e) = self.loans.restore(stub).await {
            tracing::warn!("Could not restore loan {}: {}", stub.id, e);
        }
        for (before, after) in written.iter().rev() {
            let reverted = async {
                let current = self.devices.get_by_id(after.id).await?;
                if current != *after {
                    tracing::warn!("Device {} changed since approval started, left as is", after.id);
                    return Ok(());
                }
                self.devices.update(before).await.map(|_| ())
            };
            if let Err(e) = reverted.await {
                tracing::warn!("Could not restore device {}: {}", before.id, e);
            }
        }
    }

    /// Remove what a failed submission already wrote
    async fn discard_submission(&self, request_id: Option<i32>, device_id: i32) {
        if let Some(id) = request_id {
            if let Err(e) = self.store.requests.delete(id).await {
                tracing::warn!("Could not remove request {} after failed submission: {}", id, e);
            }
        }
        if let Err(e) = self.store.devices.delete(device_id).await {
            tracing::warn!("Could not remove device {} after failed submission: {}", device_id, e);
        }
    }
}

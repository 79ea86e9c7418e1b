//! Lending workflow tests against the in-memory store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Barrier;

use itlend::{
    config::LendingConfig,
    models::{
        DecisionStatus, Device, DeviceStatus, Employee, Loan, LoanStatus, Request,
        RequestStatus, SubmitRequest,
    },
    services::Services,
    store::{
        memory::MemoryStore, EmployeeStore, EntityStore, FixedClock, LoanStore, RequestStore,
        Store,
    },
    AppResult, ErrorKind,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
}

fn employee(email: &str) -> Employee {
    Employee {
        id: 0,
        first_name: "Test".into(),
        last_name: "User".into(),
        email: email.into(),
        department_id: 1,
        role_id: 1,
        termination_date: None,
    }
}

fn laptop_request() -> SubmitRequest {
    SubmitRequest {
        email: "a@x.com".into(),
        device_type: "Laptop".into(),
        os: "Windows 11".into(),
        country: "Denmark".into(),
        comment: "need it".into(),
        needed_by: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
    }
}

async fn seed(store: &Store) -> (i32, i32) {
    let borrower = store.employees.add(&employee("a@x.com")).await.unwrap();
    let approver = store.employees.add(&employee("boss@x.com")).await.unwrap();
    (borrower, approver)
}

async fn setup() -> (Store, Services) {
    let store = Store::in_memory(Arc::new(FixedClock::new(today())));
    seed(&store).await;
    let services = Services::new(store.clone(), &LendingConfig::default());
    (store, services)
}

#[tokio::test]
async fn test_submit_then_fetch_round_trip() {
    let (_, services) = setup().await;
    let submitted = services.requests.submit_request(&laptop_request()).await.unwrap();

    let fetched = services.requests.get_request(submitted.id).await.unwrap();
    assert_eq!(fetched.justification, "need it");
    assert_eq!(fetched.needed_by, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
    assert_eq!(fetched.status, RequestStatus::Pending);
    assert_eq!(fetched.submission_date, today());
}

#[tokio::test]
async fn test_approve_laptop_request() {
    let (store, services) = setup().await;
    let request = services.requests.submit_request(&laptop_request()).await.unwrap();

    let decision = services
        .requests
        .approve_request(request.id, "boss@x.com", "ok")
        .await
        .unwrap();

    let request = services.requests.get_request(request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Closed);

    assert_eq!(decision.status, DecisionStatus::Approved);
    assert_eq!(decision.comment, "ok");
    assert_eq!(decision.decision_date, today());
    let stored = services
        .requests
        .decision_for_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, decision);

    let loan = services.loans.get_by_id(decision.loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.start_date, Some(today()));
    assert_eq!(loan.request_id, Some(request.id));
    let approver = store.employees.get_by_email("boss@x.com").await.unwrap().unwrap();
    assert_eq!(loan.approver_id, Some(approver.id));

    let device = services.devices.get_by_id(loan.device_id).await.unwrap();
    assert_ne!(device.status, DeviceStatus::Registered);
    let description = services.devices.description(device.description_id).await.unwrap();
    assert!(description.matches("Laptop", "Windows 11", "Denmark"));

    let owner = services.loans.current_owner(device.id).await.unwrap().unwrap();
    assert_eq!(owner.owner.email, "a@x.com");
    assert_eq!(owner.needed_by, Some(request.needed_by));
}

#[tokio::test]
async fn test_requests_resolve_at_most_once() {
    let (_, services) = setup().await;
    let approved = services.requests.submit_request(&laptop_request()).await.unwrap();
    let rejected = services.requests.submit_request(&laptop_request()).await.unwrap();

    services
        .requests
        .approve_request(approved.id, "boss@x.com", "ok")
        .await
        .unwrap();
    services
        .requests
        .reject_request(rejected.id, "boss@x.com", "no")
        .await
        .unwrap();

    for id in [approved.id, rejected.id] {
        let err = services
            .requests
            .approve_request(id, "boss@x.com", "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = services
            .requests
            .reject_request(id, "boss@x.com", "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}

#[tokio::test]
async fn test_in_stock_requires_wipe_for_every_status() {
    let (_, services) = setup().await;
    let starting = [
        DeviceStatus::Registered,
        DeviceStatus::Cancelled,
        DeviceStatus::Planned,
        DeviceStatus::Ordered,
        DeviceStatus::Received,
        DeviceStatus::InUse,
        DeviceStatus::InStock,
    ];
    for status in starting {
        let id = services
            .devices
            .create_virtual("Phone", "Android", "Finland")
            .await
            .unwrap();
        let mut device = services.devices.get_by_id(id).await.unwrap();
        device.status = status;
        device.wiped = status == DeviceStatus::InStock;
        services.devices.update(&device).await.unwrap();

        let unwiped = Device {
            status: DeviceStatus::InStock,
            wiped: false,
            ..device.clone()
        };
        let err = services.devices.update(&unwiped).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let wiped = Device {
            status: DeviceStatus::InStock,
            wiped: true,
            ..device
        };
        services.devices.update(&wiped).await.unwrap();
        let stored = services.devices.get_by_id(id).await.unwrap();
        assert_eq!(stored.status, DeviceStatus::InStock);
        assert!(stored.wiped);
    }
}

#[tokio::test]
async fn test_assign_device_directly() {
    let (store, services) = setup().await;
    let device_id = services
        .devices
        .create_virtual("Laptop", "macOS", "Denmark")
        .await
        .unwrap();
    services.devices.mark_wiped(device_id).await.unwrap();
    services.devices.restock(device_id).await.unwrap();

    let borrower = store.employees.get_by_email("a@x.com").await.unwrap().unwrap();
    let approver = store.employees.get_by_email("boss@x.com").await.unwrap().unwrap();
    let loans_before = store.loans.get_all().await.unwrap().len();

    let loan = services
        .loans
        .assign_device_to_employee(device_id, borrower.id, approver.id)
        .await
        .unwrap();

    let loans = store.loans.get_all().await.unwrap();
    assert_eq!(loans.len(), loans_before + 1);
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.start_date, Some(today()));
    assert_eq!(loan.request_id, None);

    let device = services.devices.get_by_id(device_id).await.unwrap();
    assert_eq!(device.status, DeviceStatus::InUse);
    assert!(!device.wiped);
}

#[tokio::test]
async fn test_return_wipe_restock_cycle() {
    let (store, services) = setup().await;
    let request = services.requests.submit_request(&laptop_request()).await.unwrap();
    let decision = services
        .requests
        .approve_request(request.id, "boss@x.com", "ok")
        .await
        .unwrap();

    let returned = services.loans.return_loan(decision.loan_id).await.unwrap();
    assert_eq!(returned.end_date, Some(today()));
    assert!(services.loans.current_owner(returned.device_id).await.unwrap().is_none());

    let awaiting = services.devices.awaiting_wipe().await.unwrap();
    assert_eq!(awaiting.len(), 1);
    let err = services.devices.restock(returned.device_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    services.devices.mark_wiped(returned.device_id).await.unwrap();
    services.devices.restock(returned.device_id).await.unwrap();

    // The restocked device is picked up by the next approval
    let mut next = laptop_request();
    next.needed_by = today();
    let next = services.requests.submit_request(&next).await.unwrap();
    let decision = services
        .requests
        .approve_request(next.id, "boss@x.com", "reuse it")
        .await
        .unwrap();
    let loan = store.loans.get_by_id(decision.loan_id).await.unwrap().unwrap();
    assert_eq!(loan.device_id, returned.device_id);
}

/// Request store where another approver always closes the request first
struct RacingRequests {
    inner: MemoryStore,
}

#[async_trait]
impl EntityStore<Request> for RacingRequests {
    async fn add(&self, entity: &Request) -> AppResult<i32> {
        EntityStore::<Request>::add(&self.inner, entity).await
    }

    async fn update(&self, entity: &Request) -> AppResult<u64> {
        EntityStore::<Request>::update(&self.inner, entity).await
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        EntityStore::<Request>::delete(&self.inner, id).await
    }

    async fn get_all(&self) -> AppResult<Vec<Request>> {
        EntityStore::<Request>::get_all(&self.inner).await
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Request>> {
        EntityStore::<Request>::get_by_id(&self.inner, id).await
    }
}

#[async_trait]
impl RequestStore for RacingRequests {
    async fn close_if_pending(&self, id: i32) -> AppResult<u64> {
        self.inner.close_if_pending(id).await?;
        self.inner.close_if_pending(id).await
    }
}

#[tokio::test]
async fn test_concurrent_approval_is_already_resolved() {
    let memory = MemoryStore::new();
    let store = Store {
        requests: Arc::new(RacingRequests {
            inner: memory.clone(),
        }),
        ..Store::in_memory(Arc::new(FixedClock::new(today())))
    };
    seed(&store).await;
    let services = Services::new(store.clone(), &LendingConfig::default());

    let request = services.requests.submit_request(&laptop_request()).await.unwrap();
    let stub = services.loans.loan_for_request(request.id).await.unwrap();

    let err = services
        .requests
        .approve_request(request.id, "boss@x.com", "ok")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyResolved);

    // Loan and device writes were rolled back
    let loan = services.loans.get_by_id(stub.id).await.unwrap();
    assert_eq!(loan, stub);
    let device = services.devices.get_by_id(stub.device_id).await.unwrap();
    assert_eq!(device.status, DeviceStatus::Registered);
    assert!(store.decisions.get_all().await.unwrap().is_empty());
}

/// Loan store where the first two full listings wait for each other, so two
/// approvals both read the loan stub before either of them writes
struct LockstepLoans {
    inner: MemoryStore,
    barrier: Barrier,
    listings: AtomicUsize,
}

#[async_trait]
impl EntityStore<Loan> for LockstepLoans {
    async fn add(&self, entity: &Loan) -> AppResult<i32> {
        EntityStore::<Loan>::add(&self.inner, entity).await
    }

    async fn update(&self, entity: &Loan) -> AppResult<u64> {
        EntityStore::<Loan>::update(&self.inner, entity).await
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        EntityStore::<Loan>::delete(&self.inner, id).await
    }

    async fn get_all(&self) -> AppResult<Vec<Loan>> {
        let loans = EntityStore::<Loan>::get_all(&self.inner).await?;
        if self.listings.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        Ok(loans)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        EntityStore::<Loan>::get_by_id(&self.inner, id).await
    }
}

#[async_trait]
impl LoanStore for LockstepLoans {
    async fn activate_if_unstarted(&self, loan: &Loan) -> AppResult<u64> {
        self.inner.activate_if_unstarted(loan).await
    }
}

#[tokio::test]
async fn test_simultaneous_approvals_keep_the_winner() {
    let memory = MemoryStore::new();
    let store = Store {
        loans: Arc::new(LockstepLoans {
            inner: memory.clone(),
            barrier: Barrier::new(2),
            listings: AtomicUsize::new(0),
        }),
        ..Store::with_memory(memory.clone(), Arc::new(FixedClock::new(today())))
    };
    let (_, approver) = seed(&store).await;
    let services = Services::new(store.clone(), &LendingConfig::default());
    let request = services.requests.submit_request(&laptop_request()).await.unwrap();

    let (first, second) = tokio::join!(
        services.requests.approve_request(request.id, "boss@x.com", "first"),
        services.requests.approve_request(request.id, "boss@x.com", "second"),
    );
    let (decision, err) = match (first, second) {
        (Ok(decision), Err(err)) | (Err(err), Ok(decision)) => (decision, err),
        other => panic!("expected exactly one approval to succeed, got {:?}", other),
    };
    assert_eq!(err.kind(), ErrorKind::AlreadyResolved);

    let request = services.requests.get_request(request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Closed);

    let loan = services.loans.get_by_id(decision.loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.start_date, Some(today()));
    assert_eq!(loan.approver_id, Some(approver));

    let device = services.devices.get_by_id(loan.device_id).await.unwrap();
    assert_eq!(device.status, DeviceStatus::Planned);

    let decisions = store.decisions.get_all().await.unwrap();
    assert_eq!(decisions, vec![decision]);
    assert_eq!(decisions[0].status, DecisionStatus::Approved);
}

//! Loans repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, StoreResultExt},
    models::{Loan, LoanStatus},
    store::{EntityStore, LoanStore},
};

#[derive(Debug, FromRow)]
struct LoanRow {
    id: i32,
    status: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    request_id: Option<i32>,
    borrower_id: i32,
    approver_id: Option<i32>,
    device_id: i32,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> AppResult<Self> {
        Ok(Loan {
            id: row.id,
            status: row.status.parse()?,
            start_date: row.start_date,
            end_date: row.end_date,
            request_id: row.request_id,
            borrower_id: row.borrower_id,
            approver_id: row.approver_id,
            device_id: row.device_id,
        })
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Loan> for LoansRepository {
    async fn add(&self, loan: &Loan) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO loans (status, start_date, end_date, request_id, borrower_id, approver_id, device_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(loan.status.as_str())
        .bind(loan.start_date)
        .bind(loan.end_date)
        .bind(loan.request_id)
        .bind(loan.borrower_id)
        .bind(loan.approver_id)
        .bind(loan.device_id)
        .fetch_one(&self.pool)
        .await
        .store_context("inserting loan")
    }

    async fn update(&self, loan: &Loan) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = $1, start_date = $2, end_date = $3, request_id = $4,
                borrower_id = $5, approver_id = $6, device_id = $7
            WHERE id = $8
            "#,
        )
        .bind(loan.status.as_str())
        .bind(loan.start_date)
        .bind(loan.end_date)
        .bind(loan.request_id)
        .bind(loan.borrower_id)
        .bind(loan.approver_id)
        .bind(loan.device_id)
        .bind(loan.id)
        .execute(&self.pool)
        .await
        .store_context("updating loan")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .store_context("deleting loan")?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Loan>> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .store_context("listing loans")?
            .into_iter()
            .map(Loan::try_from)
            .collect()
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .store_context("loading loan")?
            .map(Loan::try_from)
            .transpose()
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn activate_if_unstarted(&self, loan: &Loan) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = $1, start_date = $2, end_date = $3, approver_id = $4, device_id = $5
            WHERE id = $6 AND status = $7 AND start_date IS NULL
            "#,
        )
        .bind(loan.status.as_str())
        .bind(loan.start_date)
        .bind(loan.end_date)
        .bind(loan.approver_id)
        .bind(loan.device_id)
        .bind(loan.id)
        .bind(LoanStatus::Inactive.as_str())
        .execute(&self.pool)
        .await
        .store_context("activating loan")?;
        Ok(result.rows_affected())
    }
}

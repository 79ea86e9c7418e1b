//! Requests repository

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, StoreResultExt},
    models::{Request, RequestStatus},
    store::{EntityStore, RequestStore},
};

#[derive(Debug, FromRow)]
struct RequestRow {
    id: i32,
    submission_date: NaiveDate,
    needed_by: NaiveDate,
    justification: String,
    status: String,
}

impl TryFrom<RequestRow> for Request {
    type Error = AppError;

    fn try_from(row: RequestRow) -> AppResult<Self> {
        Ok(Request {
            id: row.id,
            submission_date: row.submission_date,
            needed_by: row.needed_by,
            justification: row.justification,
            status: row.status.parse()?,
        })
    }
}

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Request> for RequestsRepository {
    async fn add(&self, request: &Request) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO requests (submission_date, needed_by, justification, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request.submission_date)
        .bind(request.needed_by)
        .bind(&request.justification)
        .bind(request.status.as_str())
        .fetch_one(&self.pool)
        .await
        .store_context("inserting request")
    }

    async fn update(&self, request: &Request) -> AppResult<u64> {
        // Closed requests are immutable
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET submission_date = $1, needed_by = $2, justification = $3, status = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(request.submission_date)
        .bind(request.needed_by)
        .bind(&request.justification)
        .bind(request.status.as_str())
        .bind(request.id)
        .bind(RequestStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .store_context("updating request")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .store_context("deleting request")?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Request {} not found", id)));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Request>> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM requests ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .store_context("listing requests")?
            .into_iter()
            .map(Request::try_from)
            .collect()
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Request>> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .store_context("loading request")?
            .map(Request::try_from)
            .transpose()
    }
}

#[async_trait]
impl RequestStore for RequestsRepository {
    async fn close_if_pending(&self, id: i32) -> AppResult<u64> {
        let result = sqlx::query("UPDATE requests SET status = $1 WHERE id = $2 AND status = $3")
            .bind(RequestStatus::Closed.as_str())
            .bind(id)
            .bind(RequestStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .store_context("closing request")?;
        Ok(result.rows_affected())
    }
}

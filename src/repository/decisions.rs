//! Decisions repository

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, StoreResultExt},
    models::Decision,
    store::EntityStore,
};

#[derive(Debug, FromRow)]
struct DecisionRow {
    id: i32,
    status: String,
    decision_date: NaiveDate,
    comment: String,
    loan_id: i32,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = AppError;

    fn try_from(row: DecisionRow) -> AppResult<Self> {
        Ok(Decision {
            id: row.id,
            status: row.status.parse()?,
            decision_date: row.decision_date,
            comment: row.comment,
            loan_id: row.loan_id,
        })
    }
}

#[derive(Clone)]
pub struct DecisionsRepository {
    pool: Pool<Postgres>,
}

impl DecisionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Decision> for DecisionsRepository {
    async fn add(&self, decision: &Decision) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO decisions (status, decision_date, comment, loan_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(decision.status.as_str())
        .bind(decision.decision_date)
        .bind(&decision.comment)
        .bind(decision.loan_id)
        .fetch_one(&self.pool)
        .await
        .store_context("inserting decision")
    }

    async fn update(&self, decision: &Decision) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE decisions SET status = $1, decision_date = $2, comment = $3, loan_id = $4 WHERE id = $5",
        )
        .bind(decision.status.as_str())
        .bind(decision.decision_date)
        .bind(&decision.comment)
        .bind(decision.loan_id)
        .bind(decision.id)
        .execute(&self.pool)
        .await
        .store_context("updating decision")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM decisions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .store_context("deleting decision")?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Decision {} not found", id)));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Decision>> {
        sqlx::query_as::<_, DecisionRow>("SELECT * FROM decisions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .store_context("listing decisions")?
            .into_iter()
            .map(Decision::try_from)
            .collect()
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Decision>> {
        sqlx::query_as::<_, DecisionRow>("SELECT * FROM decisions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .store_context("loading decision")?
            .map(Decision::try_from)
            .transpose()
    }
}

//! Employees repository

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, StoreResultExt},
    models::Employee,
    store::{EmployeeStore, EntityStore},
};

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: i32,
    first_name: String,
    last_name: String,
    email: String,
    department_id: i32,
    role_id: i32,
    termination_date: Option<NaiveDate>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            department_id: row.department_id,
            role_id: row.role_id,
            termination_date: row.termination_date,
        }
    }
}

#[derive(Clone)]
pub struct EmployeesRepository {
    pool: Pool<Postgres>,
}

impl EmployeesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Employee> for EmployeesRepository {
    async fn add(&self, employee: &Employee) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO employees (first_name, last_name, email, department_id, role_id, termination_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(employee.department_id)
        .bind(employee.role_id)
        .bind(employee.termination_date)
        .fetch_one(&self.pool)
        .await
        .store_context("inserting employee")
    }

    async fn update(&self, employee: &Employee) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE employees
            SET first_name = $1, last_name = $2, email = $3,
                department_id = $4, role_id = $5, termination_date = $6
            WHERE id = $7
            "#,
        )
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(employee.department_id)
        .bind(employee.role_id)
        .bind(employee.termination_date)
        .bind(employee.id)
        .execute(&self.pool)
        .await
        .store_context("updating employee")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .store_context("deleting employee")?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Employee {} not found", id)));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees ORDER BY last_name, first_name")
            .fetch_all(&self.pool)
            .await
            .store_context("listing employees")?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .store_context("loading employee")?;
        Ok(row.map(Employee::from))
    }
}

#[async_trait]
impl EmployeeStore for EmployeesRepository {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .store_context("looking up employee by email")?;
        Ok(row.map(Employee::from))
    }
}

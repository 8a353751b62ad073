use anyhow::{Context, Result};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};

use crate::domain::{Cents, Customer, CustomerId, CustomerProfile, Transaction, TransactionId};

use super::statements::{self, row_to_customer, CUSTOMER_COLUMNS};
use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying customers and their transactions.
///
/// Single statements run straight on the pool. Anything that must pair a
/// transaction write with a balance write goes through [`Repository::begin`]
/// and the functions in [`statements`].
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a database transaction.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin database transaction")
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire connection")
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Customer operations
    // ========================

    /// Save a new customer.
    pub async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, mobile, place, outstanding_balance, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(&customer.mobile)
        .bind(&customer.place)
        .bind(customer.outstanding_balance)
        .bind(customer.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let mut conn = self.acquire().await?;
        statements::fetch_customer(&mut conn, id).await
    }

    /// List customers ordered by name, optionally keeping only names that
    /// contain `search` (case-insensitive).
    pub async fn list_customers(&self, search: Option<&str>) -> Result<Vec<Customer>> {
        let mut conn = self.acquire().await?;
        statements::fetch_customers(&mut conn, search).await
    }

    /// Overwrite name, mobile and place in one statement and return the
    /// stored row, or `None` when the customer does not exist.
    pub async fn update_customer_profile(
        &self,
        id: CustomerId,
        profile: &CustomerProfile,
    ) -> Result<Option<Customer>> {
        let query = format!(
            "UPDATE customers SET name = ?, mobile = ?, place = ? WHERE id = ? RETURNING {}",
            CUSTOMER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&profile.name)
            .bind(&profile.mobile)
            .bind(&profile.place)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update customer")?;

        row.as_ref().map(row_to_customer).transpose()
    }

    /// Customer count and the sum of all cached balances.
    pub async fn total_outstanding(&self) -> Result<(i64, Cents)> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count, COALESCE(SUM(outstanding_balance), 0) as total FROM customers",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum outstanding balances")?;

        Ok((row.get("count"), row.get("total")))
    }

    // ========================
    // Transaction operations
    // ========================

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let mut conn = self.acquire().await?;
        statements::fetch_transaction(&mut conn, id).await
    }

    /// List every transaction in insertion order.
    pub async fn list_all_transactions(&self) -> Result<Vec<Transaction>> {
        let mut conn = self.acquire().await?;
        statements::fetch_all_transactions(&mut conn).await
    }
}

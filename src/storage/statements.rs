//! Statements that run on a single connection, normally inside an open
//! database transaction. Grouping them here keeps every paired write
//! (transaction row + balance delta) on the same connection so they commit
//! or roll back together.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::domain::{
    Cents, Customer, CustomerId, Transaction, TransactionId, TransactionType, TransactionValues,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const CUSTOMER_COLUMNS: &str =
    "id, name, mobile, place, outstanding_balance, created_at";

pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, customer_id, sequence, date, type, amount_cents, description, recorded_at";

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub transaction_count: i64,
    pub orphaned_transactions: i64,
    pub invalid_amounts: i64,
}

/// Take the database write lock on behalf of `customer_id`.
///
/// SQLite has no `SELECT ... FOR UPDATE`; a no-op write makes the connection
/// acquire the write lock before any read, so concurrent writers wait on the
/// busy timeout instead of failing a lock upgrade. Returns whether the
/// customer exists.
pub async fn lock_customer(conn: &mut SqliteConnection, customer_id: CustomerId) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE customers SET outstanding_balance = outstanding_balance WHERE id = ?",
    )
    .bind(customer_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to lock customer")?;

    Ok(result.rows_affected() == 1)
}

/// Add `delta` to the customer's balance relative to its current value.
pub async fn adjust_balance(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    delta: Cents,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE customers SET outstanding_balance = outstanding_balance + ? WHERE id = ?",
    )
    .bind(delta)
    .bind(customer_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to adjust customer balance")?;

    if result.rows_affected() != 1 {
        bail!("Balance adjustment matched no customer: {}", customer_id);
    }
    Ok(())
}

pub async fn fetch_customer(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<Option<Customer>> {
    let query = format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS);
    let row = sqlx::query(&query)
        .bind(customer_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch customer")?;

    row.as_ref().map(row_to_customer).transpose()
}

/// Get the next sequence number and increment the counter.
pub async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query(
        r#"
        UPDATE sequence_counter
        SET value = value + 1
        WHERE name = 'transaction_sequence'
        RETURNING value
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to get next sequence number")?;

    Ok(row.get("value"))
}

/// Insert a transaction row, assigning its sequence number.
pub async fn insert_transaction(conn: &mut SqliteConnection, txn: &mut Transaction) -> Result<()> {
    txn.sequence = next_sequence(conn).await?;

    sqlx::query(
        r#"
        INSERT INTO transactions (id, customer_id, sequence, date, type, amount_cents, description, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(txn.id.to_string())
    .bind(txn.customer_id.to_string())
    .bind(txn.sequence)
    .bind(txn.date.format(DATE_FORMAT).to_string())
    .bind(txn.kind.as_str())
    .bind(txn.amount_cents)
    .bind(&txn.description)
    .bind(txn.recorded_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to insert transaction")?;

    Ok(())
}

pub async fn fetch_transaction(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
) -> Result<Option<Transaction>> {
    let query = format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS);
    let row = sqlx::query(&query)
        .bind(transaction_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

/// Overwrite the editable fields of a transaction. Ownership never changes.
pub async fn overwrite_transaction(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
    values: &TransactionValues,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET date = ?, type = ?, amount_cents = ?, description = ?
        WHERE id = ?
        "#,
    )
    .bind(values.date.format(DATE_FORMAT).to_string())
    .bind(values.kind.as_str())
    .bind(values.amount_cents)
    .bind(&values.description)
    .bind(transaction_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to update transaction")?;

    if result.rows_affected() != 1 {
        bail!("Transaction vanished during update: {}", transaction_id);
    }
    Ok(())
}

pub async fn remove_transaction(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
) -> Result<()> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(transaction_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete transaction")?;

    if result.rows_affected() != 1 {
        bail!("Transaction vanished during delete: {}", transaction_id);
    }
    Ok(())
}

/// Delete every transaction owned by a customer. Returns how many were removed.
pub async fn remove_customer_transactions(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM transactions WHERE customer_id = ?")
        .bind(customer_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete customer transactions")?;

    Ok(result.rows_affected())
}

/// Delete the customer row. Returns whether a row was removed.
pub async fn remove_customer(conn: &mut SqliteConnection, customer_id: CustomerId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM customers WHERE id = ?")
        .bind(customer_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete customer")?;

    Ok(result.rows_affected() == 1)
}

/// A customer's history, newest date first. Entries sharing a date keep
/// their insertion order.
pub async fn fetch_history(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<Vec<Transaction>> {
    let query = format!(
        "SELECT {} FROM transactions WHERE customer_id = ? ORDER BY date DESC, sequence ASC",
        TRANSACTION_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(customer_id.to_string())
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch transaction history")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Customers ordered by name, optionally keeping only names that contain
/// `search` (case-insensitive).
pub async fn fetch_customers(
    conn: &mut SqliteConnection,
    search: Option<&str>,
) -> Result<Vec<Customer>> {
    let mut query = format!("SELECT {} FROM customers", CUSTOMER_COLUMNS);
    if search.is_some() {
        query.push_str(" WHERE instr(lower(name), lower(?)) > 0");
    }
    query.push_str(" ORDER BY name, id");

    let mut sql_query = sqlx::query(&query);
    if let Some(term) = search {
        sql_query = sql_query.bind(term);
    }

    let rows = sql_query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list customers")?;

    rows.iter().map(row_to_customer).collect()
}

/// Every transaction in insertion order.
pub async fn fetch_all_transactions(conn: &mut SqliteConnection) -> Result<Vec<Transaction>> {
    let query = format!(
        "SELECT {} FROM transactions ORDER BY sequence",
        TRANSACTION_COLUMNS
    );
    let rows = sqlx::query(&query)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Recompute balances for all customers from their transactions in a
/// single query. Customers without transactions are absent from the map.
pub async fn sum_balances(conn: &mut SqliteConnection) -> Result<HashMap<CustomerId, Cents>> {
    let rows = sqlx::query(
        r#"
        SELECT
            customer_id,
            SUM(CASE WHEN type = 'credit' THEN amount_cents ELSE -amount_cents END) as balance
        FROM transactions
        GROUP BY customer_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .context("Failed to compute all balances")?;

    let mut balances = HashMap::new();
    for row in rows {
        let customer_id_str: String = row.get("customer_id");
        let balance: Cents = row.get("balance");
        let customer_id = Uuid::parse_str(&customer_id_str).context("Invalid customer ID")?;
        balances.insert(customer_id, balance);
    }

    Ok(balances)
}

pub async fn fetch_integrity_stats(conn: &mut SqliteConnection) -> Result<IntegrityStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) as transaction_count,
            COALESCE(SUM(NOT EXISTS (SELECT 1 FROM customers c WHERE c.id = t.customer_id)), 0)
                as orphaned_transactions,
            COALESCE(SUM(t.amount_cents <= 0), 0) as invalid_amounts
        FROM transactions t
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to gather integrity statistics")?;

    Ok(IntegrityStats {
        transaction_count: row.get("transaction_count"),
        orphaned_transactions: row.get("orphaned_transactions"),
        invalid_amounts: row.get("invalid_amounts"),
    })
}

pub(crate) fn row_to_customer(row: &SqliteRow) -> Result<Customer> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(Customer {
        id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
        name: row.get("name"),
        mobile: row.get("mobile"),
        place: row.get("place"),
        outstanding_balance: row.get("outstanding_balance"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}

pub(crate) fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let id_str: String = row.get("id");
    let customer_str: String = row.get("customer_id");
    let date_str: String = row.get("date");
    let type_str: String = row.get("type");
    let recorded_at_str: String = row.get("recorded_at");

    Ok(Transaction {
        id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
        customer_id: Uuid::parse_str(&customer_str).context("Invalid customer ID")?,
        sequence: row.get("sequence"),
        date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).context("Invalid date")?,
        kind: TransactionType::from_str(&type_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
        amount_cents: row.get("amount_cents"),
        description: row.get("description"),
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
            .context("Invalid recorded_at timestamp")?
            .with_timezone(&Utc),
    })
}

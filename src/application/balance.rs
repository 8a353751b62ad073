//! Balance maintenance.
//!
//! Every function here runs on the connection of one open database
//! transaction and writes a transaction row together with the matching
//! change to the owner's `outstanding_balance`. Callers hand the result to
//! [`finish`], which commits on success and rolls back on any error, so the
//! cached balance always equals the signed sum of the customer's history.

use anyhow::Context;
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, warn};

use crate::domain::{
    removal_delta, update_delta, Cents, Customer, CustomerId, Transaction, TransactionId,
    TransactionPatch, TransactionValues,
};
use crate::storage::{
    adjust_balance, fetch_customer, fetch_transaction, insert_transaction, lock_customer,
    overwrite_transaction, remove_customer, remove_customer_transactions, remove_transaction,
};

use super::{AppError, ErrorKind};

/// Outcome of an applied transaction edit.
#[derive(Debug, Clone)]
pub struct TransactionUpdate {
    pub transaction: Transaction,
    pub previous: TransactionValues,
    /// Change applied to the customer's balance
    pub delta: Cents,
}

/// Outcome of a customer deletion.
#[derive(Debug, Clone)]
pub struct DeletedCustomer {
    pub customer: Customer,
    pub removed_transactions: u64,
}

/// Commit the unit of work if `result` is Ok, roll it back otherwise.
pub(crate) async fn finish<T>(
    tx: sqlx::Transaction<'_, Sqlite>,
    operation: &str,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .with_context(|| format!("Failed to commit {}", operation))?;
            Ok(value)
        }
        Err(err) => {
            tx.rollback()
                .await
                .with_context(|| format!("Failed to roll back {}", operation))?;
            if err.kind() == ErrorKind::Storage {
                warn!(operation, error = %err, "rolled back");
            } else {
                debug!(operation, error = %err, "rejected");
            }
            Err(err)
        }
    }
}

/// Insert `txn` and add its signed amount to the owner's balance.
pub(crate) async fn apply_add(
    conn: &mut SqliteConnection,
    mut txn: Transaction,
) -> Result<Transaction, AppError> {
    if !lock_customer(conn, txn.customer_id).await? {
        return Err(AppError::CustomerNotFound(txn.customer_id));
    }

    insert_transaction(conn, &mut txn).await?;
    adjust_balance(conn, txn.customer_id, txn.signed_amount()).await?;

    debug!(
        customer = %txn.customer_id,
        transaction = %txn.id,
        delta = txn.signed_amount(),
        "transaction added"
    );
    Ok(txn)
}

/// Replace a transaction's values and move the balance by the difference
/// between the new and the old signed amounts.
pub(crate) async fn apply_update(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    transaction_id: TransactionId,
    values: TransactionValues,
) -> Result<TransactionUpdate, AppError> {
    let txn = owned_transaction(conn, customer_id, transaction_id).await?;
    rewrite(conn, txn, values).await
}

/// Merge `patch` over the stored values and apply the result, reading and
/// writing under the same lock.
pub(crate) async fn apply_patch(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    transaction_id: TransactionId,
    patch: TransactionPatch,
) -> Result<TransactionUpdate, AppError> {
    let txn = owned_transaction(conn, customer_id, transaction_id).await?;
    let values = patch.merge(txn.values());
    rewrite(conn, txn, values).await
}

async fn rewrite(
    conn: &mut SqliteConnection,
    mut txn: Transaction,
    values: TransactionValues,
) -> Result<TransactionUpdate, AppError> {
    let customer_id = txn.customer_id;
    let transaction_id = txn.id;
    let previous = txn.values();
    let delta = update_delta(&previous, &values)
        .ok_or_else(|| AppError::InvalidAmount("Balance change out of range".to_string()))?;

    overwrite_transaction(conn, transaction_id, &values).await?;
    if delta != 0 {
        adjust_balance(conn, customer_id, delta).await?;
    }
    txn.apply(values);

    debug!(customer = %customer_id, transaction = %transaction_id, delta, "transaction updated");
    Ok(TransactionUpdate {
        transaction: txn,
        previous,
        delta,
    })
}

/// Remove a transaction and take its signed amount back out of the balance.
pub(crate) async fn apply_delete(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    transaction_id: TransactionId,
) -> Result<Transaction, AppError> {
    let txn = owned_transaction(conn, customer_id, transaction_id).await?;

    remove_transaction(conn, transaction_id).await?;
    adjust_balance(conn, customer_id, removal_delta(&txn)).await?;

    debug!(
        customer = %customer_id,
        transaction = %transaction_id,
        delta = removal_delta(&txn),
        "transaction deleted"
    );
    Ok(txn)
}

/// Remove a customer together with its whole history.
pub(crate) async fn apply_customer_delete(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<DeletedCustomer, AppError> {
    if !lock_customer(conn, customer_id).await? {
        return Err(AppError::CustomerNotFound(customer_id));
    }
    let customer = fetch_customer(conn, customer_id)
        .await?
        .ok_or(AppError::CustomerNotFound(customer_id))?;

    let removed_transactions = remove_customer_transactions(conn, customer_id).await?;
    if !remove_customer(conn, customer_id).await? {
        return Err(AppError::CustomerNotFound(customer_id));
    }

    Ok(DeletedCustomer {
        customer,
        removed_transactions,
    })
}

/// Lock the requested customer and load the transaction, rejecting it
/// unless that customer owns it.
async fn owned_transaction(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    transaction_id: TransactionId,
) -> Result<Transaction, AppError> {
    let customer_exists = lock_customer(conn, customer_id).await?;

    let txn = fetch_transaction(conn, transaction_id)
        .await?
        .ok_or(AppError::TransactionNotFound(transaction_id))?;

    if !customer_exists || txn.customer_id != customer_id {
        return Err(AppError::OwnershipMismatch {
            transaction_id,
            customer_id,
        });
    }
    Ok(txn)
}

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::domain::{
    build_integrity_report, Cents, Customer, CustomerId, CustomerProfile, IntegrityReport,
    Transaction, TransactionId, TransactionPatch, TransactionType, TransactionValues,
};
use crate::storage::{
    fetch_all_transactions, fetch_customer, fetch_customers, fetch_history,
    fetch_integrity_stats, sum_balances, Repository,
};

use super::balance::{self, finish, DeletedCustomer, TransactionUpdate};
use super::error::is_duplicate_mobile;
use super::{input, AppError};

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, HTTP, TUI, etc.).
pub struct LedgerService {
    repo: Repository,
}

/// A customer together with its full transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    /// Newest date first; same-date entries in insertion order
    pub transactions: Vec<Transaction>,
}

/// Every customer and every transaction, read from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerContents {
    pub customers: Vec<Customer>,
    /// Insertion order
    pub transactions: Vec<Transaction>,
}

/// Totals across every customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub customer_count: i64,
    pub total_outstanding: Cents,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Release the underlying connections.
    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Customer operations
    // ========================

    /// Create a customer with a zero balance.
    pub async fn create_customer(&self, profile: CustomerProfile) -> Result<Customer, AppError> {
        let profile = input::validate_profile(profile)?;

        let mut customer = Customer::new(profile.name, profile.mobile);
        customer.place = profile.place;

        self.repo
            .save_customer(&customer)
            .await
            .map_err(|err| duplicate_or_storage(err, &customer.mobile))?;

        info!(customer = %customer.id, name = %customer.name, "customer created");
        Ok(customer)
    }

    /// List customers with their cached balances, ordered by name.
    /// `search` keeps only names containing it, ignoring case.
    pub async fn list_customers(&self, search: Option<&str>) -> Result<Vec<Customer>, AppError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.repo.list_customers(search).await?)
    }

    /// Get a customer and its history, read from one consistent snapshot.
    pub async fn get_customer(&self, id: CustomerId) -> Result<CustomerDetail, AppError> {
        let mut tx = self.repo.begin().await?;
        let result = read_detail(&mut tx, id).await;
        finish(tx, "get customer", result).await
    }

    /// Edit name, mobile and place. The balance is untouched.
    pub async fn update_customer_profile(
        &self,
        id: CustomerId,
        profile: CustomerProfile,
    ) -> Result<Customer, AppError> {
        let profile = input::validate_profile(profile)?;

        self.repo
            .update_customer_profile(id, &profile)
            .await
            .map_err(|err| duplicate_or_storage(err, &profile.mobile))?
            .ok_or(AppError::CustomerNotFound(id))
    }

    /// Delete a customer and every transaction it owns, as one unit.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<DeletedCustomer, AppError> {
        let mut tx = self.repo.begin().await?;
        let result = balance::apply_customer_delete(&mut tx, id).await;
        let deleted = finish(tx, "delete customer", result).await?;

        info!(
            customer = %id,
            removed_transactions = deleted.removed_transactions,
            "customer deleted"
        );
        Ok(deleted)
    }

    /// Customer count and the sum of every outstanding balance.
    pub async fn summary(&self) -> Result<LedgerSummary, AppError> {
        let (customer_count, total_outstanding) = self.repo.total_outstanding().await?;
        Ok(LedgerSummary {
            customer_count,
            total_outstanding,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a credit or payment and apply it to the customer's balance.
    /// A missing date means today; descriptions are trimmed.
    pub async fn add_transaction(
        &self,
        customer_id: CustomerId,
        date: Option<NaiveDate>,
        kind: TransactionType,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        input::validate_amount(amount_cents)?;

        let mut txn = Transaction::new(
            customer_id,
            date.unwrap_or_else(input::today),
            kind,
            amount_cents,
        );
        txn.description = input::normalize_description(description);

        let mut tx = self.repo.begin().await?;
        let result = balance::apply_add(&mut tx, txn).await;
        finish(tx, "add transaction", result).await
    }

    /// Get one transaction, checking it belongs to `customer_id`.
    pub async fn get_transaction(
        &self,
        customer_id: CustomerId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let txn = self
            .repo
            .get_transaction(transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound(transaction_id))?;

        if txn.customer_id != customer_id {
            return Err(AppError::OwnershipMismatch {
                transaction_id,
                customer_id,
            });
        }
        Ok(txn)
    }

    /// Replace a transaction's values; the balance moves by the difference.
    pub async fn update_transaction(
        &self,
        customer_id: CustomerId,
        transaction_id: TransactionId,
        values: TransactionValues,
    ) -> Result<TransactionUpdate, AppError> {
        input::validate_amount(values.amount_cents)?;
        let values = TransactionValues {
            date: values.date,
            kind: values.kind,
            amount_cents: values.amount_cents,
            description: input::normalize_description(values.description),
        };

        let mut tx = self.repo.begin().await?;
        let result = balance::apply_update(&mut tx, customer_id, transaction_id, values).await;
        finish(tx, "update transaction", result).await
    }

    /// Change only the fields set in `patch`. The stored values are read and
    /// rewritten in the same unit of work, so a concurrent edit is never
    /// silently overwritten with stale fields.
    pub async fn patch_transaction(
        &self,
        customer_id: CustomerId,
        transaction_id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<TransactionUpdate, AppError> {
        if let Some(amount_cents) = patch.amount_cents {
            input::validate_amount(amount_cents)?;
        }
        let patch = TransactionPatch {
            description: input::normalize_description(patch.description),
            ..patch
        };

        let mut tx = self.repo.begin().await?;
        let result = balance::apply_patch(&mut tx, customer_id, transaction_id, patch).await;
        finish(tx, "patch transaction", result).await
    }

    /// Delete a transaction and reverse its effect on the balance.
    pub async fn delete_transaction(
        &self,
        customer_id: CustomerId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let mut tx = self.repo.begin().await?;
        let result = balance::apply_delete(&mut tx, customer_id, transaction_id).await;
        finish(tx, "delete transaction", result).await
    }

    /// Every transaction in insertion order.
    pub async fn list_all_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_all_transactions().await?)
    }

    /// All customers and all transactions as of one instant, so each cached
    /// balance matches the transactions returned with it.
    pub async fn read_ledger(&self) -> Result<LedgerContents, AppError> {
        let mut tx = self.repo.begin().await?;
        let result = read_contents(&mut tx).await;
        finish(tx, "read ledger", result).await
    }

    // ========================
    // Integrity operations
    // ========================

    /// Recompute every balance from history and compare with the cache.
    /// All reads share one snapshot, so a concurrent write never shows up
    /// as a mismatch.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let mut tx = self.repo.begin().await?;
        let result = read_integrity(&mut tx).await;
        finish(tx, "check integrity", result).await
    }
}

async fn read_integrity(conn: &mut SqliteConnection) -> Result<IntegrityReport, AppError> {
    let stats = fetch_integrity_stats(conn).await?;
    let customers = fetch_customers(conn, None).await?;
    let balances = sum_balances(conn).await?;

    Ok(build_integrity_report(
        &customers,
        &balances,
        stats.transaction_count,
        stats.orphaned_transactions,
        stats.invalid_amounts,
    ))
}

async fn read_contents(conn: &mut SqliteConnection) -> Result<LedgerContents, AppError> {
    let customers = fetch_customers(conn, None).await?;
    let transactions = fetch_all_transactions(conn).await?;
    Ok(LedgerContents {
        customers,
        transactions,
    })
}

async fn read_detail(conn: &mut SqliteConnection, id: CustomerId) -> Result<CustomerDetail, AppError> {
    let customer = fetch_customer(conn, id)
        .await?
        .ok_or(AppError::CustomerNotFound(id))?;
    let transactions = fetch_history(conn, id).await?;
    Ok(CustomerDetail {
        customer,
        transactions,
    })
}

fn duplicate_or_storage(err: anyhow::Error, mobile: &str) -> AppError {
    if is_duplicate_mobile(&err) {
        AppError::DuplicateMobile(mobile.to_string())
    } else {
        AppError::Database(err)
    }
}

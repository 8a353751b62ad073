// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tally::application::LedgerService;
use tally::domain::{
    compute_balance, Cents, Customer, CustomerId, CustomerProfile, Transaction, TransactionType,
};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Create a customer with just a name and mobile number
pub async fn create_customer(
    service: &LedgerService,
    name: &str,
    mobile: &str,
) -> Result<Customer> {
    Ok(service
        .create_customer(CustomerProfile::new(name, mobile))
        .await?)
}

/// Record a credit dated `date`
pub async fn credit(
    service: &LedgerService,
    customer_id: CustomerId,
    amount: Cents,
    date: &str,
) -> Result<Transaction> {
    Ok(service
        .add_transaction(
            customer_id,
            Some(parse_date(date)),
            TransactionType::Credit,
            amount,
            None,
        )
        .await?)
}

/// Record a payment dated `date`
pub async fn payment(
    service: &LedgerService,
    customer_id: CustomerId,
    amount: Cents,
    date: &str,
) -> Result<Transaction> {
    Ok(service
        .add_transaction(
            customer_id,
            Some(parse_date(date)),
            TransactionType::Payment,
            amount,
            None,
        )
        .await?)
}

/// Current cached balance of a customer
pub async fn balance_of(service: &LedgerService, customer_id: CustomerId) -> Result<Cents> {
    Ok(service
        .get_customer(customer_id)
        .await?
        .customer
        .outstanding_balance)
}

/// Assert the cached balance equals the signed sum of the history
pub async fn assert_consistent(service: &LedgerService, customer_id: CustomerId) -> Result<()> {
    let detail = service.get_customer(customer_id).await?;
    assert_eq!(
        detail.customer.outstanding_balance,
        compute_balance(&detail.transactions),
        "cached balance diverged from history for {}",
        detail.customer.name
    );
    Ok(())
}

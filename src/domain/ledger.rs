use std::collections::HashMap;

use serde::Serialize;

use super::{Cents, Customer, CustomerId, Transaction, TransactionValues};

/// Compute a customer's balance from its transactions.
/// Balance = sum of credits - sum of payments
pub fn compute_balance(transactions: &[Transaction]) -> Cents {
    transactions.iter().map(Transaction::signed_amount).sum()
}

/// Balance change caused by replacing `old` with `new` on the same transaction.
/// `None` when the difference does not fit in `Cents`.
pub fn update_delta(old: &TransactionValues, new: &TransactionValues) -> Option<Cents> {
    new.signed_amount().checked_sub(old.signed_amount())
}

/// Balance change caused by deleting a transaction.
pub fn removal_delta(old: &Transaction) -> Cents {
    -old.signed_amount()
}

/// A customer whose cached balance disagrees with its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub cached: Cents,
    pub recomputed: Cents,
}

/// Result of a ledger integrity check.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub customer_count: i64,
    pub transaction_count: i64,
    pub mismatches: Vec<BalanceMismatch>,
    /// Transactions whose customer no longer exists
    pub orphaned_transactions: i64,
    /// Transactions with an amount <= 0
    pub invalid_amounts: i64,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.mismatches.is_empty() && self.orphaned_transactions == 0 && self.invalid_amounts == 0
    }
}

/// Compare every customer's cached balance with the balance recomputed from
/// its transactions. Customers missing from `recomputed` have no history and
/// must sit at zero.
pub fn build_integrity_report(
    customers: &[Customer],
    recomputed: &HashMap<CustomerId, Cents>,
    transaction_count: i64,
    orphaned_transactions: i64,
    invalid_amounts: i64,
) -> IntegrityReport {
    let mismatches = customers
        .iter()
        .filter_map(|customer| {
            let expected = recomputed.get(&customer.id).copied().unwrap_or(0);
            (expected != customer.outstanding_balance).then(|| BalanceMismatch {
                customer_id: customer.id,
                customer_name: customer.name.clone(),
                cached: customer.outstanding_balance,
                recomputed: expected,
            })
        })
        .collect();

    IntegrityReport {
        customer_count: customers.len() as i64,
        transaction_count,
        mismatches,
        orphaned_transactions,
        invalid_amounts,
    }
}

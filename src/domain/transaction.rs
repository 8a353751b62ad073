use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CustomerId};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Goods bought on account - raises what the customer owes
    Credit,
    /// Money received - lowers what the customer owes
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "credit" => Some(TransactionType::Credit),
            "payment" => Some(TransactionType::Payment),
            _ => None,
        }
    }

    /// Apply this type's sign to a positive amount.
    pub fn signed(&self, amount_cents: Cents) -> Cents {
        match self {
            TransactionType::Credit => amount_cents,
            TransactionType::Payment => -amount_cents,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One credit or payment entry in a customer's history.
/// The amount is always positive; direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Owning customer, fixed for the transaction's whole life
    pub customer_id: CustomerId,
    /// Insertion order, assigned by the repository
    pub sequence: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount_cents: Cents,
    pub description: Option<String>,
    /// When the entry was first recorded
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new transaction. Sequence number must be assigned by the repository.
    pub fn new(
        customer_id: CustomerId,
        date: NaiveDate,
        kind: TransactionType,
        amount_cents: Cents,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            customer_id,
            sequence: 0,
            date,
            kind,
            amount_cents,
            description: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Amount with the sign of its type: +amount for credit, -amount for payment.
    pub fn signed_amount(&self) -> Cents {
        self.kind.signed(self.amount_cents)
    }

    pub fn values(&self) -> TransactionValues {
        TransactionValues {
            date: self.date,
            kind: self.kind,
            amount_cents: self.amount_cents,
            description: self.description.clone(),
        }
    }

    pub fn apply(&mut self, values: TransactionValues) {
        self.date = values.date;
        self.kind = values.kind;
        self.amount_cents = values.amount_cents;
        self.description = values.description;
    }
}

/// The editable part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionValues {
    pub date: NaiveDate,
    pub kind: TransactionType,
    pub amount_cents: Cents,
    pub description: Option<String>,
}

impl TransactionValues {
    pub fn new(date: NaiveDate, kind: TransactionType, amount_cents: Cents) -> Self {
        Self {
            date,
            kind,
            amount_cents,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn signed_amount(&self) -> Cents {
        self.kind.signed(self.amount_cents)
    }
}

/// A partial edit: `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub date: Option<NaiveDate>,
    pub kind: Option<TransactionType>,
    pub amount_cents: Option<Cents>,
    pub description: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.kind.is_none()
            && self.amount_cents.is_none()
            && self.description.is_none()
    }

    /// Overlay the patched fields on `current`.
    pub fn merge(self, current: TransactionValues) -> TransactionValues {
        TransactionValues {
            date: self.date.unwrap_or(current.date),
            kind: self.kind.unwrap_or(current.kind),
            amount_cents: self.amount_cents.unwrap_or(current.amount_cents),
            description: self.description.or(current.description),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type CustomerId = Uuid;

/// A customer buying on account.
///
/// `outstanding_balance` is a cache of the signed sum of the customer's
/// transactions. It is never set directly: it starts at zero and only moves
/// together with a transaction write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Unique across all customers
    pub mobile: String,
    pub place: Option<String>,
    pub outstanding_balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, mobile: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mobile: mobile.into(),
            place: None,
            outstanding_balance: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.place = Some(place.into());
        self
    }
}

/// Editable customer fields. The balance is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    pub name: String,
    pub mobile: String,
    pub place: Option<String>,
}

impl CustomerProfile {
    pub fn new(name: impl Into<String>, mobile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mobile: mobile.into(),
            place: None,
        }
    }

    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.place = Some(place.into());
        self
    }

    /// Trim every field and drop a blank place.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            place: self
                .place
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

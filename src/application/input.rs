//! Parsing of loosely typed user input into the canonical types the service
//! accepts. Front ends call these before invoking any ledger operation.

use chrono::{Local, NaiveDate};

use crate::domain::{format_cents, parse_cents, Cents, CustomerProfile, TransactionType, MAX_AMOUNT_CENTS};

use super::AppError;

/// Parse an amount such as "50", "12.5" or "0.99" into strictly positive cents.
pub fn parse_amount(input: &str) -> Result<Cents, AppError> {
    let cents = parse_cents(input).map_err(|e| AppError::InvalidAmount(e.to_string()))?;
    validate_amount(cents)?;
    Ok(cents)
}

/// Amounts carry no sign; direction comes from the transaction type.
pub fn validate_amount(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if amount_cents > MAX_AMOUNT_CENTS {
        return Err(AppError::InvalidAmount(format!(
            "Amount must not exceed {}",
            format_cents(MAX_AMOUNT_CENTS)
        )));
    }
    Ok(())
}

pub fn parse_transaction_type(input: &str) -> Result<TransactionType, AppError> {
    TransactionType::from_str(input).ok_or_else(|| AppError::InvalidType(input.to_string()))
}

/// Parse a calendar date. Anything after the date part of a timestamp
/// ("2024-03-01T18:30:00Z", "2024-03-01 09:00") is discarded.
pub fn parse_date(input: &str) -> Result<NaiveDate, AppError> {
    let trimmed = input.trim();
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        AppError::InvalidInput(format!("Invalid date '{}'. Use YYYY-MM-DD", input))
    })
}

/// Today's date in the server's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Trim free text, treating blank as absent.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Normalize a profile and require a name and a mobile number.
pub fn validate_profile(profile: CustomerProfile) -> Result<CustomerProfile, AppError> {
    let profile = profile.normalized();
    if profile.name.is_empty() {
        return Err(AppError::InvalidInput("Name is required".to_string()));
    }
    if profile.mobile.is_empty() {
        return Err(AppError::InvalidInput("Mobile is required".to_string()));
    }
    Ok(profile)
}

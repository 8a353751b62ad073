use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_cents, Customer, CustomerId, Transaction};
use crate::storage::DATE_FORMAT;

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub customers: Vec<Customer>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for writing ledger data out as CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export every customer with its outstanding balance.
    pub async fn export_customers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let customers = self.service.list_customers(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "mobile", "place", "outstanding_balance"])?;

        for customer in &customers {
            csv_writer.write_record([
                customer.id.to_string(),
                customer.name.clone(),
                customer.mobile.clone(),
                customer.place.clone().unwrap_or_default(),
                format_cents(customer.outstanding_balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(customers.len())
    }

    /// Export one customer's history, newest first.
    pub async fn export_history_csv<W: Write>(
        &self,
        customer_id: CustomerId,
        writer: W,
    ) -> Result<usize> {
        let detail = self.service.get_customer(customer_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "type", "amount", "description"])?;

        for txn in &detail.transactions {
            csv_writer.write_record([
                txn.id.to_string(),
                txn.date.format(DATE_FORMAT).to_string(),
                txn.kind.as_str().to_string(),
                format_cents(txn.amount_cents),
                txn.description.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(detail.transactions.len())
    }

    /// Export the whole ledger as a pretty-printed JSON snapshot.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let contents = self.service.read_ledger().await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            customers: contents.customers,
            transactions: contents.transactions,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writeln!(writer)?;
        writer.flush()?;

        Ok(snapshot)
    }
}

use std::fs::File;
use std::io::{stderr, stdout, BufWriter, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};
use uuid::Uuid;

use crate::application::input::{parse_amount, parse_date, parse_transaction_type};
use crate::application::{AppError, ErrorKind, LedgerService};
use crate::domain::{format_cents, Customer, CustomerProfile, TransactionPatch};
use crate::io::Exporter;
use crate::storage::DATE_FORMAT;

/// Tally - customer credit ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Track what customers owe: credits, payments and running balances")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TALLY_DATABASE", default_value = "tally.db")]
    pub database: String,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level, overrides --verbose
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Credit and payment commands
    #[command(subcommand)]
    Txn(TxnCommands),

    /// Show the number of customers and the total outstanding
    Summary,

    /// Verify every cached balance against its transaction history
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: customers, history, full
        #[arg(value_enum)]
        export_type: ExportType,

        /// Customer ID (required for history)
        #[arg(long)]
        customer: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExportType {
    /// All customers with balances (CSV)
    Customers,
    /// One customer's transactions (CSV)
    History,
    /// Whole ledger (JSON)
    Full,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Create a new customer
    Add {
        /// Customer name
        name: String,

        /// Mobile number (must be unique)
        #[arg(short, long)]
        mobile: String,

        /// Place or address
        #[arg(short, long)]
        place: Option<String>,
    },

    /// List customers with their balances
    List {
        /// Only show names containing this text
        #[arg(short, long)]
        search: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a customer and its transaction history
    Show {
        /// Customer ID
        id: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Edit a customer's name, mobile and place
    Edit {
        /// Customer ID
        id: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        mobile: String,

        #[arg(short, long)]
        place: Option<String>,
    },

    /// Delete a customer and all of its transactions
    Delete {
        /// Customer ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TxnCommands {
    /// Record a credit or a payment
    Add {
        /// Customer ID
        customer: String,

        /// credit or payment
        #[arg(value_name = "TYPE")]
        kind: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Edit a transaction; omitted fields keep their current values
    Edit {
        /// Customer ID
        customer: String,

        /// Transaction ID
        id: String,

        /// credit or payment
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        #[arg(short, long)]
        amount: Option<String>,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a transaction
    Delete {
        /// Customer ID
        customer: String,

        /// Transaction ID
        id: String,
    },
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::WARN,
        }
    }

    pub async fn run(self) -> Result<()> {
        setup_logging(self.log_level());

        let service = match self.command {
            Commands::Init => LedgerService::init(&self.database).await?,
            _ => LedgerService::connect(&self.database).await?,
        };

        let result = dispatch(&service, &self.database, self.command).await;
        service.close().await;

        result.map_err(|err| match err.downcast::<AppError>() {
            Ok(app_err) if app_err.kind() == ErrorKind::Storage => {
                error!(error = ?app_err, "storage failure");
                anyhow::anyhow!(app_err.public_message())
            }
            Ok(app_err) => app_err.into(),
            Err(other) => other,
        })
    }
}

fn setup_logging(level: LevelFilter) {
    // stdout carries command output, logs go to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    let _ = tracing_subscriber::registry().with(terminal_log).try_init();
}

async fn dispatch(service: &LedgerService, database: &str, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Database initialized: {}", database);
        }

        Commands::Customer(cmd) => run_customer_command(service, cmd).await?,

        Commands::Txn(cmd) => run_txn_command(service, cmd).await?,

        Commands::Summary => {
            let summary = service.summary().await?;
            println!("Customers:         {}", summary.customer_count);
            println!("Total outstanding: {}", format_cents(summary.total_outstanding));
        }

        Commands::Check => run_check_command(service).await?,

        Commands::Export {
            export_type,
            customer,
            output,
        } => run_export_command(service, export_type, customer, output).await?,
    }

    Ok(())
}

async fn run_customer_command(service: &LedgerService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            name,
            mobile,
            place,
        } => {
            let mut profile = CustomerProfile::new(name, mobile);
            profile.place = place;
            let customer = service.create_customer(profile).await?;
            println!("Created customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::List { search, json } => {
            let customers = service.list_customers(search.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&customers)?);
            } else {
                print_customer_table(&customers);
            }
        }

        CustomerCommands::Show { id, json } => {
            let id = parse_id(&id, "customer")?;
            let detail = service.get_customer(id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }

            let customer = &detail.customer;
            println!("Customer: {}", customer.name);
            println!("  ID: {}", customer.id);
            println!("  Mobile: {}", customer.mobile);
            if let Some(place) = &customer.place {
                println!("  Place: {}", place);
            }
            println!(
                "  Outstanding: {}",
                format_cents(customer.outstanding_balance)
            );
            println!();

            if detail.transactions.is_empty() {
                println!("No transactions.");
            } else {
                println!(
                    "{:<12} {:<8} {:>12}  {:<30} {}",
                    "DATE", "TYPE", "AMOUNT", "DESCRIPTION", "ID"
                );
                println!("{}", "-".repeat(100));
                for txn in &detail.transactions {
                    println!(
                        "{:<12} {:<8} {:>12}  {:<30} {}",
                        txn.date.format(DATE_FORMAT),
                        txn.kind,
                        format_cents(txn.amount_cents),
                        truncate(txn.description.as_deref().unwrap_or("-"), 30),
                        txn.id
                    );
                }
            }
        }

        CustomerCommands::Edit {
            id,
            name,
            mobile,
            place,
        } => {
            let id = parse_id(&id, "customer")?;
            let mut profile = CustomerProfile::new(name, mobile);
            profile.place = place;
            let customer = service.update_customer_profile(id, profile).await?;
            println!("Updated customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::Delete { id } => {
            let id = parse_id(&id, "customer")?;
            let deleted = service.delete_customer(id).await?;
            println!(
                "Deleted customer: {} ({} transaction(s) removed)",
                deleted.customer.name, deleted.removed_transactions
            );
        }
    }

    Ok(())
}

async fn run_txn_command(service: &LedgerService, cmd: TxnCommands) -> Result<()> {
    match cmd {
        TxnCommands::Add {
            customer,
            kind,
            amount,
            date,
            description,
        } => {
            let customer_id = parse_id(&customer, "customer")?;
            let kind = parse_transaction_type(&kind)?;
            let amount_cents = parse_amount(&amount)?;
            let date = date.as_deref().map(parse_date).transpose()?;

            let txn = service
                .add_transaction(customer_id, date, kind, amount_cents, description)
                .await?;
            println!(
                "Recorded {} of {} on {} ({})",
                txn.kind,
                format_cents(txn.amount_cents),
                txn.date.format(DATE_FORMAT),
                txn.id
            );
        }

        TxnCommands::Edit {
            customer,
            id,
            kind,
            amount,
            date,
            description,
        } => {
            let customer_id = parse_id(&customer, "customer")?;
            let transaction_id = parse_id(&id, "transaction")?;

            // Parse everything before touching the store
            let patch = TransactionPatch {
                date: date.as_deref().map(parse_date).transpose()?,
                kind: kind.as_deref().map(parse_transaction_type).transpose()?,
                amount_cents: amount.as_deref().map(parse_amount).transpose()?,
                description,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to change: pass --type, --amount, --date or --description");
            }

            let update = service
                .patch_transaction(customer_id, transaction_id, patch)
                .await?;
            println!(
                "Updated transaction {}: balance changed by {}",
                update.transaction.id,
                format_cents(update.delta)
            );
        }

        TxnCommands::Delete { customer, id } => {
            let customer_id = parse_id(&customer, "customer")?;
            let transaction_id = parse_id(&id, "transaction")?;
            let txn = service
                .delete_transaction(customer_id, transaction_id)
                .await?;
            println!(
                "Deleted {} of {} from {}",
                txn.kind,
                format_cents(txn.amount_cents),
                txn.date.format(DATE_FORMAT)
            );
        }
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Customers:    {}", report.customer_count);
    println!("Transactions: {}", report.transaction_count);

    for mismatch in &report.mismatches {
        println!(
            "  MISMATCH {} ({}): cached {}, history {}",
            mismatch.customer_name,
            mismatch.customer_id,
            format_cents(mismatch.cached),
            format_cents(mismatch.recomputed)
        );
    }
    if report.orphaned_transactions > 0 {
        println!(
            "  {} transaction(s) reference a missing customer",
            report.orphaned_transactions
        );
    }
    if report.invalid_amounts > 0 {
        println!(
            "  {} transaction(s) have a non-positive amount",
            report.invalid_amounts
        );
    }

    if report.is_healthy() {
        println!("Ledger is consistent.");
        Ok(())
    } else {
        anyhow::bail!("Ledger integrity check failed")
    }
}

async fn run_export_command(
    service: &LedgerService,
    export_type: ExportType,
    customer: Option<String>,
    output: Option<String>,
) -> Result<()> {
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        )),
        None => Box::new(stdout().lock()),
    };
    let exporter = Exporter::new(service);

    let summary = match export_type {
        ExportType::Customers => {
            let count = exporter.export_customers_csv(writer).await?;
            format!("Exported {} customer(s)", count)
        }
        ExportType::History => {
            let customer = customer.context("--customer is required for history export")?;
            let customer_id = parse_id(&customer, "customer")?;
            let count = exporter.export_history_csv(customer_id, writer).await?;
            format!("Exported {} transaction(s)", count)
        }
        ExportType::Full => {
            let snapshot = exporter.export_full_json(writer).await?;
            format!(
                "Exported {} customer(s) and {} transaction(s)",
                snapshot.customers.len(),
                snapshot.transactions.len()
            )
        }
    };

    if output.is_some() {
        eprintln!("{}", summary);
    }
    Ok(())
}

fn print_customer_table(customers: &[Customer]) {
    if customers.is_empty() {
        println!("No customers found.");
        return;
    }

    println!(
        "{:<24} {:<14} {:<16} {:>12}  {}",
        "NAME", "MOBILE", "PLACE", "BALANCE", "ID"
    );
    println!("{}", "-".repeat(106));
    for customer in customers {
        println!(
            "{:<24} {:<14} {:<16} {:>12}  {}",
            truncate(&customer.name, 24),
            truncate(&customer.mobile, 14),
            truncate(customer.place.as_deref().unwrap_or("-"), 16),
            format_cents(customer.outstanding_balance),
            customer.id
        );
    }

    let total: i64 = customers.iter().map(|c| c.outstanding_balance).sum();
    println!("{}", "-".repeat(106));
    println!("{:<56} {:>12}", "TOTAL", format_cents(total));
}

fn parse_id(input: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).map_err(|_| {
        AppError::InvalidInput(format!("Invalid {} ID '{}'", what, input)).into()
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

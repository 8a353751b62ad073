// Application layer - use cases and the atomic units of work behind them

mod balance;
pub mod error;
pub mod input;
mod service;

pub use balance::{DeletedCustomer, TransactionUpdate};
pub use error::*;
pub use service::*;

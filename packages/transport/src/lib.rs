//! Non-blocking UDP transport for KRPC traffic: per-transaction
//! correlation with timeout, source-address filtering, and a background
//! sweep of expired transactions.

mod active_transactions;
mod cidr;
mod errors;
mod socket;
mod transaction;

pub use active_transactions::{ActiveTransactions, DEFAULT_TIMEOUT};
pub use cidr::{Cidr, ExclusionList};
pub use errors::{Error, Result};
pub use socket::{any_v4, IncomingQuery, Transport};
pub use transaction::{TransactionId, TransactionIdGenerator};

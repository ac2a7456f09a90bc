//! Repository implementations, one per table
//!
//! Repositories own the SQL and the row types. State-changing statements
//! carry their precondition in the `WHERE` clause so the check and the
//! write are one atomic statement.

pub mod orders;
pub mod settlements;
pub mod payments;

pub use orders::{OrderRepository, OrderRow};
pub use settlements::{SettlementRepository, SettlementRow};
pub use payments::{PaymentTransactionRepository, PaymentTransactionRow};

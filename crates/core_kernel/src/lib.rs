//! Core Kernel - Foundational types shared by the delivery and payment domains
//!
//! - Money types with precise decimal arithmetic
//! - Business-day handling in the operating timezone
//! - Strongly-typed identifiers
//! - Port vocabulary: errors, conditional write outcomes, health checks

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{DayWindow, TemporalError, Timezone};
pub use identifiers::{human_reference, OrderId, PaymentTransactionId, QueuedActionId, RiderId, SettlementId};
pub use error::CoreError;
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError, WriteOutcome};

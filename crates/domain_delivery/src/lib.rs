//! Order Delivery Domain
//!
//! This crate implements the rider-facing delivery workflow for
//! cash-on-delivery orders, from claim through proof of delivery.
//!
//! # Order Lifecycle
//!
//! ```text
//! pending -> accepted -> picked_up -> delivering -> payment_pending -> payment_confirmed -> completed
//!                                              \-> payment_confirmed (cash)
//! ```
//!
//! `payment_pending -> payment_confirmed` is driven by the reconciliation
//! engine in `domain_payment`; the rider side only ever observes it.

pub mod order;
pub mod workflow;
pub mod ports;
pub mod service;
pub mod proof;
pub mod progress;
pub mod offline;
pub mod summary;
pub mod ledger;
pub mod error;

pub use order::{ContactPoint, NewOrder, Order, OrderStatus, PaymentMethod};
pub use workflow::OrderAction;
pub use ports::{ConditionalOrderUpdate, OrderChanges, OrderPrecondition, OrderQuery, OrderStore, RiderGuard};
pub use service::{DeliveryService, PaymentConfirmation, ProofOfDelivery};
pub use proof::{BlobError, BlobStore, ProofUpload, ProofUploader};
pub use progress::{DeliveryStep, ProgressStore, ProgressTracker};
pub use offline::{MutationIntent, OfflineQueue, QueueStorage, QueuedAction, ReplayReport};
pub use summary::{DailySummary, DeliveryLine};
pub use ledger::{ConfirmationSource, PaymentTransaction};
pub use error::DeliveryError;

//! Payment Reconciliation Domain
//!
//! Receives payment-provider webhooks, which may be duplicated, late or out
//! of order, and applies each exactly once to the obligation it pays for.
//!
//! ```text
//! raw webhook -> Normalizer -> Matcher -> Accumulator -> ObligationStore
//!                (HMAC, shape)  (latest     (idempotency guard,
//!                               pending)    conditional write)
//! ```
//!
//! Obligations are either an order awaiting its COD payment or a rider's
//! daily cash settlement; both implement [`Obligation`].

pub mod obligation;
pub mod event;
pub mod idempotency;
pub mod matcher;
pub mod accumulator;
pub mod ports;
pub mod reconciler;
pub mod initiation;
pub mod error;

pub use obligation::{MatchedObligation, Obligation, ObligationRef, ObligationStatus, OrderObligation, SettlementObligation};
pub use event::{Normalizer, PaymentEvent, SignatureVerifier, SIGNATURE_HEADERS};
pub use idempotency::should_skip;
pub use matcher::ObligationMatcher;
pub use accumulator::{Accumulator, ApplyOutcome, ApplyResult};
pub use ports::{ObligationStore, PaymentWrite, SettlementInit};
pub use reconciler::{ReconcileOutcome, Reconciler, Reconciliation};
pub use initiation::{OrderPaymentStatus, PaymentDesk, SettlementInitiation, SettlementLookup, SettlementStatus};
pub use error::{NormalizationError, PaymentError};

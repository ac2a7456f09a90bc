//! Reconciliation pipeline: normalize -> match -> accumulate

use std::sync::Arc;
use std::time::Instant;

use tracing::{field, info, instrument, warn, Span};

use core_kernel::{Currency, Money, OrderId};
use domain_delivery::OrderStatus;

use crate::accumulator::{Accumulator, ApplyResult};
use crate::error::PaymentError;
use crate::event::{Normalizer, PaymentEvent, SignatureVerifier};
use crate::matcher::ObligationMatcher;
use crate::obligation::MatchedObligation;
use crate::ports::ObligationStore;

/// What happened to one webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No pending obligation; acknowledged without action
    Unattributed,
    Applied(ApplyResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub event: PaymentEvent,
    pub outcome: ReconcileOutcome,
    pub processing_time_ms: u64,
}

/// Webhook reconciliation engine
#[derive(Clone)]
pub struct Reconciler {
    normalizer: Normalizer,
    matcher: ObligationMatcher,
    accumulator: Accumulator,
    store: Arc<dyn ObligationStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObligationStore>, verifier: SignatureVerifier, currency: Currency) -> Self {
        Self {
            normalizer: Normalizer::new(verifier, currency),
            matcher: ObligationMatcher::new(Arc::clone(&store)),
            accumulator: Accumulator::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn signature_verification_enabled(&self) -> bool {
        self.normalizer.verifier().is_enabled()
    }

    /// Handles one raw webhook delivery
    #[instrument(
        name = "webhook",
        skip_all,
        fields(event_id = field::Empty, amount = field::Empty)
    )]
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<Reconciliation, PaymentError> {
        let started = Instant::now();
        let event = self.normalizer.normalize(body, signature)?;
        Span::current()
            .record("event_id", field::display(&event.event_id))
            .record("amount", field::display(&event.amount));

        let candidate = match self.already_applied(&event).await? {
            Some(obligation) => Some(obligation),
            None => self.matcher.find_match().await?,
        };
        let outcome = match candidate {
            Some(obligation) => ReconcileOutcome::Applied(self.accumulator.apply(&obligation, &event).await?),
            None => {
                warn!("no pending order or settlement for payment, needs manual reconciliation");
                ReconcileOutcome::Unattributed
            }
        };

        Ok(Reconciliation {
            event,
            outcome,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// A redelivered event is routed back to the obligation it last mutated,
    /// even once that obligation is no longer pending
    async fn already_applied(&self, event: &PaymentEvent) -> Result<Option<MatchedObligation>, PaymentError> {
        if event.id_generated {
            return Ok(None);
        }
        Ok(self.store.find_by_event_id(&event.event_id).await?)
    }

    /// Applies a synthetic payment to a specific order, bypassing the
    /// matcher. Development aid only.
    #[instrument(skip(self), fields(order_id = %order_id, amount = %amount))]
    pub async fn apply_to_order(&self, order_id: OrderId, amount: Money) -> Result<Reconciliation, PaymentError> {
        let started = Instant::now();
        let obligation = self
            .store
            .order_obligation(order_id)
            .await
            .map_err(PaymentError::from_lookup)?;
        if obligation.order_status != OrderStatus::PaymentPending && !obligation.order_status.is_paid() {
            return Err(PaymentError::validation(format!(
                "order is {}, not awaiting payment",
                obligation.order_status
            )));
        }
        let event = PaymentEvent::synthetic("test", amount);
        let result = self
            .accumulator
            .apply(&MatchedObligation::Order(obligation), &event)
            .await?;
        info!(outcome = ?result.outcome, "test payment applied");

        Ok(Reconciliation {
            event,
            outcome: ReconcileOutcome::Applied(result),
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

//! Deterministic in-memory issuance and payments collaborators.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - Ticket references are derived from the order id: `"tkt:{order_id}"`.
//!   No randomness, no timestamps.
//! - By default every issuance succeeds. Failures are injected
//!   explicitly: `fail_next` queues outcomes that are consumed one per
//!   call, then the issuer reverts to succeeding.
//! - Every call is recorded so scenarios can assert exactly how many
//!   issuance or refund attempts a flow produced.
//!
//! The default collaborator wiring for the daemon and CLI until a real
//! airline issuance client exists, and the scenario-test double.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

use aero_engine::{IssuanceClient, IssuanceError, PaymentsClient};

// ---------------------------------------------------------------------------
// SimIssuer
// ---------------------------------------------------------------------------

/// Scriptable issuance collaborator.
#[derive(Debug, Default)]
pub struct SimIssuer {
    queued_failures: Mutex<VecDeque<IssuanceError>>,
    calls: Mutex<Vec<Uuid>>,
}

impl SimIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next issuance call. Repeated calls queue
    /// repeated failures, consumed in order.
    pub fn fail_next(&self, error: IssuanceError) {
        self.queued_failures
            .lock()
            .expect("issuer mutex poisoned")
            .push_back(error);
    }

    /// Order ids of every issuance call so far, in call order.
    pub fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().expect("issuer mutex poisoned").clone()
    }

    /// The ticket reference this issuer derives for an order.
    pub fn ticket_ref_for(order_id: Uuid) -> String {
        format!("tkt:{order_id}")
    }
}

#[async_trait]
impl IssuanceClient for SimIssuer {
    async fn issue_ticket(&self, order_id: Uuid) -> Result<String, IssuanceError> {
        self.calls
            .lock()
            .expect("issuer mutex poisoned")
            .push(order_id);

        let queued = self
            .queued_failures
            .lock()
            .expect("issuer mutex poisoned")
            .pop_front();

        match queued {
            Some(err) => Err(err),
            None => Ok(Self::ticket_ref_for(order_id)),
        }
    }
}

// ---------------------------------------------------------------------------
// SimPayments
// ---------------------------------------------------------------------------

/// Refund collaborator that always accepts and remembers what it was
/// asked to refund.
#[derive(Debug, Default)]
pub struct SimPayments {
    refunds: Mutex<Vec<Uuid>>,
}

impl SimPayments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order ids with an initiated refund, in call order.
    pub fn refunds(&self) -> Vec<Uuid> {
        self.refunds.lock().expect("payments mutex poisoned").clone()
    }
}

#[async_trait]
impl PaymentsClient for SimPayments {
    async fn initiate_refund(&self, order_id: Uuid) -> anyhow::Result<()> {
        self.refunds
            .lock()
            .expect("payments mutex poisoned")
            .push(order_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

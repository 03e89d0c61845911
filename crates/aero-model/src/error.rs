//! Transition error taxonomy.
//!
//! Every failure mode of a transition attempt, as seen by callers of the
//! state machine service. Issuance-collaborator failures never appear
//! here: they are absorbed into the machine's own vocabulary as a
//! `TICKETING_FAILURE` event before any caller sees them.

use crate::transitions::{OrderEvent, OrderState};
use uuid::Uuid;

/// Why a transition attempt did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// No order with this id exists.
    OrderNotFound(Uuid),
    /// The requested event has no mapping from the order's current state.
    /// A caller logic error; never retried automatically.
    IllegalTransition {
        from: OrderState,
        event: OrderEvent,
    },
    /// The actor is neither an administrator nor the order's owner.
    Forbidden { actor_id: String },
    /// Another actor holds the order's lock. No side effects occurred;
    /// safe to retry immediately or on the next scheduler tick.
    Busy,
    /// Storage-layer failure. The attempt is not committed and the lock
    /// was released; safe to retry later.
    Persistence(String),
}

impl TransitionError {
    /// `true` when retrying the same attempt is safe and may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransitionError::Busy | TransitionError::Persistence(_))
    }
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::OrderNotFound(id) => {
                write!(f, "order not found: {id}")
            }
            TransitionError::IllegalTransition { from, event } => {
                write!(
                    f,
                    "illegal transition: event {event} is not allowed while the order is {from}"
                )
            }
            TransitionError::Forbidden { actor_id } => {
                write!(f, "forbidden: actor {actor_id} may not operate on this order")
            }
            TransitionError::Busy => {
                write!(f, "order is busy: another operation holds its lock; retry")
            }
            TransitionError::Persistence(msg) => {
                write!(f, "persistence failure: {msg}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

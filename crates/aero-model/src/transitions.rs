//! Order states, events, and the legal transition table.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderState
// ---------------------------------------------------------------------------

/// All valid lifecycle states of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Created, awaiting payment. Initial state.
    PendingPayment,
    /// Payment captured; ticket issuance not yet started.
    Paid,
    /// Issuance request handed to the external ticketing collaborator.
    TicketingInProgress,
    /// The last issuance attempt failed; eligible for retry or cancel.
    TicketingFailed,
    /// Ticket issued. **Terminal.**
    Ticketed,
    /// Cancelled by the user, an operator, or a timeout job. **Terminal.**
    Cancelled,
}

/// Every state, in declaration order. Used by exhaustive table tests and
/// by DB check-constraint mirrors.
pub const ALL_STATES: [OrderState; 6] = [
    OrderState::PendingPayment,
    OrderState::Paid,
    OrderState::TicketingInProgress,
    OrderState::TicketingFailed,
    OrderState::Ticketed,
    OrderState::Cancelled,
];

impl OrderState {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ticketed | Self::Cancelled)
    }

    /// The exact text stored in the `orders.state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::PendingPayment => "PENDING_PAYMENT",
            OrderState::Paid => "PAID",
            OrderState::TicketingInProgress => "TICKETING_IN_PROGRESS",
            OrderState::TicketingFailed => "TICKETING_FAILED",
            OrderState::Ticketed => "TICKETED",
            OrderState::Cancelled => "CANCELLED",
        }
    }

    /// Parse the DB column text back into a state. `None` for unknown text.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_STATES.iter().copied().find(|st| st.as_str() == s)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrderEvent
// ---------------------------------------------------------------------------

/// Events that drive order state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    /// Payment captured for a pending order.
    Pay,
    /// User- or operator-requested cancellation.
    Cancel,
    /// Cancellation injected by the unpaid-timeout job.
    AutoCancel,
    /// Start ticket issuance for a paid order.
    ProcessTicketing,
    /// The issuance collaborator confirmed a ticket.
    TicketingSuccess,
    /// The issuance collaborator failed, or issuance is presumed stalled.
    TicketingFailure,
    /// Re-attempt issuance after a failure.
    RetryTicketing,
}

/// Every event, in declaration order.
pub const ALL_EVENTS: [OrderEvent; 7] = [
    OrderEvent::Pay,
    OrderEvent::Cancel,
    OrderEvent::AutoCancel,
    OrderEvent::ProcessTicketing,
    OrderEvent::TicketingSuccess,
    OrderEvent::TicketingFailure,
    OrderEvent::RetryTicketing,
];

impl OrderEvent {
    /// The exact text stored in the `order_state_history.event` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::Pay => "PAY",
            OrderEvent::Cancel => "CANCEL",
            OrderEvent::AutoCancel => "AUTO_CANCEL",
            OrderEvent::ProcessTicketing => "PROCESS_TICKETING",
            OrderEvent::TicketingSuccess => "TICKETING_SUCCESS",
            OrderEvent::TicketingFailure => "TICKETING_FAILURE",
            OrderEvent::RetryTicketing => "RETRY_TICKETING",
        }
    }

    /// Parse history/API text back into an event. `None` for unknown text.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_EVENTS.iter().copied().find(|ev| ev.as_str() == s)
    }
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// The legal transition table: `(current state, event) -> target state`.
///
/// Every pair not matched here is illegal; terminal states match nothing.
pub fn transition(from: OrderState, event: OrderEvent) -> Option<OrderState> {
    use OrderEvent::*;
    use OrderState::*;

    match (from, event) {
        (PendingPayment, Pay) => Some(Paid),
        (PendingPayment, Cancel | AutoCancel) => Some(Cancelled),

        (Paid, ProcessTicketing) => Some(TicketingInProgress),
        (Paid, Cancel) => Some(Cancelled),

        (TicketingInProgress, TicketingSuccess) => Some(Ticketed),
        (TicketingInProgress, TicketingFailure) => Some(TicketingFailed),
        (TicketingInProgress, Cancel) => Some(Cancelled),

        (TicketingFailed, RetryTicketing) => Some(TicketingInProgress),
        (TicketingFailed, Cancel) => Some(Cancelled),

        _ => None,
    }
}

/// Events with a legal transition out of `from`, in declaration order.
/// Empty for terminal states.
pub fn allowed_events(from: OrderState) -> Vec<OrderEvent> {
    ALL_EVENTS
        .iter()
        .copied()
        .filter(|ev| transition(from, *ev).is_some())
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use OrderEvent::*;
    use OrderState::*;

    /// The full legal table, written out flat so the test fails loudly if a
    /// row is added or dropped.
    const LEGAL: [(OrderState, OrderEvent, OrderState); 9] = [
        (PendingPayment, Pay, Paid),
        (PendingPayment, Cancel, Cancelled),
        (PendingPayment, AutoCancel, Cancelled),
        (Paid, ProcessTicketing, TicketingInProgress),
        (Paid, Cancel, Cancelled),
        (TicketingInProgress, TicketingSuccess, Ticketed),
        (TicketingInProgress, TicketingFailure, TicketingFailed),
        (TicketingInProgress, Cancel, Cancelled),
        (TicketingFailed, RetryTicketing, TicketingInProgress),
    ];

    #[test]
    fn legal_triples_map_to_expected_target() {
        for (from, ev, to) in LEGAL {
            assert_eq!(
                transition(from, ev),
                Some(to),
                "{from} + {ev} must reach {to}"
            );
        }
        // One row the flat table above can't express twice: Cancel is also
        // legal from TicketingFailed.
        assert_eq!(transition(TicketingFailed, Cancel), Some(Cancelled));
    }

    #[test]
    fn every_unlisted_pair_is_illegal() {
        let legal_pairs: Vec<(OrderState, OrderEvent)> = LEGAL
            .iter()
            .map(|(f, e, _)| (*f, *e))
            .chain(std::iter::once((TicketingFailed, Cancel)))
            .collect();

        for from in ALL_STATES {
            for ev in ALL_EVENTS {
                if legal_pairs.contains(&(from, ev)) {
                    continue;
                }
                assert_eq!(
                    transition(from, ev),
                    None,
                    "{from} + {ev} must be illegal"
                );
            }
        }
    }

    #[test]
    fn terminal_states_accept_no_events() {
        for state in [Ticketed, Cancelled] {
            assert!(state.is_terminal());
            assert!(
                allowed_events(state).is_empty(),
                "{state} must allow no events"
            );
        }
        for state in [PendingPayment, Paid, TicketingInProgress, TicketingFailed] {
            assert!(!state.is_terminal());
            assert!(!allowed_events(state).is_empty());
        }
    }

    #[test]
    fn allowed_events_matches_table() {
        assert_eq!(
            allowed_events(PendingPayment),
            vec![Pay, Cancel, AutoCancel]
        );
        assert_eq!(allowed_events(Paid), vec![Cancel, ProcessTicketing]);
        assert_eq!(
            allowed_events(TicketingInProgress),
            vec![Cancel, TicketingSuccess, TicketingFailure]
        );
        assert_eq!(
            allowed_events(TicketingFailed),
            vec![Cancel, RetryTicketing]
        );
    }

    #[test]
    fn state_text_round_trips() {
        for state in ALL_STATES {
            assert_eq!(OrderState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OrderState::parse("NOT_A_STATE"), None);
    }

    #[test]
    fn event_text_round_trips() {
        for ev in ALL_EVENTS {
            assert_eq!(OrderEvent::parse(ev.as_str()), Some(ev));
        }
        assert_eq!(OrderEvent::parse("REFUND"), None);
    }
}

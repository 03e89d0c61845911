//! Order lifecycle model.
//!
//! Pure data: the closed set of order states and triggering events, the
//! legal transition table, the actor model, and the transition error
//! taxonomy. Nothing here touches storage or clocks; every function is
//! total over the closed enums.
//!
//! # State diagram
//!
//! ```text
//!                  PAY          PROCESS_TICKETING              TICKETING_SUCCESS
//! PendingPayment ──────► Paid ──────────► TicketingInProgress ──────► Ticketed
//!       │                 │                  │         ▲              (terminal)
//!       │ CANCEL |        │       TICKETING_ │         │
//!       │ AUTO_CANCEL     │         FAILURE  ▼         │ RETRY_TICKETING
//!       │                 │           TicketingFailed ─┘
//!       │                 │ CANCEL           │ CANCEL     (CANCEL is also legal
//!       ▼                 ▼                  ▼             from InProgress)
//!     Cancelled (terminal) ◄─────────────────┘
//! ```
//!
//! `Ticketed` and `Cancelled` are terminal: no event is legal from either.

mod actor;
mod error;
mod transitions;

pub use actor::{Actor, ActorRole};
pub use error::TransitionError;
pub use transitions::{allowed_events, transition, OrderEvent, OrderState, ALL_EVENTS, ALL_STATES};

//! Transition guards.
//!
//! Two independent checks, kept separate so each is testable on its own:
//! legality is a pure function of (state, event); authority is a function
//! of (actor, order owner). Neither touches storage; the caller supplies
//! a freshly loaded order and must already hold the order's lock.

use aero_model::{transition, Actor, ActorRole, OrderEvent, OrderState, TransitionError};

/// Is this event legal from this state? Returns the target state, or the
/// stable IllegalTransition rejection naming both.
pub fn check_transition(
    from: OrderState,
    event: OrderEvent,
) -> Result<OrderState, TransitionError> {
    transition(from, event).ok_or(TransitionError::IllegalTransition { from, event })
}

/// May this actor operate on an order owned by `owner_user_id`?
/// Administrators and the system identity may operate on any order;
/// customers only on their own.
pub fn authorize(actor: &Actor, owner_user_id: &str) -> Result<(), TransitionError> {
    match actor.role {
        ActorRole::Admin | ActorRole::System => Ok(()),
        ActorRole::Customer if actor.id == owner_user_id => Ok(()),
        ActorRole::Customer => Err(TransitionError::Forbidden {
            actor_id: actor.id.clone(),
        }),
    }
}

//! HTTP boundary for the order lifecycle backend.
//!
//! The daemon exposes order creation, transition triggering, and the
//! read-side (state, allowed events, history) over HTTP, plus an SSE
//! stream of transitions. All lifecycle rules live in `aero-engine`;
//! handlers here translate between HTTP and the service contract.

pub mod api_types;
pub mod routes;
pub mod state;

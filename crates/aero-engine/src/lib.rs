//! Transition engine for the order lifecycle.
//!
//! The engine is stateless: current order state is always reconstructed
//! from storage under the order's lock, never from a process-local cache,
//! so it stays correct when several instances share one database.
//!
//! ```text
//! caller ──► StateMachineService::trigger(order_id, event, actor, ctx)
//!                │
//!                ├── lock::acquire("order:{id}", request_id, 30s)   Busy on contention
//!                ├── executor::attempt
//!                │     ├── fresh load of the order          (under the lock)
//!                │     ├── legality: transition table       guard::check_transition
//!                │     ├── authority: admin/system/owner    guard::authorize
//!                │     ├── entry side effects by target     issuance / refund
//!                │     └── persist new state                Persistence on failure
//!                ├── lock::release                          always, even on error
//!                ├── recorder::record_attempt               always, never escalates
//!                └── follow-up events (issuance outcome) re-enter trigger
//!                    as SYSTEM once the lock is free
//! ```

pub mod collab;
pub mod executor;
pub mod guard;
pub mod recorder;
pub mod service;

pub use collab::{IssuanceClient, IssuanceError, PaymentsClient};
pub use executor::AttemptOutcome;
pub use service::StateMachineService;

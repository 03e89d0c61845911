//! External collaborator seams.
//!
//! The engine talks to the ticket-issuance system and the payments
//! system only through these traits. Real implementations live in their
//! own crates; the engine never sees their wire formats or error shapes
//! beyond what is defined here.

use async_trait::async_trait;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// IssuanceError
// ---------------------------------------------------------------------------

/// Failure modes of the external issuance call.
///
/// The engine treats all of these uniformly: each becomes a
/// TICKETING_FAILURE event, with the variant recorded as the history
/// record's error payload. Distinguishing them further is the
/// collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceError {
    Timeout,
    NoSeatAvailable,
    FlightCancelled,
    InvalidPassenger,
    SystemMaintenance,
    NetworkError,
    Unknown,
}

impl IssuanceError {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceError::Timeout => "TIMEOUT",
            IssuanceError::NoSeatAvailable => "NO_SEAT_AVAILABLE",
            IssuanceError::FlightCancelled => "FLIGHT_CANCELLED",
            IssuanceError::InvalidPassenger => "INVALID_PASSENGER",
            IssuanceError::SystemMaintenance => "SYSTEM_MAINTENANCE",
            IssuanceError::NetworkError => "NETWORK_ERROR",
            IssuanceError::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for IssuanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for IssuanceError {}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The external ticket-issuance system.
#[async_trait]
pub trait IssuanceClient: Send + Sync {
    /// Request a ticket for the order. Returns the issued ticket
    /// reference on success.
    async fn issue_ticket(&self, order_id: Uuid) -> Result<String, IssuanceError>;
}

/// The payments system, as far as this engine needs it: refunds for
/// orders cancelled after money was captured.
#[async_trait]
pub trait PaymentsClient: Send + Sync {
    /// Start a refund. Failure here never aborts a cancellation; the
    /// engine logs it and the refund is chased out of band.
    async fn initiate_refund(&self, order_id: Uuid) -> anyhow::Result<()>;
}

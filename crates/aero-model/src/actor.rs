//! Who is asking for a transition.

use serde::{Deserialize, Serialize};

/// Role of the party requesting a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    /// An end user; may only operate on orders they own.
    Customer,
    /// Back-office staff; may operate on any order.
    Admin,
    /// Scheduled jobs and internally injected follow-up events.
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "CUSTOMER",
            ActorRole::Admin => "ADMIN",
            ActorRole::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUSTOMER" => Some(ActorRole::Customer),
            "ADMIN" => Some(ActorRole::Admin),
            "SYSTEM" => Some(ActorRole::System),
            _ => None,
        }
    }
}

/// The identity attached to every transition attempt and history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The identity internally generated follow-up events run under.
    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }

    /// A named scheduled-job identity, e.g. `job:cancel_unpaid@host-1`.
    pub fn job(job_name: &str, instance_id: &str) -> Self {
        Self::new(format!("job:{job_name}@{instance_id}"), ActorRole::System)
    }
}

use serde::{Deserialize, Serialize};

use super::event::EventId;

/// Someone registering interest in attending an event.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub event_id: EventId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct NewsletterSignup {
    pub name: String,
    pub email: String,
}

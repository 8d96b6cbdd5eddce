use serde::{Deserialize, Serialize};

/// One account-mutation notification, delivered to WebSocket listeners as a
/// `{"message": "..."}` text frame. Ephemeral — constructed when a mutation
/// commits, fanned out once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

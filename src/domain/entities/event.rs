use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Event key for channel and private messages, args `[from, target, text]`
pub const MESSAGE: &str = "message";

/// An inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub key: String,
    pub args: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(key: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            args,
            received_at: Utc::now(),
        }
    }

    /// Build a `message` event
    pub fn message(from: impl Into<String>, target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MESSAGE, vec![from.into(), target.into(), text.into()])
    }

    pub fn is_message(&self) -> bool {
        self.key == MESSAGE
    }
}

/// Argument tuple handed to the raw send primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub target: String,
    pub text: String,
}

impl Outgoing {
    pub fn new(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
        }
    }
}

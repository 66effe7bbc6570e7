use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, Outgoing};

/// One-shot send primitive exposed by a transport.
///
/// Should not panic; a panic is caught by the throttled channel and the line counted as failed.
pub type RawSend = Arc<dyn Fn(&Outgoing) + Send + Sync>;

/// Transport trait - abstraction for chat protocol clients
#[async_trait]
pub trait Transport: Send + Sync {
    /// Nick the bot is known by on this transport
    fn nick(&self) -> &str;

    /// Unthrottled send; callers go through the throttled channel
    fn raw_sender(&self) -> RawSend;

    /// Deliver events whose key is in `keys` until the transport closes
    async fn listen(&self, keys: Vec<String>, events: mpsc::Sender<Event>) -> Result<(), BotError>;
}

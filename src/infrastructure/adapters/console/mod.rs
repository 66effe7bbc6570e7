//! Console transport for development/testing

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, Outgoing};
use crate::domain::traits::{RawSend, Transport};

static PRIVATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/msg\s+(\S+)\s+(.+)$").expect("valid private message pattern"));
static SPEAKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^\s:/]+):\s*(.*)$").expect("valid speaker pattern"));

/// What one console line turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Event(Event),
    Quit,
    Ignored,
}

/// Console transport: stdin lines become events, sends are printed
pub struct ConsoleTransport {
    nick: String,
    channel: String,
}

impl ConsoleTransport {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            channel: "#console".to_string(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Parse one line of input.
    ///
    /// `nick: text` speaks in the channel, `/msg nick text` messages the bot
    /// privately, `/event key args...` raises any event, `/quit` stops.
    pub fn parse_line(&self, line: &str) -> ConsoleInput {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleInput::Ignored;
        }
        if line == "/quit" {
            return ConsoleInput::Quit;
        }
        if let Some(caps) = PRIVATE.captures(line) {
            return ConsoleInput::Event(Event::message(&caps[1], self.nick.as_str(), &caps[2]));
        }
        if let Some(rest) = line.strip_prefix("/event ") {
            let mut parts = rest.split_whitespace();
            return match parts.next() {
                Some(key) => ConsoleInput::Event(Event::new(key, parts.map(str::to_string).collect())),
                None => ConsoleInput::Ignored,
            };
        }
        if let Some(caps) = SPEAKER.captures(line) {
            return ConsoleInput::Event(Event::message(&caps[1], self.channel.as_str(), &caps[2]));
        }
        ConsoleInput::Event(Event::message("console", self.channel.as_str(), line))
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn nick(&self) -> &str {
        &self.nick
    }

    fn raw_sender(&self) -> RawSend {
        Arc::new(|out: &Outgoing| println!("[{}] {}", out.target, out.text))
    }

    async fn listen(&self, keys: Vec<String>, events: mpsc::Sender<Event>) -> Result<(), BotError> {
        tracing::info!("Starting console transport (dev mode) as {}", self.nick);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?
        {
            match self.parse_line(&line) {
                ConsoleInput::Quit => break,
                ConsoleInput::Ignored => {}
                ConsoleInput::Event(event) => {
                    if !keys.contains(&event.key) {
                        tracing::debug!("No listener for {}, dropping", event.key);
                        continue;
                    }
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Console input closed");
        Ok(())
    }
}

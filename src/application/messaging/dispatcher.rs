//! Listener dispatcher - walks the module chain for each inbound event

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::errors::{panic_message, ModuleError};
use crate::domain::entities::Event;
use crate::modules::context::Context;
use crate::modules::contract::Flow;
use crate::modules::listeners::ListenerIndex;
use crate::modules::loader::LoadedModules;

/// A handler failure caught during dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub module: String,
    pub error: ModuleError,
}

/// What happened to one event occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub handlers_run: usize,
    pub failures: Vec<HandlerFailure>,
    /// Module whose handler stopped the chain
    pub aborted_by: Option<String>,
}

/// Routes events through the listener index in registration order
pub struct ListenerDispatcher {
    context: Arc<Context>,
    index: ListenerIndex,
}

impl ListenerDispatcher {
    pub fn new(loaded: LoadedModules) -> Self {
        for key in loaded.index.keys() {
            tracing::info!("Setting up listener {}", key);
        }
        Self {
            context: loaded.context,
            index: loaded.index,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Event keys the transport has to deliver
    pub fn event_keys(&self) -> Vec<String> {
        self.index.keys().map(str::to_string).collect()
    }

    /// Run one event through every listener for its key
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::default();
        let entries = self.index.get(&event.key);
        if entries.is_empty() {
            return report;
        }

        let args = self.normalize(event);
        let say = &self.context.say;
        tracing::debug!("Calling listeners for {} ({})", event.key, event.id);

        'chain: for entry in entries {
            for handler in &entry.handlers {
                report.handlers_run += 1;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(say, &args)))
                    .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload.as_ref()))));

                match outcome {
                    Ok(Flow::CarryOn) => {}
                    Ok(Flow::Abort) => {
                        tracing::debug!("Module {} is aborting, stopping", entry.module);
                        report.aborted_by = Some(entry.module.clone());
                        break 'chain;
                    }
                    Err(error) => {
                        tracing::warn!("Error when applying listener for {}: {}", entry.module, error);
                        report.failures.push(HandlerFailure {
                            module: entry.module.clone(),
                            error,
                        });
                    }
                }
            }
        }

        report
    }

    /// Private messages are answered to the sender, not to the bot's own nick
    fn normalize(&self, event: &Event) -> Vec<String> {
        let mut args = event.args.clone();
        if event.is_message() && args.len() >= 2 && args[1] == self.context.nick {
            args[1] = args[0].clone();
        }
        args
    }

    /// Dispatch events one at a time until the sender side closes
    pub async fn run(&self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        tracing::info!("Event stream closed");
    }
}

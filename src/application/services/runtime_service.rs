use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::messaging::{ListenerDispatcher, ThrottledChannel};
use crate::domain::traits::Transport;
use crate::infrastructure::config::Config;
use crate::modules::{Context, ModuleLoader, ModuleRegistry};

const EVENT_BUFFER: usize = 64;

/// Loaded modules bound to one transport
pub struct RuntimeService<T: Transport> {
    transport: T,
    dispatcher: ListenerDispatcher,
    say: ThrottledChannel,
}

impl<T: Transport> RuntimeService<T> {
    /// Build the throttled channel and context, load every enabled module and close loading
    pub fn bootstrap(config: &Config, transport: T, registry: ModuleRegistry) -> Result<Self, BotError> {
        let say = ThrottledChannel::new(transport.raw_sender(), config.throttle.clone())?;
        let context = Context::new(transport.nick(), config.irc.owner.clone(), say.clone());

        let mut loader = ModuleLoader::new(registry, context);
        let loaded = loader.register_all(&config.modules.enabled, |name| config.module_params(name));
        tracing::info!("Loaded {} of {} enabled modules", loaded, config.modules.enabled.len());

        let dispatcher = ListenerDispatcher::new(loader.fire_after_load());

        Ok(Self {
            transport,
            dispatcher,
            say,
        })
    }

    pub fn dispatcher(&self) -> &ListenerDispatcher {
        &self.dispatcher
    }

    pub fn say(&self) -> &ThrottledChannel {
        &self.say
    }

    /// Pump transport events through the dispatcher until the transport stops, then drain the outbound queue
    pub async fn run(self) -> Result<(), BotError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let keys = self.dispatcher.event_keys();

        let Self { transport, dispatcher, say } = self;
        let dispatcher = Arc::new(dispatcher);
        let pump = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run(rx).await })
        };

        let listened = transport.listen(keys, tx).await;
        pump.await
            .map_err(|e| BotError::Internal(format!("dispatch task failed: {}", e)))?;

        say.flush().await;
        tracing::info!("Transport closed, {} messages sent", say.delivered());
        listened
    }
}

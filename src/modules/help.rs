//! Help module - lists loaded modules and their help text

use std::sync::{Arc, Mutex};

use crate::application::errors::ModuleError;
use crate::application::messaging::throttle::Say;
use crate::domain::entities::MESSAGE;
use super::context::Context;
use super::contract::{listener, Flow, ModuleDescriptor, ModuleExports};

pub const NAME: &str = "help";

const COMMAND: &str = "!help";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Topic {
    module: String,
    description: Option<String>,
    help: Option<String>,
}

#[derive(Debug, Default)]
struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    fn collect(context: &Context) -> Self {
        let topics = context
            .modules()
            .iter()
            .map(|module| {
                let exports = context.exports(module);
                Topic {
                    module: module.clone(),
                    description: exports.and_then(|e| e.text("description")).map(str::to_string),
                    help: exports.and_then(|e| e.text("help")).map(str::to_string),
                }
            })
            .collect();
        Self { topics }
    }

    fn answer(&self, say: &Say, chan: &str, topic: Option<&str>) {
        match topic {
            None => {
                say.say(chan, format!("Modules (say {} <module> for details):", COMMAND));
                for topic in &self.topics {
                    match &topic.description {
                        Some(description) => say.say(chan, format!("{}: {}", topic.module, description)),
                        None => say.say(chan, topic.module.clone()),
                    }
                }
            }
            Some(name) => match self.topics.iter().find(|t| t.module == name) {
                Some(Topic { help: Some(help), .. }) => {
                    for line in help.lines().filter(|l| !l.trim().is_empty()) {
                        say.say(chan, line);
                    }
                }
                Some(Topic { description: Some(description), .. }) => say.say(chan, description.clone()),
                Some(_) => say.say(chan, format!("No help for {}", name)),
                None => say.say(chan, format!("Unknown module: {}", name)),
            },
        }
    }
}

pub fn factory(_context: &Context, _params: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
    let catalog = Arc::new(Mutex::new(Catalog::default()));

    let on_message = {
        let catalog = Arc::clone(&catalog);
        listener(move |say, args| {
            let [_, chan, text, ..] = args else {
                return Ok(Flow::CarryOn);
            };
            let Some(rest) = text.strip_prefix(COMMAND) else {
                return Ok(Flow::CarryOn);
            };
            if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
                return Ok(Flow::CarryOn);
            }
            let catalog = catalog.lock().map_err(|_| ModuleError::Poisoned)?;
            catalog.answer(say, chan, rest.split_whitespace().next());
            Ok(Flow::Abort)
        })
    };

    let exports = ModuleExports::new()
        .with_text("description", "Lists modules and their usage.")
        .with_text("help", "- !help lists modules\n- !help <module> explains one module");

    Ok(ModuleDescriptor::new()
        .listen(MESSAGE, on_message)
        .with_exports(exports)
        .after_load(move |context| {
            let collected = Catalog::collect(context);
            tracing::debug!("Help knows about {} modules", collected.topics.len());
            *catalog.lock().map_err(|_| ModuleError::Poisoned)? = collected;
            Ok(())
        }))
}

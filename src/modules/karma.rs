//! Karma module - counts `nick++` / `nick--` per nick and answers `!karma nick`

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::application::errors::ModuleError;
use crate::application::messaging::throttle::Say;
use crate::domain::entities::MESSAGE;
use crate::domain::traits::DocumentStore;
use crate::infrastructure::storage::JsonDocument;
use super::context::Context;
use super::contract::{listener, Flow, HandlerResult, ModuleDescriptor, ModuleExports};

pub const NAME: &str = "karma";

const QUERY: &str = "!karma";

/// Persisted scores, nick -> karma
pub type Scores = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KarmaParams {
    pub filename: PathBuf,
    /// Milliseconds during which the same sender cannot change the same nick again
    #[serde(alias = "debouncing_rate")]
    pub debouncing_rate: u64,
}

impl Default for KarmaParams {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("karma.json"),
            debouncing_rate: 5000,
        }
    }
}

impl KarmaParams {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ModuleError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| ModuleError::InvalidParams(format!("karma: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Increment,
    Decrement,
}

impl Action {
    const ALL: [Action; 2] = [Action::Increment, Action::Decrement];

    fn marker(self) -> &'static str {
        match self {
            Action::Increment => "++",
            Action::Decrement => "--",
        }
    }

    fn delta(self) -> i64 {
        match self {
            Action::Increment => 1,
            Action::Decrement => -1,
        }
    }
}

/// Score store plus the debounce set
pub struct Karma {
    scores: Scores,
    store: Box<dyn DocumentStore<Scores>>,
    blocked: HashMap<(String, String), Instant>,
    debounce: Duration,
}

impl Karma {
    /// Load scores from `store`; an unreadable document starts empty
    pub fn open(store: Box<dyn DocumentStore<Scores>>, debounce: Duration) -> Self {
        let scores = match store.load() {
            Ok(scores) => scores.unwrap_or_default(),
            Err(e) => {
                tracing::error!("Error when loading karmas: {}", e);
                Scores::new()
            }
        };
        Self {
            scores,
            store,
            blocked: HashMap::new(),
            debounce,
        }
    }

    pub fn score(&self, who: &str) -> i64 {
        self.scores.get(who).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Apply `action` to `who` and persist, returning the new score
    pub fn apply(&mut self, who: &str, action: Action) -> i64 {
        let score = self.scores.entry(who.to_string()).or_insert(0);
        *score += action.delta();
        let score = *score;
        if let Err(e) = self.store.save(&self.scores) {
            tracing::error!("Error when writing karmas: {}", e);
        }
        score
    }

    fn is_blocked(&mut self, from: &str, who: &str) -> bool {
        let now = Instant::now();
        self.blocked.retain(|_, expires| *expires > now);
        self.blocked.contains_key(&(from.to_string(), who.to_string()))
    }

    fn block(&mut self, from: &str, who: &str) {
        self.blocked
            .insert((from.to_string(), who.to_string()), Instant::now() + self.debounce);
    }

    /// React to one message line
    pub fn on_message(&mut self, say: &Say, from: &str, chan: &str, text: &str) -> Flow {
        if let Some(rest) = text.strip_prefix(QUERY) {
            let Some(who) = rest.split_whitespace().next() else {
                return Flow::CarryOn;
            };
            say.say(chan, format!("{} has a karma of {}", who, self.score(who)));
            return Flow::Abort;
        }

        for action in Action::ALL {
            if !text.contains(action.marker()) {
                continue;
            }
            let who = match target_before(text, action.marker()) {
                Some(who) if who != from && !self.is_blocked(from, who) => who,
                _ => return Flow::CarryOn,
            };
            let score = self.apply(who, action);
            self.block(from, who);
            tracing::debug!("{} gave {}{} (now {})", from, who, action.marker(), score);
            return Flow::Abort;
        }

        Flow::CarryOn
    }
}

/// Last word before the first `marker`
fn target_before<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let head = text.split(marker).next()?.trim();
    head.rsplit(' ').next().filter(|who| !who.is_empty())
}

fn lock(karma: &Mutex<Karma>) -> Result<std::sync::MutexGuard<'_, Karma>, ModuleError> {
    karma.lock().map_err(|_| ModuleError::Poisoned)
}

fn nick_arg(args: &serde_json::Value) -> Result<&str, ModuleError> {
    args.as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ModuleError::InvalidParams("expected a nick".to_string()))
}

/// Descriptor around an already opened store
pub fn descriptor(karma: Arc<Mutex<Karma>>) -> ModuleDescriptor {
    let on_message = {
        let karma = Arc::clone(&karma);
        listener(move |say, args| -> HandlerResult {
            let [from, chan, text, ..] = args else {
                return Ok(Flow::CarryOn);
            };
            Ok(lock(&karma)?.on_message(say, from, chan, text))
        })
    };

    let plus = Arc::clone(&karma);
    let minus = Arc::clone(&karma);
    let exports = ModuleExports::new()
        .with_fn("plusplus", move |args| {
            let who = nick_arg(&args)?;
            Ok(json!(lock(&plus)?.apply(who, Action::Increment)))
        })
        .with_fn("minusminus", move |args| {
            let who = nick_arg(&args)?;
            Ok(json!(lock(&minus)?.apply(who, Action::Decrement)))
        })
        .with_text("description", "Counts karma (i.e. instances of pseudo++ and pseudo--).")
        .with_text(
            "help",
            "- Whenever you add ++ or -- to a given name, it will affect this user's karma as saved in the database.\n\
             - To know the karma of somebody, just say: !karma nickname",
        );

    ModuleDescriptor::new().listen(MESSAGE, on_message).with_exports(exports)
}

pub fn factory(_context: &Context, params: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
    let params = KarmaParams::from_value(params)?;
    let store = JsonDocument::<Scores>::new(&params.filename);
    let karma = Karma::open(Box::new(store), Duration::from_millis(params.debouncing_rate));

    tracing::info!(
        "Setting up karma with filename={} and debouncing_rate={}ms, found karma for {} people",
        params.filename.display(),
        params.debouncing_rate,
        karma.len()
    );

    Ok(descriptor(Arc::new(Mutex::new(karma))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::StorageError;
    use crate::application::messaging::throttle::{ThrottleConfig, ThrottledChannel};
    use crate::domain::entities::Outgoing;
    use crate::domain::traits::RawSend;

    /// In-memory store that counts saves and can be told to fail
    #[derive(Clone, Default)]
    struct MemoryStore {
        doc: Arc<Mutex<Option<Scores>>>,
        saves: Arc<Mutex<usize>>,
        fail_writes: bool,
    }

    impl DocumentStore<Scores> for MemoryStore {
        fn load(&self) -> Result<Option<Scores>, StorageError> {
            Ok(self.doc.lock().unwrap().clone())
        }

        fn save(&self, value: &Scores) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            *self.doc.lock().unwrap() = Some(value.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn say() -> (Say, Arc<Mutex<Vec<Outgoing>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let raw: RawSend = Arc::new(move |out: &Outgoing| sink.lock().unwrap().push(out.clone()));
        (ThrottledChannel::new(raw, ThrottleConfig::default()).unwrap(), sent)
    }

    fn karma(store: &MemoryStore) -> Karma {
        Karma::open(Box::new(store.clone()), Duration::from_millis(5000))
    }

    #[test]
    fn target_is_last_word_before_marker() {
        assert_eq!(target_before("alice++", "++"), Some("alice"));
        assert_eq!(target_before("thanks alice++ for that", "++"), Some("alice"));
        assert_eq!(target_before("  bob --", "--"), Some("bob"));
        assert_eq!(target_before("++", "++"), None);
        assert_eq!(target_before("   ++ alice", "++"), None);
    }

    #[test]
    fn params_accept_both_spellings() {
        let kebab = KarmaParams::from_value(&json!({ "debouncing-rate": 10 })).unwrap();
        let snake = KarmaParams::from_value(&json!({ "debouncing_rate": 10, "filename": "k.json" })).unwrap();
        assert_eq!(kebab.debouncing_rate, 10);
        assert_eq!(kebab.filename, PathBuf::from("karma.json"));
        assert_eq!(snake.filename, PathBuf::from("k.json"));
        assert_eq!(KarmaParams::from_value(&serde_json::Value::Null).unwrap(), KarmaParams::default());
        assert!(KarmaParams::from_value(&json!({ "debouncing-rate": "soon" })).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn increment_is_debounced_per_pair() {
        let store = MemoryStore::default();
        let mut karma = karma(&store);
        let (say, _) = say();

        assert_eq!(karma.on_message(&say, "bob", "#rust", "alice++"), Flow::Abort);
        assert_eq!(karma.score("alice"), 1);

        assert_eq!(karma.on_message(&say, "bob", "#rust", "alice++"), Flow::CarryOn);
        assert_eq!(karma.score("alice"), 1);

        // A different sender is not affected by bob's window.
        assert_eq!(karma.on_message(&say, "carol", "#rust", "alice++"), Flow::Abort);
        assert_eq!(karma.score("alice"), 2);

        tokio::time::advance(Duration::from_millis(5001)).await;
        assert_eq!(karma.on_message(&say, "bob", "#rust", "alice++"), Flow::Abort);
        assert_eq!(karma.score("alice"), 3);
        assert_eq!(*store.saves.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn decrement_and_self_karma() {
        let store = MemoryStore::default();
        let mut karma = karma(&store);
        let (say, _) = say();

        assert_eq!(karma.on_message(&say, "bob", "#rust", "alice--"), Flow::Abort);
        assert_eq!(karma.score("alice"), -1);

        assert_eq!(karma.on_message(&say, "bob", "#rust", "bob++"), Flow::CarryOn);
        assert_eq!(karma.score("bob"), 0);
        assert_eq!(karma.on_message(&say, "bob", "#rust", "just chatting"), Flow::CarryOn);
    }

    #[tokio::test]
    async fn query_reports_without_mutating() {
        let store = MemoryStore::default();
        *store.doc.lock().unwrap() = Some(Scores::from([("alice".to_string(), 4)]));
        let mut karma = karma(&store);
        let (say, sent) = say();

        assert_eq!(karma.on_message(&say, "bob", "#rust", "!karma alice"), Flow::Abort);
        assert_eq!(karma.on_message(&say, "bob", "#rust", "!karma nobody"), Flow::Abort);
        assert_eq!(karma.on_message(&say, "bob", "#rust", "!karma"), Flow::CarryOn);
        assert_eq!(karma.on_message(&say, "bob", "#rust", "!karma   "), Flow::CarryOn);

        let sent = sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                Outgoing::new("#rust", "alice has a karma of 4"),
                Outgoing::new("#rust", "nobody has a karma of 0"),
            ]
        );
        assert_eq!(karma.score("alice"), 4);
        assert!(!karma.scores.contains_key("nobody"));
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn write_failure_keeps_memory_state() {
        let store = MemoryStore { fail_writes: true, ..MemoryStore::default() };
        let mut karma = karma(&store);
        let (say, _) = say();

        assert_eq!(karma.on_message(&say, "bob", "#rust", "alice++"), Flow::Abort);
        assert_eq!(karma.score("alice"), 1);
    }

    #[tokio::test]
    async fn exports_adjust_scores() {
        let store = MemoryStore::default();
        let descriptor = descriptor(Arc::new(Mutex::new(karma(&store))));

        assert_eq!(descriptor.exports.call("plusplus", json!("alice")).unwrap(), json!(1));
        assert_eq!(descriptor.exports.call("plusplus", json!("alice")).unwrap(), json!(2));
        assert_eq!(descriptor.exports.call("minusminus", json!("bob")).unwrap(), json!(-1));
        assert!(descriptor.exports.call("plusplus", json!(3)).is_err());
        assert!(descriptor.exports.text("help").unwrap().contains("!karma nickname"));
    }

    #[tokio::test]
    async fn malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karma.json");
        std::fs::write(&path, "garbage").unwrap();

        let karma = Karma::open(Box::new(JsonDocument::<Scores>::new(&path)), Duration::from_secs(5));
        assert!(karma.is_empty());
    }
}

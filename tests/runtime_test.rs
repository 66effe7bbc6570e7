//! Runtime integration tests: loader, dispatcher, throttle and built-in modules together
//! Run with: cargo test --test runtime_test

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use relay_bot::application::errors::ModuleError;
use relay_bot::domain::traits::RawSend;
use relay_bot::modules::{listener, ModuleDescriptor};
use relay_bot::{
    Context, Event, Flow, ListenerDispatcher, ModuleLoader, ModuleRegistry, Outgoing, ThrottleConfig,
    ThrottledChannel,
};
use serde_json::json;
use tokio::time::Instant;

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

type Sent = Arc<Mutex<Vec<(Outgoing, Instant)>>>;

fn channel() -> (ThrottledChannel, Sent) {
    let sent: Sent = Arc::default();
    let sink = Arc::clone(&sent);
    let raw: RawSend = Arc::new(move |out: &Outgoing| sink.lock().unwrap().push((out.clone(), Instant::now())));
    (ThrottledChannel::new(raw, ThrottleConfig::default()).unwrap(), sent)
}

fn broken(_: &Context, _: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
    Err(ModuleError::Load("missing dependency".to_string()))
}

fn fragile(_: &Context, _: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
    Ok(ModuleDescriptor::new().listen("message", listener(|_, _| panic!("fragile module fell over"))))
}

fn echo(_: &Context, _: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
    Ok(ModuleDescriptor::new().listen(
        "message",
        listener(|say, args| {
            say.say(args[1].clone(), format!("echo: {}", args[2]));
            Ok(Flow::CarryOn)
        }),
    ))
}

fn bot(karma_file: &std::path::Path, debounce_ms: u64) -> (ListenerDispatcher, Sent) {
    ensure_init();
    let (say, sent) = channel();
    let registry = ModuleRegistry::builtin()
        .with("broken", broken)
        .with("fragile", fragile)
        .with("echo", echo);

    let mut loader = ModuleLoader::new(registry, Context::new("relay-bot", Some("admin".to_string()), say));
    let enabled: Vec<String> = ["fragile", "broken", "karma", "echo"].iter().map(|s| s.to_string()).collect();
    let loaded = loader.register_all(&enabled, |name| match name {
        "karma" => json!({ "filename": karma_file, "debouncing-rate": debounce_ms }),
        _ => json!({}),
    });
    assert_eq!(loaded, 3);

    (ListenerDispatcher::new(loader.fire_after_load()), sent)
}

fn texts(sent: &Sent) -> Vec<String> {
    sent.lock().unwrap().iter().map(|(o, _)| format!("{} {}", o.target, o.text)).collect()
}

#[tokio::test(start_paused = true)]
async fn karma_flow_survives_faulty_neighbours() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("karma.json");
    let (dispatcher, sent) = bot(&file, 5000);

    // fragile panics, karma applies and aborts before echo.
    let report = dispatcher.dispatch(&Event::message("bob", "#relay", "alice++"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.aborted_by.as_deref(), Some("karma"));

    // Debounced: karma carries on, echo answers.
    dispatcher.dispatch(&Event::message("bob", "#relay", "alice++"));

    tokio::time::advance(Duration::from_millis(5001)).await;
    dispatcher.dispatch(&Event::message("bob", "#relay", "alice++"));
    dispatcher.dispatch(&Event::message("bob", "relay-bot", "!karma alice"));

    assert_eq!(
        texts(&sent),
        vec!["#relay echo: alice++", "bob alice has a karma of 2"]
    );

    let stored: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(stored, json!({ "alice": 2 }));
}

#[tokio::test(start_paused = true)]
async fn scores_persist_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("karma.json");

    let (first, _) = bot(&file, 5000);
    first.dispatch(&Event::message("bob", "#relay", "alice--"));
    first.dispatch(&Event::message("carol", "#relay", "alice--"));

    let (second, sent) = bot(&file, 5000);
    second.dispatch(&Event::message("bob", "#relay", "!karma alice"));
    assert_eq!(texts(&sent), vec!["#relay alice has a karma of -2"]);
}

#[tokio::test(start_paused = true)]
async fn replies_are_throttled_after_a_burst() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, sent) = bot(&dir.path().join("karma.json"), 5000);
    let start = Instant::now();

    for i in 0..7 {
        dispatcher.dispatch(&Event::message("bob", "#relay", format!("!karma nick{}", i)));
    }
    assert_eq!(sent.lock().unwrap().len(), 5);
    assert_eq!(dispatcher.context().say.pending(), 2);

    tokio::time::sleep(Duration::from_millis(1501)).await;

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 7);
    for (i, (out, at)) in sent.iter().enumerate() {
        assert_eq!(out.text, format!("nick{} has a karma of 0", i));
        if i < 5 {
            assert_eq!(*at, start);
        } else {
            let delay = *at - start;
            assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1500), "{:?}", delay);
        }
    }
}

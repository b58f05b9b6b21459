#![allow(dead_code)]

use herald::{
    Runtime,
    module::{ModuleDef, Overrides},
    testing::{RecordingPacer, Timeline},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;

// ============================================================================
// Runtimes
// ============================================================================

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::DEBUG)
        .try_init();
}

/// A runtime whose pauses are recorded on `timeline` instead of slept.
pub fn paced_runtime(max_sync: usize, timeline: &Timeline) -> (Runtime, RecordingPacer) {
    init_tracing();
    let pacer = RecordingPacer::with_timeline(timeline.clone());
    let runtime = Runtime::builder()
        .max_sync(max_sync)
        .pacer(pacer.clone())
        .build()
        .unwrap();
    (runtime, pacer)
}

// ============================================================================
// Modules
// ============================================================================

/// A module counting received notifications into `state.seen`.
///
/// Subscribes to whatever names `config.interests` lists.
pub fn listener_module(runtime: &Runtime, qualified: &str) -> Arc<ModuleDef> {
    runtime
        .derive_module(
            qualified,
            None,
            Overrides::new()
                .defaults(json!({ "interests": [] }))
                .method("interests", |call, _| Ok(call.config()["interests"].clone()))
                .method("handle_notification", |call, args| {
                    let seen = call.get("seen").and_then(Value::as_u64).unwrap_or(0);
                    call.set("seen", json!(seen + 1));
                    call.set("last", args.get(1).cloned().unwrap_or(Value::Null));
                    Ok(Value::Null)
                }),
        )
        .unwrap()
}

/// `describe` returning the module's own tag.
pub fn tagged(tag: &'static str) -> Overrides {
    Overrides::new().method("describe", move |_, _| Ok(json!(tag)))
}

/// `describe` wrapping whatever the overridden `describe` returns.
pub fn wrapping(tag: &'static str) -> Overrides {
    Overrides::new().method("describe", move |call, args| {
        let inner = call.invoke_base(args)?;
        Ok(json!(format!("{tag}<{}>", inner.as_str().unwrap_or_default())))
    })
}

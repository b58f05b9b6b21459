//! Testing utilities for Herald.
//!
//! This module provides helpers to make testing listeners and delivery
//! pacing easier.
//!
//! # Features
//!
//! - [`Timeline`]: a shared, ordered log that handlers and pacers write to
//! - [`RecordingPacer`]: a pacer that records pauses instead of sleeping
//! - [`RecordingHandler`]: a handler that records every notification it receives
//! - [`CountingHandler`]: a handler that counts invocations
//! - [`FailingHandler`]: a handler that errors or panics on every call

use futures::future::{self, BoxFuture};
use herald_core::{BoxError, Handler, Message, Notification, Pacer};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

// ============================================================================
// Timeline
// ============================================================================

/// A shared, ordered log of labels.
///
/// # Example
///
/// ```rust,ignore
/// let timeline = Timeline::new();
/// let pacer = RecordingPacer::with_timeline(timeline.clone());
/// // ... deliver ...
/// assert_eq!(timeline.entries(), vec!["a", "b", "|", "c"]);
/// ```
#[derive(Clone, Default, Debug)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn push(&self, label: impl Into<String>) {
        self.0.lock().unwrap().push(label.into());
    }

    /// Get a copy of all labels.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Split the labels into bursts separated by pacer marks.
    pub fn bursts(&self) -> Vec<Vec<String>> {
        self.entries()
            .split(|label| label == RecordingPacer::MARK)
            .map(<[String]>::to_vec)
            .collect()
    }
}

// ============================================================================
// Recording Pacer
// ============================================================================

/// A pacer that records every pause and returns immediately.
#[derive(Clone, Default)]
pub struct RecordingPacer {
    pauses: Arc<Mutex<Vec<Duration>>>,
    timeline: Option<Timeline>,
}

impl RecordingPacer {
    /// Label pushed to the timeline on every pause.
    pub const MARK: &'static str = "|";

    /// Create a pacer with its own log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pacer that also marks every pause on `timeline`.
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            pauses: Arc::default(),
            timeline: Some(timeline),
        }
    }

    /// Requested pause lengths, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    /// Number of pauses taken.
    pub fn count(&self) -> usize {
        self.pauses.lock().unwrap().len()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, delay: Duration) -> BoxFuture<'static, ()> {
        self.pauses.lock().unwrap().push(delay);
        if let Some(timeline) = &self.timeline {
            timeline.push(Self::MARK);
        }
        Box::pin(future::ready(()))
    }
}

// ============================================================================
// Recording Handler
// ============================================================================

/// A handler that records all notifications it receives.
///
/// Clones share the same record.
pub struct RecordingHandler<B = serde_json::Value> {
    received: Arc<Mutex<Vec<Notification<B>>>>,
    timeline: Option<(Timeline, String)>,
}

impl<B> RecordingHandler<B> {
    /// Create a new recording handler.
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            timeline: None,
        }
    }

    /// Create a recording handler that also pushes `label` to `timeline`.
    pub fn labelled(timeline: Timeline, label: impl Into<String>) -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            timeline: Some((timeline, label.into())),
        }
    }

    /// Get a copy of the received notifications.
    pub fn received(&self) -> Vec<Notification<B>> {
        self.received.lock().unwrap().clone()
    }

    /// Get the number of received notifications.
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl<B> Default for RecordingHandler<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Clone for RecordingHandler<B> {
    fn clone(&self) -> Self {
        Self {
            received: self.received.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

impl<B: Message> Handler<B> for RecordingHandler<B> {
    fn handle(&self, notification: &Notification<B>) -> Result<(), BoxError> {
        self.received.lock().unwrap().push(notification.clone());
        if let Some((timeline, label)) = &self.timeline {
            timeline.push(label.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Counting Handler
// ============================================================================

/// A handler that counts invocations.
#[derive(Clone, Default)]
pub struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    /// Create a new counting handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<B: Message> Handler<B> for CountingHandler {
    fn handle(&self, _notification: &Notification<B>) -> Result<(), BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Failing Handler
// ============================================================================

/// A handler that fails on every call.
#[derive(Clone, Debug)]
pub enum FailingHandler {
    /// Return an error with this message.
    Error(String),
    /// Panic with this message.
    Panic(String),
}

impl FailingHandler {
    /// A handler returning an error.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// A handler that panics.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::Panic(message.into())
    }
}

impl<B: Message> Handler<B> for FailingHandler {
    fn handle(&self, _notification: &Notification<B>) -> Result<(), BoxError> {
        match self {
            FailingHandler::Error(message) => Err(message.clone().into()),
            FailingHandler::Panic(message) => panic!("{message}"),
        }
    }
}

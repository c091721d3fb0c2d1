//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;

use module_reconfig::runtime::{InMemoryRuntime, ModuleHandle, ModuleRuntime, RuntimeFlags};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// A runtime with a couple of platform modules defined in the boot layer
pub struct TestRuntime {
    pub memory: InMemoryRuntime,
    pub java_base: ModuleHandle,
    pub other_module: ModuleHandle,
}

impl TestRuntime {
    pub fn new(flags: RuntimeFlags) -> Self {
        let memory = InMemoryRuntime::with_flags(flags);
        let java_base = memory
            .define_module(
                "java.base",
                &["java.lang", "java.util", "java.io", "java.lang.invoke"],
            )
            .unwrap();
        let other_module = memory
            .define_module("other.module", &["org.other"])
            .unwrap();
        Self {
            memory,
            java_base,
            other_module,
        }
    }

    pub fn runtime(&self) -> Arc<dyn ModuleRuntime> {
        Arc::new(self.memory.clone())
    }
}

/// Events captured by a test-scoped subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    pub fn count(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.events.lock().push((*event.metadata().level(), visitor.0));
    }
}

/// Run `f` with a subscriber recording every event emitted on this thread
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = Registry::default().with(logs.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}

//! Event records describing what the coordinator does.
//!
//! Every significant transition is reported to an [`EventSink`] as a
//! directional record (`from` -> `to`). Sinks are one-way: recording is
//! synchronous, cannot fail and returns nothing the coordinator looks at.

use crate::error::ComputationFailure;
use crate::types::{ComputationName, Participant, PromiseId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    InvokeRequested,
    PromiseCreated,
    WorkerSpawned,
    InvokeReplied,
    /// Await on an already completed promise, answered in the same turn.
    AwaitImmediate,
    /// Await on a pending promise; the caller is parked.
    AwaitPending,
    Returned,
    WaiterNotified,
    Released,
    /// A request was answered with a protocol error.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Invoke,
    Await,
    Return,
    Release,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum Payload {
    Computation(ComputationName),
    Value(Value),
    Failure(ComputationFailure),
    Promise(PromiseId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub category: EventCategory,
    pub from: Participant,
    pub to: Participant,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Event {
    pub fn new(
        category: EventCategory,
        from: Participant,
        to: Participant,
        operation: Operation,
        payload: Option<Payload>,
    ) -> Self {
        Self {
            at: Utc::now(),
            category,
            from,
            to,
            operation,
            payload,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        tracing::debug!(
            category = ?event.category,
            operation = ?event.operation,
            payload = ?event.payload,
            "{} -> {}",
            event.from,
            event.to
        );
    }
}

/// Keeps every event in memory, in recording order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events of one category, in recording order.
    pub fn of_category(&self, category: EventCategory) -> Vec<Event> {
        self.snapshot()
            .into_iter()
            .filter(|event| event.category == category)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(category: EventCategory) -> Event {
        Event::new(
            category,
            Participant::caller("main"),
            Participant::Coordinator,
            Operation::Await,
            Some(Payload::Promise(PromiseId::new(1))),
        )
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.record(sample(EventCategory::AwaitPending));
        sink.record(sample(EventCategory::AwaitImmediate));

        let categories: Vec<_> = sink.snapshot().iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![EventCategory::AwaitPending, EventCategory::AwaitImmediate]
        );
        assert_eq!(sink.of_category(EventCategory::AwaitImmediate).len(), 1);
    }

    #[test]
    fn clones_share_the_log() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        clone.record(sample(EventCategory::Returned));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn event_serialization_shape() {
        let value = serde_json::to_value(sample(EventCategory::AwaitPending)).unwrap();
        assert_eq!(value["category"], json!("await_pending"));
        assert_eq!(value["from"], json!({ "caller": "main" }));
        assert_eq!(value["to"], json!("coordinator"));
        assert_eq!(value["operation"], json!("await"));
        assert_eq!(value["payload"], json!({ "type": "promise", "data": 1 }));
        assert!(value["at"].is_string());
    }

    #[test]
    fn empty_payload_is_omitted() {
        let event = Event::new(
            EventCategory::Released,
            Participant::Coordinator,
            Participant::Coordinator,
            Operation::Release,
            None,
        );
        let value = serde_json::to_value(event).unwrap();
        assert!(value.get("payload").is_none());
    }
}

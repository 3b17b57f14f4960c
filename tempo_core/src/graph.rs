//! The frozen event dependency graph.

use crate::event::{Event, EventId, EventType};

/// Immutable, build-time-checked dependency graph.
///
/// Produced by `GraphBuilder::finalize`; guaranteed acyclic.
#[derive(Debug, Clone)]
pub struct EventGraph {
    /// Events in registration order (`events[i].id == EventId(i)`)
    events: Vec<Event>,

    /// Direct dependents of each event, in registration order
    dependents: Vec<Vec<EventId>>,

    /// A topological order; ties broken by registration order
    order: Vec<EventId>,

    /// Events with no dependencies
    roots: Vec<EventId>,
}

impl EventGraph {
    pub(crate) fn new(events: Vec<Event>, dependents: Vec<Vec<EventId>>, order: Vec<EventId>) -> Self {
        let roots = events.iter().filter(|e| e.is_root()).map(|e| e.id).collect();
        Self {
            events,
            dependents,
            order,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Looks up an event by id.
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.index())
    }

    /// Looks up an event by label.
    pub fn by_label(&self, label: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.label.as_deref() == Some(label))
    }

    /// All events in registration order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Direct dependents of `id`.
    pub fn dependents(&self, id: EventId) -> &[EventId] {
        self.dependents.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topological order: every event appears after all of its dependencies.
    pub fn topological_order(&self) -> &[EventId] {
        &self.order
    }

    /// Position of each event in the topological order.
    pub fn positions(&self) -> Vec<usize> {
        let mut positions = vec![0; self.events.len()];
        for (pos, id) in self.order.iter().enumerate() {
            positions[id.index()] = pos;
        }
        positions
    }

    /// Events ready to resolve at start time.
    pub fn roots(&self) -> &[EventId] {
        &self.roots
    }

    /// Agent events flagged as expected (gold) behavior.
    pub fn oracle_events(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| e.oracle && e.event_type == EventType::Agent)
    }
}
